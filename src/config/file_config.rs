//! Configuration file discovery and rendering.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! mailto = "you@example.org"
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 60000
//!
//! [providers]
//! enabled = ["openalex", "opencitations"]
//!
//! [providers.openalex]
//! base_url = "https://api.openalex.org"
//! min_interval_ms = 500
//!
//! [pipeline]
//! max_results_per_target = 10000
//! concurrency = 2
//!
//! [output]
//! directory = "D:\\"
//! include_targets = false
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
const LOCAL_CONFIG: &str = "who-cited.toml";

/// Find a configuration file in the default locations
///
/// `./who-cited.toml` first, then `<config dir>/who-cited/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("who-cited").join("config.toml"))
        .filter(|path| path.is_file())
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
