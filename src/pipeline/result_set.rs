//! The run-scoped set of merged citing works.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{AggregatedRecord, CitingRecord, Doi, Metadata};

/// What an upsert did to the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// Deduplicated citing works keyed by normalized DOI
///
/// Holds at most one [`AggregatedRecord`] per DOI and only ever grows. All
/// inserts and merges happen under one lock, so concurrent sightings of the
/// same DOI are applied one after the other. Iteration order is first-sighting
/// order.
#[derive(Debug, Default)]
pub struct ResultSet {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    index: HashMap<Doi, usize>,
    records: Vec<AggregatedRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a first sighting or merge a later one into the existing record
    pub fn upsert(&self, record: CitingRecord, target: &Doi) -> Upsert {
        let mut inner = self.lock();
        match inner.index.get(&record.doi).copied() {
            Some(position) => {
                if inner.records[position].merge(&record, target) {
                    Upsert::Updated
                } else {
                    Upsert::Unchanged
                }
            }
            None => {
                let position = inner.records.len();
                inner.index.insert(record.doi.clone(), position);
                inner
                    .records
                    .push(AggregatedRecord::from_sighting(record, target));
                Upsert::Inserted
            }
        }
    }

    /// Fill missing fields of an existing record; returns true if anything changed
    pub fn fill_metadata(&self, doi: &Doi, metadata: &Metadata) -> bool {
        let mut inner = self.lock();
        match inner.index.get(doi).copied() {
            Some(position) => inner.records[position].metadata.fill_from(metadata),
            None => false,
        }
    }

    pub fn get(&self, doi: &Doi) -> Option<AggregatedRecord> {
        let inner = self.lock();
        inner
            .index
            .get(doi)
            .map(|&position| inner.records[position].clone())
    }

    pub fn contains(&self, doi: &Doi) -> bool {
        self.lock().index.contains_key(doi)
    }

    /// The record exists and still lacks title, authors or year
    pub fn is_incomplete(&self, doi: &Doi) -> bool {
        let inner = self.lock();
        inner
            .index
            .get(doi)
            .is_some_and(|&position| !inner.records[position].metadata.is_complete())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Copy of the current records in first-sighting order
    pub fn snapshot(&self) -> Vec<AggregatedRecord> {
        self.lock().records.clone()
    }

    pub fn into_records(self) -> Vec<AggregatedRecord> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .records
    }
}
