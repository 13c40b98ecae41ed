//! Rolling in-memory chart buffer
//!
//! Readings are appended as they arrive. Once the buffer holds more than
//! [`HISTORY_LIMIT`] records it is thinned to half resolution: every other
//! record is kept and then the oldest survivor is dropped. Old data therefore
//! gets sparser instead of disappearing outright.

use std::sync::{Arc, Mutex, PoisonError};

use thermo_protocol::HistoryRecord;

/// Record count that triggers thinning
pub const HISTORY_LIMIT: usize = 500;

/// Bounded reading history, oldest first
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    records: Vec<HistoryRecord>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
        self.prune();
    }

    fn prune(&mut self) {
        if self.records.len() <= HISTORY_LIMIT {
            return;
        }
        let thinned: Vec<HistoryRecord> = self.records.iter().skip(1).step_by(2).copied().collect();
        self.records = thinned;
        if !self.records.is_empty() {
            self.records.remove(0);
        }
    }

    pub fn all(&self) -> Vec<HistoryRecord> {
        self.records.clone()
    }

    /// Records strictly newer than `since`
    pub fn since(&self, since: f64) -> Vec<HistoryRecord> {
        self.records
            .iter()
            .filter(|record| record.time > since)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Shared handle to the history buffer
///
/// Cloning is cheap; all clones see the same buffer.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    inner: Arc<Mutex<HistoryBuffer>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: HistoryRecord) {
        self.lock().push(record);
    }

    pub fn all(&self) -> Vec<HistoryRecord> {
        self.lock().all()
    }

    pub fn since(&self, since: f64) -> Vec<HistoryRecord> {
        self.lock().since(since)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
