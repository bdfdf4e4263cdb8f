use crate::OutcomeRecord;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Append-only collection of outcome records shared by every worker.
///
/// Appends and snapshots go through the same lock, so a report built while
/// workers are still running sees a consistent prefix of the appends.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Arc<Mutex<Vec<OutcomeRecord>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: OutcomeRecord) {
        self.records.lock().await.push(record);
    }

    /// Copy of the records appended so far, in arrival order.
    pub async fn snapshot(&self) -> Vec<OutcomeRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
