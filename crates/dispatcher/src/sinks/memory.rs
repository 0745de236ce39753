//! MemorySink - keeps records in memory
//!
//! Meant for embedding and tests: the paired [`RecordLog`] reads what the
//! sink received while the engine keeps running.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{ContractError, DataSink, StreamRecord};
use tracing::debug;

/// Shared view of the records a [`MemorySink`] received
#[derive(Debug, Clone, Default)]
pub struct RecordLog {
    records: Arc<Mutex<Vec<StreamRecord>>>,
}

impl RecordLog {
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<StreamRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records published on `stream`, in publication order
    pub fn on_stream(&self, stream: &str) -> Vec<StreamRecord> {
        self.snapshot()
            .into_iter()
            .filter(|r| r.stream == stream)
            .collect()
    }

    /// Poll until at least `count` records arrived; false on timeout
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.len() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    fn push(&self, record: StreamRecord) -> Result<(), ContractError> {
        self.records
            .lock()
            .map_err(|_| ContractError::Other("record log poisoned".into()))?
            .push(record);
        Ok(())
    }
}

pub struct MemorySink {
    name: String,
    log: RecordLog,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> (Self, RecordLog) {
        let log = RecordLog::default();
        let sink = Self {
            name: name.into(),
            log: log.clone(),
        };
        (sink, log)
    }
}

impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &StreamRecord) -> Result<(), ContractError> {
        self.log.push(record.clone())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, records = self.log.len(), "MemorySink closed");
        Ok(())
    }
}
