//! DataSink trait - observation of stream traffic
//!
//! Every sample written to a stream is also offered to the configured sinks
//! as a [`StreamRecord`].

use serde::Serialize;

use crate::{ContractError, Sample, StreamName};

/// One sample published on a stream
#[derive(Debug, Clone, Serialize)]
pub struct StreamRecord {
    /// Stream the sample was published on
    pub stream: StreamName,

    /// Per-stream publication sequence (monotonically increasing)
    pub sequence: u64,

    /// Writer that published it (`route/output`), if written by a route
    pub writer: Option<String>,

    /// The sample as delivered to readers
    pub sample: Sample,
}

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one stream record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, record: &StreamRecord) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
