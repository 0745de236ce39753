//! LogSink - traces routed traffic
//!
//! Data samples and instance lifecycle announcements get distinct messages.
//! Per-stream totals are logged when the sink closes.

use std::collections::BTreeMap;

use contracts::{ContractError, DataSink, InstanceState, StreamName, StreamRecord};
use tracing::{info, instrument};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamTally {
    pub(crate) samples: u64,
    pub(crate) disposed: u64,
    pub(crate) unregistered: u64,
}

/// Sink that logs stream traffic for debugging
pub struct LogSink {
    name: String,
    tally: BTreeMap<StreamName, StreamTally>,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tally: BTreeMap::new(),
        }
    }

    fn log_record(&mut self, record: &StreamRecord) {
        let info = &record.sample.info;
        let writer = record.writer.as_deref().unwrap_or("external");
        let tally = self.tally.entry(record.stream.clone()).or_default();

        if info.valid_data {
            tally.samples += 1;
            info!(
                sink = %self.name,
                stream = %record.stream,
                sequence = record.sequence,
                writer,
                instance = ?info.instance_handle,
                members = record.sample.data.as_ref().map_or(0, |d| d.len()),
                "Sample routed"
            );
            return;
        }

        match info.instance_state {
            InstanceState::NotAliveNoWriters => {
                tally.unregistered += 1;
                info!(
                    sink = %self.name,
                    stream = %record.stream,
                    sequence = record.sequence,
                    writer,
                    instance = ?info.instance_handle,
                    "Instance unregistered"
                );
            }
            _ => {
                tally.disposed += 1;
                info!(
                    sink = %self.name,
                    stream = %record.stream,
                    sequence = record.sequence,
                    writer,
                    instance = ?info.instance_handle,
                    "Instance disposed"
                );
            }
        }
    }

    pub(crate) fn tally(&self, stream: &str) -> StreamTally {
        self.tally
            .get(&StreamName::from(stream))
            .copied()
            .unwrap_or_default()
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, record),
        fields(sink = %self.name, stream = %record.stream)
    )]
    async fn write(&mut self, record: &StreamRecord) -> Result<(), ContractError> {
        self.log_record(record);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        for (stream, tally) in &self.tally {
            info!(
                sink = %self.name,
                stream = %stream,
                samples = tally.samples,
                disposed = tally.disposed,
                unregistered = tally.unregistered,
                "Stream totals"
            );
        }
        info!(sink = %self.name, streams = self.tally.len(), "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::{disposed, record};
    use contracts::{InstanceHandle, Sample};

    #[tokio::test]
    async fn test_log_sink_tallies_per_stream() {
        let mut sink = LogSink::new("trace");
        sink.write(&record("Triangle", 1)).await.unwrap();
        sink.write(&record("Triangle", 2)).await.unwrap();
        sink.write(&disposed("Triangle", 3)).await.unwrap();

        let mut unregistered = disposed("Square", 1);
        unregistered.sample =
            Sample::lifecycle(InstanceHandle::NIL, InstanceState::NotAliveNoWriters);
        sink.write(&unregistered).await.unwrap();

        assert_eq!(
            sink.tally("Triangle"),
            StreamTally {
                samples: 2,
                disposed: 1,
                unregistered: 0,
            }
        );
        assert_eq!(sink.tally("Square").unregistered, 1);
        assert_eq!(sink.tally("Circle"), StreamTally::default());
        sink.close().await.unwrap();
    }
}
