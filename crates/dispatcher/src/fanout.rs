//! Fan-out of published samples to observation sinks

use contracts::{SinkConfig, SinkType, StreamRecord};
use tracing::{debug, info, instrument};

use crate::error::DispatchError;
use crate::handle::{Offer, RecordFilter, SinkHandle};
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

/// Set of running sinks, each behind its own bounded queue
#[derive(Default)]
pub struct SinkFanout {
    sinks: Vec<SinkHandle>,
}

impl SinkFanout {
    /// Spawn a sink worker per configuration
    #[instrument(name = "sink_fanout_build", skip(configs), fields(sink_count = configs.len()))]
    pub async fn from_configs(configs: &[SinkConfig]) -> Result<Self, DispatchError> {
        let mut fanout = Self::default();
        for config in configs {
            fanout.push(create_sink_handle(config)?);
        }
        info!(sinks = fanout.len(), "Sink fan-out ready");
        Ok(fanout)
    }

    pub fn push(&mut self, handle: SinkHandle) {
        self.sinks.push(handle);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Offer a record to every sink; returns how many queued it
    pub fn dispatch(&self, record: &StreamRecord) -> usize {
        self.sinks
            .iter()
            .filter(|sink| sink.offer(record) == Offer::Queued)
            .count()
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|s| (s.name().to_string(), s.metrics().snapshot()))
            .collect()
    }

    /// Drain and stop every sink
    pub async fn shutdown(self) {
        for sink in self.sinks {
            sink.shutdown().await;
        }
        debug!("Sink fan-out shut down");
    }
}

#[instrument(
    name = "create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatchError> {
    let filter = RecordFilter::from_config(config)?;
    let handle = match config.sink_type {
        SinkType::Log => {
            SinkHandle::spawn(LogSink::new(&config.name), filter, config.queue_capacity)
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatchError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::spawn(sink, filter, config.queue_capacity)
        }
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::{disposed, record};
    use crate::sinks::MemorySink;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(name: &str, sink_type: SinkType) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            streams: vec![],
            writers: vec![],
            include_lifecycle: true,
            queue_capacity: 50,
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_each_sink_sees_what_it_selects() {
        let (everything, all_log) = MemorySink::new("all");
        let (triangles, triangle_log) = MemorySink::new("triangles");
        let (data_only, data_log) = MemorySink::new("data");

        let mut fanout = SinkFanout::default();
        fanout.push(SinkHandle::spawn(everything, RecordFilter::all(), 10));
        fanout.push(SinkHandle::spawn(
            triangles,
            RecordFilter::all().streams(["Tri*"]).unwrap(),
            10,
        ));
        fanout.push(SinkHandle::spawn(
            data_only,
            RecordFilter::all().include_lifecycle(false),
            10,
        ));

        assert_eq!(fanout.dispatch(&record("Triangle", 1)), 3);
        assert_eq!(fanout.dispatch(&record("Square", 1)), 2);
        assert_eq!(fanout.dispatch(&disposed("Square", 2)), 1);

        assert!(all_log.wait_for(3, Duration::from_secs(1)).await);
        fanout.shutdown().await;

        assert_eq!(all_log.len(), 3);
        assert_eq!(triangle_log.on_stream("Triangle").len(), 1);
        assert_eq!(triangle_log.len(), 1);
        assert_eq!(data_log.len(), 2);
    }

    #[tokio::test]
    async fn test_from_configs() {
        let dir = tempdir().unwrap();
        let mut files = config("files", SinkType::File);
        files
            .params
            .insert("base_path".to_string(), dir.path().display().to_string());
        let mut log = config("log", SinkType::Log);
        log.writers = vec!["mirror/*".into()];

        let fanout = SinkFanout::from_configs(&[log, files]).await.unwrap();
        assert_eq!(fanout.len(), 2);
        assert_eq!(fanout.dispatch(&record("Triangle", 1)), 1);
        fanout.shutdown().await;

        assert!(dir.path().join("Triangle.jsonl").exists());
    }

    #[tokio::test]
    async fn test_bad_pattern_fails_creation() {
        let mut bad = config("bad", SinkType::Log);
        bad.writers = vec!["[".into()];
        let result = SinkFanout::from_configs(&[bad]).await;
        assert!(matches!(result, Err(DispatchError::SinkCreation { .. })));
    }
}
