//! SinkHandle - one observation sink behind its own bounded queue
//!
//! The handle decides which published records the sink sees (stream and
//! writer patterns, lifecycle announcements) and hands them to a worker task
//! without ever blocking the publishing route.

use std::sync::Arc;

use contracts::{DataSink, SinkConfig, StreamRecord};
use glob::Pattern;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::error::DispatchError;
use crate::metrics::SinkMetrics;

/// Records handed to the sink between two flushes
const WRITE_BATCH: usize = 64;

/// Which published records a sink observes
#[derive(Debug, Clone)]
pub struct RecordFilter {
    streams: Vec<Pattern>,
    writers: Vec<Pattern>,
    include_lifecycle: bool,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl RecordFilter {
    /// Every record, lifecycle announcements included
    pub fn all() -> Self {
        Self {
            streams: Vec::new(),
            writers: Vec::new(),
            include_lifecycle: true,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Result<Self, DispatchError> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p).map_err(|e| {
                        DispatchError::sink_creation(&config.name, format!("pattern '{p}': {e}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            streams: compile(&config.streams)?,
            writers: compile(&config.writers)?,
            include_lifecycle: config.include_lifecycle,
        })
    }

    /// Restrict to streams matching one of `patterns`
    pub fn streams<I, S>(mut self, patterns: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.streams.push(Pattern::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    /// Restrict to records written by a route output matching one of `patterns`
    pub fn writers<I, S>(mut self, patterns: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.writers.push(Pattern::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    pub fn include_lifecycle(mut self, include: bool) -> Self {
        self.include_lifecycle = include;
        self
    }

    pub fn accepts(&self, record: &StreamRecord) -> bool {
        if !self.include_lifecycle && !record.sample.info.valid_data {
            return false;
        }
        if !self.streams.is_empty()
            && !self.streams.iter().any(|p| p.matches(record.stream.as_str()))
        {
            return false;
        }
        if self.writers.is_empty() {
            return true;
        }
        record
            .writer
            .as_deref()
            .is_some_and(|w| self.writers.iter().any(|p| p.matches(w)))
    }
}

/// What happened to an offered record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Not observed by this sink
    Skipped,
    /// Queue full
    Dropped,
    /// Worker gone
    Closed,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    filter: RecordFilter,
    tx: mpsc::Sender<StreamRecord>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker for `sink`, observing what `filter` accepts
    pub fn spawn<S: DataSink + Send + 'static>(
        sink: S,
        filter: RecordFilter,
        queue_capacity: usize,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());
        let worker = tokio::spawn(sink_worker(sink, rx, Arc::clone(&metrics)));

        Self {
            name,
            filter,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue `record` if this sink observes it; never waits for the sink
    pub fn offer(&self, record: &StreamRecord) -> Offer {
        if !self.filter.accepts(record) {
            return Offer::Skipped;
        }
        match self.tx.try_send(record.clone()) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Offer::Queued
            }
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    stream = %r.stream,
                    sequence = r.sequence,
                    "Sink queue full, record dropped"
                );
                Offer::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Offer::Closed
            }
        }
    }

    /// Drain the queue, flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %self.name, "Sink stopped");
    }
}

#[instrument(name = "sink_worker", skip_all, fields(sink = %sink.name()))]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<StreamRecord>,
    metrics: Arc<SinkMetrics>,
) {
    let name = sink.name().to_string();
    let mut batch = Vec::with_capacity(WRITE_BATCH);

    while rx.recv_many(&mut batch, WRITE_BATCH).await > 0 {
        metrics.set_queue_len(rx.len());
        trace!(records = batch.len(), "Writing batch");

        for record in batch.drain(..) {
            match sink.write(&record).await {
                Ok(()) => {
                    metrics.inc_write_count();
                    observability::record_record_dispatched(&name, true);
                }
                Err(e) => {
                    metrics.inc_failure_count();
                    observability::record_record_dispatched(&name, false);
                    error!(
                        stream = %record.stream,
                        sequence = record.sequence,
                        writer = record.writer.as_deref().unwrap_or("-"),
                        error = %e,
                        "Sink write failed"
                    );
                }
            }
        }

        // observers see each batch as soon as it is written
        if let Err(e) = sink.flush().await {
            metrics.inc_failure_count();
            error!(error = %e, "Sink flush failed");
        }
    }

    if let Err(e) = sink.close().await {
        error!(error = %e, "Sink close failed");
    }
    debug!("Sink worker stopped");
}
