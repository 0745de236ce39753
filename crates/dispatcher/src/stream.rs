//! Stream bus
//!
//! Connects outputs to inputs by stream name. A published sample is checked
//! against the stream's registered type, stamped with its instance handle and
//! publication metadata, stored in the cache of every subscribed input, then
//! offered to the observation sinks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use contracts::{
    ContractError, DataMap, InstanceHandle, InstanceState, OutputSample, Sample, SampleInfo,
    SequenceNumber, StreamName, StreamRecord, StructType, Time, TypeRegistry,
};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::cache::{current_time, StreamCache};
use crate::fanout::SinkFanout;
use crate::instance::{instance_handle_for, writer_handle};
use crate::metrics::{MetricsSnapshot, RouteMetrics};

/// Coalesced data-available notification for one route
///
/// Raising it while a notification is already pending does nothing.
#[derive(Debug, Default)]
pub(crate) struct DataSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl DataSignal {
    pub(crate) fn raise(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Consume the pending notification, if any
    pub(crate) fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }
}

pub(crate) type SubscriptionId = u64;

/// An enabled input listening on a stream
pub(crate) struct Subscriber {
    pub(crate) route: String,
    pub(crate) input: String,
    pub(crate) cache: Arc<Mutex<StreamCache>>,
    pub(crate) signal: Arc<DataSignal>,
    pub(crate) metrics: Arc<RouteMetrics>,
}

impl Subscriber {
    fn deliver(&self, sample: Sample) {
        let evicted = match self.cache.lock() {
            Ok(mut cache) => {
                let evicted = cache.insert(sample);
                observability::record_cache_depth(&self.route, &self.input, cache.len());
                evicted
            }
            Err(_) => {
                error!(route = %self.route, input = %self.input, "Input cache poisoned");
                return;
            }
        };
        if evicted > 0 {
            self.metrics.add_evicted(evicted as u64);
            observability::record_samples_evicted(&self.route, &self.input, evicted as u64);
            debug!(
                route = %self.route,
                input = %self.input,
                evicted,
                "History depth reached, oldest samples dropped"
            );
        }
        self.signal.raise();
    }
}

#[derive(Default)]
struct StreamState {
    type_name: Option<String>,
    sequence: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

/// Publish/subscribe hub shared by all routes of an engine
pub struct StreamBus {
    types: TypeRegistry,
    streams: Mutex<HashMap<StreamName, StreamState>>,
    sinks: RwLock<Option<SinkFanout>>,
    next_subscription: AtomicU64,
}

impl StreamBus {
    pub fn new(types: TypeRegistry, sinks: SinkFanout) -> Self {
        Self {
            types,
            streams: Mutex::new(HashMap::new()),
            sinks: RwLock::new(Some(sinks)),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Associate a stream with a type name; the first declaration wins
    pub fn declare(&self, stream: &StreamName, type_name: &str) -> Result<(), ContractError> {
        let mut streams = self.lock_streams()?;
        let state = streams.entry(stream.clone()).or_default();
        match &state.type_name {
            None => state.type_name = Some(type_name.to_string()),
            Some(existing) if existing != type_name => {
                warn!(
                    stream = %stream,
                    declared = %existing,
                    requested = %type_name,
                    "Stream already declared with another type"
                );
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Registered type of a stream, if any
    pub fn stream_type(&self, stream: &str) -> Option<StructType> {
        let streams = self.streams.lock().ok()?;
        let type_name = streams.get(stream)?.type_name.as_deref()?;
        self.types.get(type_name).cloned()
    }

    pub(crate) fn subscribe(
        &self,
        stream: &StreamName,
        subscriber: Subscriber,
    ) -> Result<SubscriptionId, ContractError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let mut streams = self.lock_streams()?;
        streams
            .entry(stream.clone())
            .or_default()
            .subscribers
            .push((id, subscriber));
        Ok(id)
    }

    pub(crate) fn unsubscribe(&self, stream: &StreamName, id: SubscriptionId) {
        if let Ok(mut streams) = self.streams.lock() {
            if let Some(state) = streams.get_mut(stream) {
                state.subscribers.retain(|(sub, _)| *sub != id);
            }
        }
    }

    /// Publish on `stream`; returns the stream sequence number
    ///
    /// `writer` names the publishing output (`route/output`), `None` for
    /// samples injected from outside the engine.
    ///
    /// # Errors
    /// `ContractError::Write` when the sample does not fit the stream's type,
    /// or is a lifecycle sample without a valid instance handle.
    pub fn publish(
        &self,
        stream: &StreamName,
        writer: Option<&str>,
        sample: OutputSample,
    ) -> Result<u64, ContractError> {
        let (sample, sequence) = {
            let mut streams = self.lock_streams()?;
            let state = streams.entry(stream.clone()).or_default();
            let ty = state.type_name.as_deref().and_then(|t| self.types.get(t));

            let mut sample = prepare_sample(ty, writer, sample).map_err(|message| {
                ContractError::write(writer.unwrap_or(stream.as_str()), message)
            })?;

            state.sequence += 1;
            sample.info.publication_sequence_number = SequenceNumber::from_u64(state.sequence);
            for (_, subscriber) in &state.subscribers {
                subscriber.deliver(sample.clone());
            }
            (sample, state.sequence)
        };

        observability::record_sample_published(stream, sample.info.valid_data);

        if let Ok(sinks) = self.sinks.read() {
            if let Some(sinks) = sinks.as_ref() {
                sinks.dispatch(&StreamRecord {
                    stream: stream.clone(),
                    sequence,
                    writer: writer.map(str::to_string),
                    sample,
                });
            }
        }

        Ok(sequence)
    }

    /// Publish a lifecycle change for the instance identified by `key`
    pub fn publish_lifecycle(
        &self,
        stream: &StreamName,
        writer: Option<&str>,
        key: &DataMap,
        state: InstanceState,
    ) -> Result<u64, ContractError> {
        let handle = instance_handle_for(self.stream_type(stream).as_ref(), key);
        self.publish(
            stream,
            writer,
            OutputSample::Sample(Sample::lifecycle(handle, state)),
        )
    }

    pub fn sink_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .read()
            .ok()
            .and_then(|sinks| sinks.as_ref().map(SinkFanout::metrics))
            .unwrap_or_default()
    }

    /// Stop the observation sinks, draining their queues
    ///
    /// Samples published afterwards still reach inputs but no sink.
    pub async fn shutdown_sinks(&self) {
        let sinks = match self.sinks.write() {
            Ok(mut sinks) => sinks.take(),
            Err(_) => None,
        };
        if let Some(sinks) = sinks {
            sinks.shutdown().await;
        }
    }

    fn lock_streams(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<StreamName, StreamState>>, ContractError> {
        self.streams
            .lock()
            .map_err(|_| ContractError::Other("stream table poisoned".into()))
    }
}

fn check_type(ty: Option<&StructType>, data: &DataMap) -> Result<(), String> {
    match ty {
        Some(ty) => ty.check(data),
        None => Ok(()),
    }
}

fn preserved_timestamp(source: Time, now: Time) -> Time {
    if source == Time::default() {
        now
    } else {
        source
    }
}

/// Turn what an output was given into the sample readers will see
fn prepare_sample(
    ty: Option<&StructType>,
    writer: Option<&str>,
    sample: OutputSample,
) -> Result<Sample, String> {
    let now = current_time();
    let publication_handle = writer.map(writer_handle).unwrap_or(InstanceHandle::NIL);

    match sample {
        OutputSample::Data(data) => {
            check_type(ty, &data)?;
            let info = SampleInfo {
                instance_handle: instance_handle_for(ty, &data),
                publication_handle,
                source_timestamp: now,
                ..Default::default()
            };
            Ok(Sample::with_data(data, info))
        }
        OutputSample::Sample(sample) if sample.info.valid_data => {
            let source = sample.info;
            let data = sample
                .data
                .ok_or_else(|| "sample marked valid but carries no data".to_string())?;
            check_type(ty, &data)?;
            let info = SampleInfo {
                instance_handle: instance_handle_for(ty, &data),
                publication_handle,
                source_timestamp: preserved_timestamp(source.source_timestamp, now),
                flag: source.flag,
                original_publication_virtual_guid: source.original_publication_virtual_guid,
                original_publication_virtual_sequence_number: source
                    .original_publication_virtual_sequence_number,
                related_original_publication_virtual_guid: source
                    .related_original_publication_virtual_guid,
                related_original_publication_virtual_sequence_number: source
                    .related_original_publication_virtual_sequence_number,
                ..Default::default()
            };
            Ok(Sample::with_data(data, info))
        }
        OutputSample::Sample(sample) => {
            let handle = sample.info.instance_handle;
            if !handle.is_valid() {
                return Err("lifecycle sample without a valid instance handle".into());
            }
            // an invalid sample that claims to be alive is a dispose
            let state = match sample.info.instance_state {
                InstanceState::Alive => InstanceState::NotAliveDisposed,
                not_alive => not_alive,
            };
            let mut lifecycle = Sample::lifecycle(handle, state);
            lifecycle.info.publication_handle = publication_handle;
            lifecycle.info.source_timestamp =
                preserved_timestamp(sample.info.source_timestamp, now);
            lifecycle.info.flag = sample.info.flag;
            Ok(lifecycle)
        }
    }
}
