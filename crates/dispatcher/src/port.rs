//! Engine-side ports
//!
//! [`InputPort`] owns the cache of one route input and subscribes it to its
//! stream while enabled. [`OutputPort`] publishes on the stream bus under the
//! writer name `route/output`.

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{
    ContractError, Input, LoanedSamples, Output, OutputSample, PortInfo, SampleLender, Selector,
};
use tracing::trace;

use crate::cache::StreamCache;
use crate::metrics::RouteMetrics;
use crate::stream::{DataSignal, StreamBus, Subscriber, SubscriptionId};

pub(crate) struct InputPort {
    info: PortInfo,
    route: String,
    cache: Arc<Mutex<StreamCache>>,
    subscription: Option<SubscriptionId>,
    bus: Arc<StreamBus>,
    metrics: Arc<RouteMetrics>,
}

impl InputPort {
    pub(crate) fn new(
        route: &str,
        info: PortInfo,
        history_depth: usize,
        bus: Arc<StreamBus>,
        metrics: Arc<RouteMetrics>,
    ) -> Self {
        Self {
            info,
            route: route.to_string(),
            cache: Arc::new(Mutex::new(StreamCache::new(history_depth))),
            subscription: None,
            bus,
            metrics,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.subscription.is_some()
    }

    /// Start receiving samples from the stream
    pub(crate) fn enable(&mut self, signal: &Arc<DataSignal>) -> Result<(), ContractError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let subscriber = Subscriber {
            route: self.route.clone(),
            input: self.info.name.clone(),
            cache: Arc::clone(&self.cache),
            signal: Arc::clone(signal),
            metrics: Arc::clone(&self.metrics),
        };
        self.subscription = Some(self.bus.subscribe(self.info.stream_name(), subscriber)?);
        Ok(())
    }

    /// Stop receiving and drop whatever is cached
    pub(crate) fn disable(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.unsubscribe(self.info.stream_name(), id);
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub(crate) fn has_unread(&self) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.has_unread())
            .unwrap_or(false)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, StreamCache>, ContractError> {
        self.cache.lock().map_err(|_| {
            ContractError::Other(format!("cache of input '{}' poisoned", self.info.name))
        })
    }

    fn loan(&self, selector: &Selector, take: bool) -> Result<LoanedSamples<'_>, ContractError> {
        let samples = self.lock_cache()?.select(selector, take)?;
        if take {
            self.metrics.add_taken(samples.len());
            observability::record_samples_taken(&self.route, &self.info.name, samples.len());
        } else {
            self.metrics.add_read(samples.len());
            observability::record_samples_read(&self.route, &self.info.name, samples.len());
        }
        trace!(
            route = %self.route,
            input = %self.info.name,
            take,
            count = samples.len(),
            "Loaned samples"
        );
        self.metrics.loan_out();
        Ok(LoanedSamples::new(samples, self))
    }
}

impl SampleLender for InputPort {
    fn return_loan(&self, _count: usize) {
        self.metrics.loan_returned();
    }
}

impl Input for InputPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn read(&self, selector: &Selector) -> Result<LoanedSamples<'_>, ContractError> {
        self.loan(selector, false)
    }

    fn take(&self, selector: &Selector) -> Result<LoanedSamples<'_>, ContractError> {
        self.loan(selector, true)
    }
}

pub(crate) struct OutputPort {
    info: PortInfo,
    writer: String,
    enabled: bool,
    bus: Arc<StreamBus>,
    metrics: Arc<RouteMetrics>,
}

impl OutputPort {
    pub(crate) fn new(
        route: &str,
        info: PortInfo,
        bus: Arc<StreamBus>,
        metrics: Arc<RouteMetrics>,
    ) -> Self {
        Self {
            writer: format!("{route}/{}", info.name),
            info,
            enabled: false,
            bus,
            metrics,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Output for OutputPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn write(&self, sample: OutputSample) -> Result<(), ContractError> {
        self.bus
            .publish(self.info.stream_name(), Some(&self.writer), sample)?;
        self.metrics.inc_written();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::SinkFanout;
    use contracts::{data_map, TypeRegistry};

    fn bus() -> Arc<StreamBus> {
        Arc::new(StreamBus::new(TypeRegistry::new(), SinkFanout::default()))
    }

    #[test]
    fn test_output_feeds_enabled_input() {
        let bus = bus();
        let metrics = Arc::new(RouteMetrics::new());
        let signal = Arc::new(DataSignal::default());
        let mut input = InputPort::new(
            "r",
            PortInfo::new(0, "in", "Square", "ShapeType"),
            8,
            Arc::clone(&bus),
            Arc::clone(&metrics),
        );
        let output = OutputPort::new(
            "r",
            PortInfo::new(0, "out", "Square", "ShapeType"),
            Arc::clone(&bus),
            Arc::clone(&metrics),
        );

        output.write(data_map! { "x" => 1 }.into()).unwrap();
        assert!(!input.has_unread());

        input.enable(&signal).unwrap();
        output.write(data_map! { "x" => 2 }.into()).unwrap();
        assert!(input.has_unread());
        assert!(signal.take());

        {
            let batch = input.read_all().unwrap();
            assert_eq!(batch.len(), 1);
            assert_eq!(metrics.outstanding_loans(), 1);
        }
        assert_eq!(metrics.outstanding_loans(), 0);
        assert!(!input.has_unread());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.samples_written, 2);
        assert_eq!(snapshot.samples_read, 1);
    }

    #[test]
    fn test_disable_clears_cache() {
        let bus = bus();
        let metrics = Arc::new(RouteMetrics::new());
        let signal = Arc::new(DataSignal::default());
        let mut input = InputPort::new(
            "r",
            PortInfo::new(0, "in", "Circle", "ShapeType"),
            8,
            Arc::clone(&bus),
            metrics,
        );
        input.enable(&signal).unwrap();
        bus.publish(&"Circle".into(), None, data_map! { "x" => 1 }.into())
            .unwrap();
        assert!(input.has_unread());

        input.disable();
        assert!(!input.is_enabled());
        assert!(input.take_all().unwrap().is_empty());
    }
}
