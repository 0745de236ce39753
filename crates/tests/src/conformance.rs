//! Conformance processor
//!
//! Counts every callback and checks, from inside each one, what the route
//! exposes at that point of its lifecycle: construction properties, port
//! identities, iteration and lookup. Findings go to a shared report instead of
//! panicking so the route worker keeps running.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use config_loader::PropertyReader;
use contracts::{
    Callback, CallbackResult, ContractError, Input, Output, PortInfo, Processor, ProcessorFactory,
    Properties, Route,
};

pub const PROP1: &str = "routing.test.prop1";
pub const PROP2: &str = "routing.test.prop2";

pub const ALL_CALLBACKS: [Callback; 11] = [
    Callback::Create,
    Callback::InputEnabled,
    Callback::InputDisabled,
    Callback::OutputEnabled,
    Callback::OutputDisabled,
    Callback::Start,
    Callback::Stop,
    Callback::Run,
    Callback::Pause,
    Callback::DataAvailable,
    Callback::PeriodicEvent,
];

#[derive(Debug, Default)]
pub struct ConformanceReport {
    counts: BTreeMap<&'static str, u64>,
    pub violations: Vec<String>,
    /// Samples read on data available, serialized as JSON
    pub samples_seen: Vec<String>,
}

impl ConformanceReport {
    pub fn count(&self, callback: Callback) -> u64 {
        self.counts.get(callback.as_str()).copied().unwrap_or(0)
    }

    pub fn never_called(&self) -> Vec<Callback> {
        ALL_CALLBACKS
            .into_iter()
            .filter(|c| self.count(*c) == 0)
            .collect()
    }
}

pub type SharedReport = Arc<Mutex<ConformanceReport>>;

/// Expected port identities, in index order
#[derive(Debug, Clone)]
pub struct ExpectedPorts {
    pub inputs: Vec<PortInfo>,
    pub outputs: Vec<PortInfo>,
}

struct ConformanceProcessor {
    expected: ExpectedPorts,
    report: SharedReport,
}

impl ConformanceProcessor {
    fn record(&self, callback: Callback, check: impl FnOnce(&mut Vec<String>)) {
        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        *report.counts.entry(callback.as_str()).or_default() += 1;
        let mut found = Vec::new();
        check(&mut found);
        report
            .violations
            .extend(found.into_iter().map(|v| format!("{callback}: {v}")));
    }

    fn check_ports(&self, route: &dyn Route, found: &mut Vec<String>) {
        let inputs: Vec<&dyn Input> = route.inputs().collect();
        if inputs.len() != self.expected.inputs.len() {
            found.push(format!("iterated {} inputs", inputs.len()));
        }
        for (position, input) in inputs.into_iter().enumerate() {
            let info = input.info();
            if info.index != position {
                found.push(format!("input '{}' at position {position}", info.name));
            }
            if self.expected.inputs.get(info.index) != Some(info) {
                found.push(format!("unexpected input info {info:?}"));
            }
            if route.input(&info.name).map(|p| p.info()) != Some(info)
                || route.input_at(info.index).map(|p| p.info()) != Some(info)
            {
                found.push(format!("input '{}' lookup mismatch", info.name));
            }
        }

        let outputs: Vec<&dyn Output> = route.outputs().collect();
        if outputs.len() != self.expected.outputs.len() {
            found.push(format!("iterated {} outputs", outputs.len()));
        }
        for (position, output) in outputs.into_iter().enumerate() {
            let info = output.info();
            if info.index != position {
                found.push(format!("output '{}' at position {position}", info.name));
            }
            if self.expected.outputs.get(info.index) != Some(info) {
                found.push(format!("unexpected output info {info:?}"));
            }
            if route.output(&info.name).map(|p| p.info()) != Some(info)
                || route.output_at(info.index).map(|p| p.info()) != Some(info)
            {
                found.push(format!("output '{}' lookup mismatch", info.name));
            }
        }
    }

    fn check_empty_iteration(route: &dyn Route, found: &mut Vec<String>) {
        let inputs = route.inputs().count();
        let outputs = route.outputs().count();
        if inputs + outputs > 0 {
            found.push(format!("iteration yielded {inputs} inputs, {outputs} outputs"));
        }
    }

    fn check_input_identity(&self, route: &dyn Route, input: &dyn Input, found: &mut Vec<String>) {
        let info = input.info();
        if self.expected.inputs.get(info.index) != Some(info) {
            found.push(format!("unexpected input info {info:?}"));
        }
        if route.input(&info.name).map(|p| p.info()) != Some(info) {
            found.push(format!("input '{}' not found by name", info.name));
        }
    }

    fn check_output_identity(
        &self,
        route: &dyn Route,
        output: &dyn Output,
        found: &mut Vec<String>,
    ) {
        let info = output.info();
        if self.expected.outputs.get(info.index) != Some(info) {
            found.push(format!("unexpected output info {info:?}"));
        }
        if route.output(&info.name).map(|p| p.info()) != Some(info) {
            found.push(format!("output '{}' not found by name", info.name));
        }
    }
}

impl Processor for ConformanceProcessor {
    fn on_input_enabled(&mut self, route: &dyn Route, input: &dyn Input) -> CallbackResult {
        self.record(Callback::InputEnabled, |found| {
            self.check_input_identity(route, input, found)
        });
        Ok(())
    }

    fn on_input_disabled(&mut self, route: &dyn Route, input: &dyn Input) -> CallbackResult {
        self.record(Callback::InputDisabled, |found| {
            self.check_input_identity(route, input, found);
            Self::check_empty_iteration(route, found);
        });
        Ok(())
    }

    fn on_output_enabled(&mut self, route: &dyn Route, output: &dyn Output) -> CallbackResult {
        self.record(Callback::OutputEnabled, |found| {
            self.check_output_identity(route, output, found)
        });
        Ok(())
    }

    fn on_output_disabled(&mut self, route: &dyn Route, output: &dyn Output) -> CallbackResult {
        self.record(Callback::OutputDisabled, |found| {
            self.check_output_identity(route, output, found);
            Self::check_empty_iteration(route, found);
        });
        Ok(())
    }

    fn on_start(&mut self, route: &dyn Route) -> CallbackResult {
        self.record(Callback::Start, |found| self.check_ports(route, found));
        Ok(())
    }

    fn on_stop(&mut self, route: &dyn Route) -> CallbackResult {
        self.record(Callback::Stop, |found| Self::check_empty_iteration(route, found));
        Ok(())
    }

    fn on_run(&mut self, route: &dyn Route) -> CallbackResult {
        self.record(Callback::Run, |found| self.check_ports(route, found));
        Ok(())
    }

    fn on_pause(&mut self, route: &dyn Route) -> CallbackResult {
        self.record(Callback::Pause, |found| self.check_ports(route, found));
        Ok(())
    }

    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult {
        let first = route.input_at(0).ok_or_else(|| ContractError::input_not_found("#0"))?;
        let samples = first.read_all()?;
        let mut serialized = Vec::with_capacity(samples.len());
        for sample in &samples {
            serialized.push(
                serde_json::to_string(&sample.data)
                    .map_err(|e| ContractError::processor(e.to_string()))?,
            );
        }
        self.record(Callback::DataAvailable, |_| {});
        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        report.samples_seen.extend(serialized);
        Ok(())
    }

    fn on_periodic_event(&mut self, route: &dyn Route) -> CallbackResult {
        self.record(Callback::PeriodicEvent, |found| self.check_ports(route, found));
        Ok(())
    }
}

/// Builds conformance processors; construction requires exactly the two
/// test properties with values `value1` and `value2`
pub struct ConformanceFactory {
    pub expected: ExpectedPorts,
    pub report: SharedReport,
}

impl ProcessorFactory for ConformanceFactory {
    fn create_processor(
        &self,
        _route: &dyn Route,
        properties: &Properties,
    ) -> Result<Box<dyn Processor>, ContractError> {
        let reader = PropertyReader::new(properties);
        for (key, expected) in [(PROP1, "value1"), (PROP2, "value2")] {
            let value = reader.required(key)?;
            if value != expected {
                return Err(ContractError::config_property(
                    key,
                    format!("expected '{expected}', got '{value}'"),
                ));
            }
        }
        if properties.len() != 2 {
            return Err(ContractError::processor(format!(
                "expected 2 properties, got {}",
                properties.len()
            )));
        }

        let processor = ConformanceProcessor {
            expected: self.expected.clone(),
            report: Arc::clone(&self.report),
        };
        processor.record(Callback::Create, |_| {});
        Ok(Box::new(processor))
    }
}
