//! Per-input sample cache
//!
//! Holds the samples delivered to one input that have not been taken yet,
//! in arrival order, plus the lifecycle record of every instance seen.
//! Bounded by `history_depth`: overflow evicts the oldest sample.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::Utc;
use contracts::{
    ContractError, InstanceHandle, InstanceState, Sample, SampleState, Selector, SequenceNumber,
    Time, ViewState,
};
use slab::Slab;

use crate::filter::CompiledFilter;

/// Current wall-clock time
pub(crate) fn current_time() -> Time {
    let now = Utc::now();
    Time {
        sec: now.timestamp(),
        nanosec: now.timestamp_subsec_nanos(),
    }
}

#[derive(Debug, Clone, Copy)]
struct InstanceRecord {
    state: InstanceState,
    view: ViewState,
    cached: usize,
}

impl Default for InstanceRecord {
    fn default() -> Self {
        Self {
            state: InstanceState::Alive,
            view: ViewState::New,
            cached: 0,
        }
    }
}

#[derive(Debug)]
pub struct StreamCache {
    depth: usize,
    samples: Slab<Sample>,
    /// reception sequence -> slab key
    order: BTreeMap<u64, usize>,
    instances: BTreeMap<InstanceHandle, InstanceRecord>,
    next_sequence: u64,
    evicted: u64,
}

impl StreamCache {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            samples: Slab::new(),
            order: BTreeMap::new(),
            instances: BTreeMap::new(),
            next_sequence: 0,
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples evicted by the history depth so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Whether any cached sample has not been read or taken yet
    pub fn has_unread(&self) -> bool {
        self.samples
            .iter()
            .any(|(_, s)| s.info.sample_state == SampleState::NotRead)
    }

    pub fn instance_state(&self, handle: &InstanceHandle) -> Option<InstanceState> {
        self.instances.get(handle).map(|r| r.state)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.order.clear();
        self.instances.clear();
    }

    /// Store a delivered sample
    ///
    /// Returns the number of samples evicted to make room.
    pub fn insert(&mut self, mut sample: Sample) -> usize {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        sample.info.reception_sequence_number = SequenceNumber::from_u64(sequence);
        sample.info.reception_timestamp = current_time();
        sample.info.sample_state = SampleState::NotRead;

        let record = self
            .instances
            .entry(sample.info.instance_handle)
            .or_default();
        if sample.info.valid_data {
            if !record.state.is_alive() {
                // instance came back
                record.state = InstanceState::Alive;
                record.view = ViewState::New;
            }
        } else {
            record.state = match sample.info.instance_state {
                InstanceState::Alive => InstanceState::NotAliveDisposed,
                not_alive => not_alive,
            };
        }
        record.cached += 1;
        sample.info.instance_state = record.state;
        sample.info.view_state = record.view;

        let key = self.samples.insert(sample);
        self.order.insert(sequence, key);

        let mut evicted = 0;
        while self.samples.len() > self.depth {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.remove_key(oldest);
            evicted += 1;
        }
        if evicted > 0 {
            self.evicted += evicted as u64;
            self.purge();
        }
        evicted
    }

    /// Samples matching `selector`, in arrival order
    ///
    /// `take = false` leaves them cached and marks them read; `take = true`
    /// removes them. Either way, the instances they belong to stop being new.
    pub fn select(&mut self, selector: &Selector, take: bool) -> Result<Vec<Sample>, ContractError> {
        let filter = selector
            .filter
            .as_ref()
            .map(CompiledFilter::compile)
            .transpose()?;
        let limit = selector.max_samples.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let target = match (selector.instance, selector.next_instance) {
            (Some(handle), _) => {
                if !self.instances.contains_key(&handle) {
                    return Ok(Vec::new());
                }
                Some(handle)
            }
            (None, Some(previous)) => {
                match self.next_matching_instance(previous, selector, filter.as_ref()) {
                    Some(handle) => Some(handle),
                    None => return Ok(Vec::new()),
                }
            }
            (None, None) => None,
        };

        let chosen: Vec<(u64, usize)> = self
            .order
            .iter()
            .filter(|(_, key)| {
                let sample = &self.samples[**key];
                target.is_none_or(|h| sample.info.instance_handle == h)
                    && self.matches(sample, selector, filter.as_ref())
            })
            .take(limit)
            .map(|(sequence, key)| (*sequence, *key))
            .collect();

        let mut batch = Vec::with_capacity(chosen.len());
        for (sequence, key) in chosen {
            let handle = self.samples[key].info.instance_handle;
            let (state, view) = self
                .instances
                .get(&handle)
                .map(|r| (r.state, r.view))
                .unwrap_or_default();

            let mut sample = if take {
                self.order.remove(&sequence);
                self.remove_key(key)
            } else {
                let cached = &mut self.samples[key];
                let copy = cached.clone();
                cached.info.sample_state = SampleState::Read;
                copy
            };
            sample.info.instance_state = state;
            sample.info.view_state = view;
            batch.push(sample);
        }

        for sample in &batch {
            if let Some(record) = self.instances.get_mut(&sample.info.instance_handle) {
                record.view = ViewState::NotNew;
            }
        }
        self.purge();

        Ok(batch)
    }

    fn matches(
        &self,
        sample: &Sample,
        selector: &Selector,
        filter: Option<&CompiledFilter>,
    ) -> bool {
        let (state, view) = self
            .instances
            .get(&sample.info.instance_handle)
            .map(|r| (r.state, r.view))
            .unwrap_or_default();

        let states_match = selector
            .sample_state
            .contains(sample.info.sample_state.bits())
            && selector.view_state.contains(view.bits())
            && selector.instance_state.contains(state.bits());
        if !states_match {
            return false;
        }

        // lifecycle samples carry no data to filter on
        match (filter, &sample.data) {
            (Some(filter), Some(data)) if sample.info.valid_data => filter.matches(data),
            _ => true,
        }
    }

    /// Lowest instance above `previous` with at least one matching sample
    fn next_matching_instance(
        &self,
        previous: InstanceHandle,
        selector: &Selector,
        filter: Option<&CompiledFilter>,
    ) -> Option<InstanceHandle> {
        self.instances
            .range((Bound::Excluded(previous), Bound::Unbounded))
            .map(|(handle, _)| *handle)
            .find(|handle| {
                self.order.values().any(|key| {
                    let sample = &self.samples[*key];
                    sample.info.instance_handle == *handle
                        && self.matches(sample, selector, filter)
                })
            })
    }

    fn remove_key(&mut self, key: usize) -> Sample {
        let sample = self.samples.remove(key);
        if let Some(record) = self.instances.get_mut(&sample.info.instance_handle) {
            record.cached = record.cached.saturating_sub(1);
        }
        sample
    }

    /// Forget not-alive instances with nothing cached
    fn purge(&mut self) {
        self.instances
            .retain(|_, r| r.cached > 0 || r.state.is_alive());
    }
}
