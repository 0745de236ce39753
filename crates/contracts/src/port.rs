//! Route ports - Input / Output
//!
//! Ports are owned by the engine. A Processor sees them only as `&dyn Input`
//! and `&dyn Output` during a callback.

use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::{ContractError, DataMap, Sample, Selector, StreamName};

/// Stream a port is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream_name: StreamName,
    /// Registered type name of the stream data
    pub type_name: String,
}

/// Identity of a port within its route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Access index, contiguous from 0
    pub index: usize,
    /// Port name, unique within the route
    pub name: String,
    pub stream_info: StreamInfo,
}

impl PortInfo {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        stream_name: impl Into<StreamName>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            stream_info: StreamInfo {
                stream_name: stream_name.into(),
                type_name: type_name.into(),
            },
        }
    }

    pub fn stream_name(&self) -> &StreamName {
        &self.stream_info.stream_name
    }
}

/// Receives loans back when a [`LoanedSamples`] batch goes out of scope
pub trait SampleLender {
    fn return_loan(&self, count: usize);
}

/// A batch of samples loaned from an Input by read/take
///
/// The batch borrows the Input it came from, and its samples can only be
/// reached by reference through it, so nothing obtained from the batch can
/// outlive it. Clone `data` or `info` to keep them. Dropping the batch returns
/// the loan, whichever way the enclosing scope is left.
pub struct LoanedSamples<'a> {
    samples: Vec<Sample>,
    lender: Option<&'a dyn SampleLender>,
}

impl<'a> LoanedSamples<'a> {
    pub fn new(samples: Vec<Sample>, lender: &'a dyn SampleLender) -> Self {
        Self {
            samples,
            lender: Some(lender),
        }
    }

    /// A batch with no lender (nothing to return)
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            lender: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl Drop for LoanedSamples<'_> {
    fn drop(&mut self) {
        if let Some(lender) = self.lender.take() {
            lender.return_loan(self.samples.len());
        }
    }
}

impl std::fmt::Debug for LoanedSamples<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoanedSamples")
            .field("len", &self.samples.len())
            .finish()
    }
}

impl Index<usize> for LoanedSamples<'_> {
    type Output = Sample;

    fn index(&self, index: usize) -> &Sample {
        &self.samples[index]
    }
}

impl<'s> IntoIterator for &'s LoanedSamples<'_> {
    type Item = &'s Sample;
    type IntoIter = std::slice::Iter<'s, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// What an Output accepts
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSample {
    /// Plain data; metadata is generated by the writer
    Data(DataMap),
    /// Data + info; the writer may propagate parts of `info`
    Sample(Sample),
}

impl From<DataMap> for OutputSample {
    fn from(data: DataMap) -> Self {
        OutputSample::Data(data)
    }
}

impl From<Sample> for OutputSample {
    fn from(sample: Sample) -> Self {
        OutputSample::Sample(sample)
    }
}

impl From<&Sample> for OutputSample {
    fn from(sample: &Sample) -> Self {
        OutputSample::Sample(sample.clone())
    }
}

/// A route input
pub trait Input {
    fn info(&self) -> &PortInfo;

    /// Matching samples, left in the cache
    fn read(&self, selector: &Selector) -> Result<LoanedSamples<'_>, ContractError>;

    /// Matching samples, removed from the cache
    fn take(&self, selector: &Selector) -> Result<LoanedSamples<'_>, ContractError>;

    fn name(&self) -> &str {
        &self.info().name
    }

    /// `read(&Selector::all())`
    fn read_all(&self) -> Result<LoanedSamples<'_>, ContractError> {
        self.read(&Selector::all())
    }

    /// `take(&Selector::all())`
    fn take_all(&self) -> Result<LoanedSamples<'_>, ContractError> {
        self.take(&Selector::all())
    }
}

/// A route output
pub trait Output {
    fn info(&self) -> &PortInfo;

    /// Fire-and-forget write to the underlying stream
    fn write(&self, sample: OutputSample) -> Result<(), ContractError>;

    fn name(&self) -> &str {
        &self.info().name
    }
}
