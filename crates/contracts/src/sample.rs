//! Sample - data plus delivery metadata
//!
//! A [`Sample`] is what read/take hand out. `data` is absent when the sample
//! only announces an instance lifecycle change (dispose/unregister).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DataMap;

/// Opaque 16-byte instance identifier
///
/// Handles are totally ordered: invalid handles sort before every valid one,
/// valid handles compare bytewise. Every invalid handle is the same handle
/// whatever its bytes, for equality and hashing too.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub valid: bool,
    pub value: [u8; 16],
}

impl InstanceHandle {
    /// The invalid handle ("less than all valid handles")
    pub const NIL: InstanceHandle = InstanceHandle {
        valid: false,
        value: [0; 16],
    };

    pub fn new(value: [u8; 16]) -> Self {
        Self { valid: true, value }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for InstanceHandle {}

impl std::hash::Hash for InstanceHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        if self.valid {
            self.value.hash(state);
        }
    }
}

impl PartialOrd for InstanceHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstanceHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.valid, other.valid) {
            (false, false) => std::cmp::Ordering::Equal,
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (true, true) => self.value.cmp(&other.value),
        }
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("InstanceHandle(NIL)");
        }
        f.write_str("InstanceHandle(")?;
        for byte in &self.value {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(")")
    }
}

/// Whether a sample has been read before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleState {
    Read,
    #[default]
    NotRead,
}

/// Whether the instance is new to this reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    New,
    NotNew,
}

/// Instance lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    #[default]
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

impl SampleState {
    pub const fn bits(self) -> u32 {
        match self {
            SampleState::Read => 0x1,
            SampleState::NotRead => 0x2,
        }
    }
}

impl ViewState {
    pub const fn bits(self) -> u32 {
        match self {
            ViewState::New => 0x1,
            ViewState::NotNew => 0x2,
        }
    }
}

impl InstanceState {
    pub const fn bits(self) -> u32 {
        match self {
            InstanceState::Alive => 0x1,
            InstanceState::NotAliveDisposed => 0x2,
            InstanceState::NotAliveNoWriters => 0x4,
        }
    }

    pub fn is_alive(self) -> bool {
        self == InstanceState::Alive
    }
}

/// 64-bit sequence number split in high/low words
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SequenceNumber {
    pub high: i32,
    pub low: u32,
}

impl SequenceNumber {
    pub fn from_u64(value: u64) -> Self {
        Self {
            high: (value >> 32) as i32,
            low: value as u32,
        }
    }

    pub fn to_u64(self) -> u64 {
        ((self.high as u64) << 32) | u64::from(self.low)
    }
}

/// Timestamp as seconds + nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Time {
    pub sec: i64,
    pub nanosec: u32,
}

/// Sample metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleInfo {
    pub instance_handle: InstanceHandle,
    pub publication_handle: InstanceHandle,
    pub sample_state: SampleState,
    pub view_state: ViewState,
    pub instance_state: InstanceState,
    pub valid_data: bool,
    pub flag: u32,
    pub original_publication_virtual_guid: [u8; 16],
    pub original_publication_virtual_sequence_number: SequenceNumber,
    pub related_original_publication_virtual_guid: [u8; 16],
    pub related_original_publication_virtual_sequence_number: SequenceNumber,
    pub reception_sequence_number: SequenceNumber,
    pub publication_sequence_number: SequenceNumber,
    pub reception_timestamp: Time,
    pub source_timestamp: Time,
}

/// Data + metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// `None` when `info.valid_data` is false
    pub data: Option<DataMap>,
    pub info: SampleInfo,
}

impl Sample {
    /// A sample carrying data
    pub fn with_data(data: DataMap, mut info: SampleInfo) -> Self {
        info.valid_data = true;
        Self {
            data: Some(data),
            info,
        }
    }

    /// A lifecycle-only sample (dispose / unregister) for an instance
    pub fn lifecycle(instance_handle: InstanceHandle, instance_state: InstanceState) -> Self {
        Self {
            data: None,
            info: SampleInfo {
                instance_handle,
                instance_state,
                valid_data: false,
                ..Default::default()
            },
        }
    }

    pub fn valid_data(&self) -> bool {
        self.info.valid_data
    }

    pub fn instance_handle(&self) -> InstanceHandle {
        self.info.instance_handle
    }

    /// Member of the data portion, if any
    pub fn get(&self, member: &str) -> Option<&crate::Value> {
        self.data.as_ref().and_then(|d| d.get(member))
    }
}

/// Bitmask over sample / view / instance states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMask(pub u32);

impl StateMask {
    pub const ANY: StateMask = StateMask(u32::MAX);

    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits != 0
    }
}

impl Default for StateMask {
    fn default() -> Self {
        Self::ANY
    }
}

impl From<SampleState> for StateMask {
    fn from(s: SampleState) -> Self {
        StateMask(s.bits())
    }
}

impl From<ViewState> for StateMask {
    fn from(s: ViewState) -> Self {
        StateMask(s.bits())
    }
}

impl From<InstanceState> for StateMask {
    fn from(s: InstanceState) -> Self {
        StateMask(s.bits())
    }
}
