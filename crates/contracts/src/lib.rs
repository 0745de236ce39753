//! # Contracts
//!
//! Interface contracts between a routing engine and the Processors it drives.
//! All other crates depend on this crate; it depends on none of them.
//!
//! ## Event model
//! - The engine owns Routes, their ports and the port caches
//! - A [`Processor`] reacts to Route lifecycle and data events through callbacks
//! - During a callback the Processor reads/takes from [`Input`]s and writes to [`Output`]s
//! - Batches returned by read/take are [`LoanedSamples`], scoped to the caller

mod blueprint;
mod error;
mod port;
mod processor;
mod route;
mod sample;
mod selector;
mod sink;
mod stream_name;
mod types;
mod value;

pub use blueprint::*;
pub use error::*;
pub use port::*;
pub use processor::*;
pub use route::*;
pub use sample::*;
pub use selector::*;
pub use sink::*;
pub use stream_name::StreamName;
pub use types::*;
pub use value::*;
