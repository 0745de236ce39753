//! # Dispatcher
//!
//! Route engine: drives Processors through their lifecycle and moves samples
//! between route ports.
//!
//! Responsibilities:
//! - One worker task per route, serializing that route's callbacks
//! - Stream bus connecting outputs to input caches by stream name
//! - Read/take selection over per-input caches (state masks, instances, filters)
//! - Fan-out of every published sample to observation sinks, isolating slow sinks

mod cache;
pub mod engine;
pub mod error;
pub mod fanout;
mod filter;
pub mod handle;
pub mod instance;
pub mod metrics;
pub mod plugin;
mod port;
mod route;
pub mod sinks;
pub mod stream;
pub mod worker;

pub use cache::StreamCache;
pub use contracts::{DataSink, StreamRecord};
pub use engine::RoutingEngine;
pub use error::{CallbackFailure, DispatchError};
pub use fanout::SinkFanout;
pub use filter::CompiledFilter;
pub use handle::{Offer, RecordFilter, SinkHandle};
pub use metrics::{MetricsSnapshot, RouteMetrics, RouteMetricsSnapshot, SinkMetrics};
pub use plugin::PluginRegistry;
pub use sinks::{FileSink, LogSink, MemorySink, RecordLog};
pub use stream::StreamBus;
pub use worker::{RouteHandle, RouteOp};
