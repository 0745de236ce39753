//! Session orchestration: one run of a blueprint from activation to shutdown.

mod replay;
mod runner;
mod stats;

pub use replay::load_replay;
pub use runner::{Session, SessionConfig};
