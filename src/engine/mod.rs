//! Order book synchronization engine.
//!
//! This module handles:
//! - Snapshot bootstrap through a pluggable source
//! - Sequence checks on incoming update batches
//! - The buffering/live state machine and its async driver
//! - Throttled reporting of the book

pub mod guard;
pub mod loader;
pub mod runner;
pub mod sync;
pub mod throttle;

pub use guard::{evaluate, SyncDecision};
pub use loader::SnapshotLoader;
pub use runner::{DepthReporter, MirrorRunner, RunnerSettings};
pub use sync::{BootstrapReport, DepthSynchronizer, UpdateOutcome, DEFAULT_BUFFER_CAPACITY};
pub use throttle::Throttle;
