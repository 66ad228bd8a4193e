//! # Build Lifecycle
//!
//! [`BuildSystem`] wires the sample together: it spawns the run tracker,
//! builds the runner with the sample catalogue and actions, and attaches the
//! runner to the store so store reductions can trigger follow-up runs.
//!
//! ## Shutdown
//!
//! The store and the runner reference each other. Dropping clients alone would
//! leave the tracker running forever, so [`BuildSystem::shutdown`] detaches
//! the runner from the store first. Once the last tracker client is gone the
//! tracker's receive loop ends and its task completes.

pub mod build_system;

pub use build_system::*;
