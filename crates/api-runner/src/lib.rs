//! # API Runner
//!
//! This crate runs plugin lifecycle events. Given an event name and a payload
//! it finds the plugins implementing the event, runs their handlers one after
//! another, hands each handler a set of actions scoped to that plugin, and
//! keeps count of every run still in flight so callers can wait for a whole
//! cascade of runs to drain.
//!
//! ## Architecture Overview
//!
//! The engine is split along the same lines as an actor system:
//!
//! 1. **Dispatcher** ([`ApiRunner`]) - resolves implementers, runs the plugin
//!    loop, isolates handler failures and threads tracing spans through.
//! 2. **Run Tracker** ([`RunTracker`]) - an actor owning all run bookkeeping,
//!    driven through the cloneable [`RunTrackerClient`].
//! 3. **Action layer** ([`binder`], [`restriction`]) - decides which actions
//!    a handler may call during an event and attributes every action to the
//!    calling plugin and trace.
//!
//! Everything the engine does *not* own comes in through a trait or a value:
//! the plugin list ([`PluginRegistry`]), the event names ([`EventCatalog`]),
//! the store ([`ActionSink`]), the reporter ([`Reporter`]) and the entity
//! signal stream ([`SignalBus`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use api_runner::mock::RecordingSink;
//! use api_runner::plugin::{handler_fn, Plugin};
//! use api_runner::{ApiRunner, EventCatalog, InvocationArgs, PluginRegistry, RunTracker};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Spawn the tracker
//!     let (tracker, tracker_client) = RunTracker::new();
//!     tokio::spawn(tracker.run());
//!
//!     // 2. Register plugins
//!     let registry = PluginRegistry::new(vec![
//!         Plugin::new("gatsby-plugin-a", "1.0.0")
//!             .on("onPostBuild", handler_fn(|_| Ok(Some(json!("a"))))),
//!         Plugin::new("gatsby-plugin-b", "1.0.0")
//!             .on("onPostBuild", handler_fn(|_| Ok(None))),
//!     ]);
//!
//!     // 3. Build the runner
//!     let runner = ApiRunner::builder(
//!         registry,
//!         EventCatalog::new(["onPostBuild"]),
//!         tracker_client,
//!         Arc::new(RecordingSink::default()),
//!     )
//!     .build();
//!
//!     // 4. Dispatch
//!     let results = runner
//!         .dispatch("onPostBuild", InvocationArgs::new(), None)
//!         .await
//!         .unwrap();
//!     assert_eq!(results.len(), 1);
//!     assert_eq!(results[0].value, json!("a"));
//! }
//! ```
//!
//! ## Cascading Waits
//!
//! A handler may dispatch further events. When the original caller sets
//! [`InvocationArgs::wait_for_cascading_actions`] and a trace id, its future
//! resolves only after every run carrying that trace id has closed, including
//! the ones started by handlers. There is no timeout: a handler that never
//! settles keeps the waiter blocked.
//!
//! ## Concurrency Model
//!
//! - Handlers of one dispatch call run strictly in sequence
//! - Independent dispatch calls run concurrently and may interleave store writes
//! - The tracker processes its requests sequentially, so counters need no locks
//!
//! ## Testing
//!
//! The [`mock`] module provides a mock tracker client plus recording doubles
//! for the reporter and the store.

pub mod action;
pub mod args;
pub mod binder;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod mock;
pub mod plugin;
pub mod reporter;
pub mod restriction;
pub mod run;
pub mod runner;
pub mod signal;
pub mod tracing;
pub mod tracker;

// Re-export core types for convenience
pub use action::{Action, ActionContext, ActionCreator, ActionCreators, ActionSink};
pub use args::InvocationArgs;
pub use binder::{ActionBinder, Actions};
pub use client::RunTrackerClient;
pub use config::RunnerConfig;
pub use context::ApiCall;
pub use error::{HandlerError, RunnerError};
pub use event::{EventCatalog, IDLE_PROBE_EVENT};
pub use plugin::{HandlerResult, Plugin, PluginHandler, PluginIdentity, PluginRegistry};
pub use reporter::{Report, ReportKind, Reporter, Severity, TracingReporter};
pub use restriction::{ActionRestrictions, Behavior, Restriction};
pub use run::{PluginResult, RunId, RunRecord};
pub use runner::ApiRunner;
pub use signal::{Signal, SignalBus};
pub use tracker::RunTracker;
