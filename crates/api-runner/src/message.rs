//! # Tracker Messages
//!
//! The request enum the [`RunTrackerClient`](crate::client::RunTrackerClient)
//! sends to the [`RunTracker`](crate::tracker::RunTracker) actor. Every request
//! carries a one-shot channel the actor answers on.

use crate::error::RunnerError;
use crate::run::{PluginResult, RunId, RunOutcome, RunRecord, TraceKey};
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the tracker.
pub type Response<T> = oneshot::Sender<Result<T, RunnerError>>;

#[derive(Debug)]
pub enum TrackerRequest {
    /// Insert a record and count it against its trace.
    Open {
        record: RunRecord,
        respond_to: Response<RunId>,
    },
    /// Remove a record. With `wait_for_cascade` the answer is parked until the
    /// trace drains.
    Close {
        id: RunId,
        outcome: RunOutcome,
        results: Vec<PluginResult>,
        wait_for_cascade: bool,
        respond_to: Response<RunRecord>,
    },
    WaitForQuiescence {
        trace: TraceKey,
        respond_to: Response<()>,
    },
    TotalOpen {
        respond_to: Response<usize>,
    },
    OpenCount {
        trace: TraceKey,
        respond_to: Response<usize>,
    },
    Snapshot {
        id: RunId,
        respond_to: Response<Option<RunRecord>>,
    },
}
