//! # Run Tracker
//!
//! This module defines the `RunTracker`, the actor that owns all in-flight run
//! bookkeeping. It processes [`TrackerRequest`]s sequentially, so counter
//! increments and decrements never race and no lock guards the maps.

use crate::client::RunTrackerClient;
use crate::error::RunnerError;
use crate::message::{Response, TrackerRequest};
use crate::run::{PluginResult, RunId, RunOutcome, RunRecord, RunState, TraceKey};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Someone waiting for a trace to drain.
#[derive(Debug)]
enum Waiter {
    Quiescence(Response<()>),
    /// A closed run whose caller asked for cascading-wait.
    Cascade {
        record: RunRecord,
        respond_to: Response<RunRecord>,
    },
}

impl Waiter {
    fn resolve(self) {
        match self {
            Waiter::Quiescence(respond_to) => {
                let _ = respond_to.send(Ok(()));
            }
            Waiter::Cascade { record, respond_to } => {
                record.span.in_scope(|| debug!(run_id = %record.id, "Cascade drained"));
                let _ = respond_to.send(Ok(record));
            }
        }
    }
}

/// The actor tracking every open dispatch call.
///
/// # Bookkeeping
///
/// * `runs` maps open run ids to their records.
/// * `by_trace` counts open runs per trace id; an entry is removed as soon as
///   its count returns to zero.
/// * `waiters` holds everyone blocked on a trace draining.
/// * `idle` publishes the total open count; observers treat zero as
///   "queue empty".
///
/// # Usage Pattern
///
/// ```rust
/// use api_runner::tracker::RunTracker;
///
/// #[tokio::main]
/// async fn main() {
///     let (tracker, client) = RunTracker::new();
///     tokio::spawn(tracker.run());
///
///     assert_eq!(client.total_open_count().await.unwrap(), 0);
///     client.wait_for_quiescence(Some("t1")).await.unwrap();
/// }
/// ```
///
/// There is no timeout: a waiter on a trace that never drains waits forever.
pub struct RunTracker {
    receiver: mpsc::UnboundedReceiver<TrackerRequest>,
    runs: HashMap<RunId, RunRecord>,
    by_trace: HashMap<TraceKey, usize>,
    waiters: HashMap<TraceKey, Vec<Waiter>>,
    idle: watch::Sender<usize>,
}

impl RunTracker {
    /// Creates the tracker actor and its client.
    ///
    /// The channel is unbounded so opening a run can be enqueued without
    /// awaiting, which keeps a run started inside a handler ordered before
    /// that handler's own run closes.
    pub fn new() -> (Self, RunTrackerClient) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (idle, idle_rx) = watch::channel(0);
        let tracker = Self {
            receiver,
            runs: HashMap::new(),
            by_trace: HashMap::new(),
            waiters: HashMap::new(),
            idle,
        };
        (tracker, RunTrackerClient::new(sender, idle_rx))
    }

    /// Runs the event loop until every client is dropped.
    pub async fn run(mut self) {
        info!("Run tracker started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                TrackerRequest::Open { record, respond_to } => {
                    let id = self.open(record);
                    if respond_to.send(Ok(id.clone())).is_err() {
                        // Nobody holds the id, so nobody else can close the run.
                        warn!(run_id = %id, "Opener went away, cancelling run");
                        if let Some(record) = self.finish(&id, RunOutcome::Cancelled, Vec::new()) {
                            self.settle(&record.trace);
                        }
                    }
                }
                TrackerRequest::Close {
                    id,
                    outcome,
                    results,
                    wait_for_cascade,
                    respond_to,
                } => {
                    let Some(record) = self.finish(&id, outcome, results) else {
                        warn!(run_id = %id, "Close for unknown run");
                        let _ = respond_to.send(Err(RunnerError::UnknownRun(id.to_string())));
                        continue;
                    };
                    let trace = record.trace.clone();
                    if wait_for_cascade && self.count(&trace) > 0 {
                        self.waiters
                            .entry(trace.clone())
                            .or_default()
                            .push(Waiter::Cascade { record, respond_to });
                    } else {
                        let _ = respond_to.send(Ok(record));
                    }
                    self.settle(&trace);
                }
                TrackerRequest::WaitForQuiescence { trace, respond_to } => {
                    if self.count(&trace) == 0 {
                        let _ = respond_to.send(Ok(()));
                    } else {
                        debug!(trace_id = %trace, "Waiting for quiescence");
                        self.waiters
                            .entry(trace)
                            .or_default()
                            .push(Waiter::Quiescence(respond_to));
                    }
                }
                TrackerRequest::TotalOpen { respond_to } => {
                    let _ = respond_to.send(Ok(self.runs.len()));
                }
                TrackerRequest::OpenCount { trace, respond_to } => {
                    let _ = respond_to.send(Ok(self.count(&trace)));
                }
                TrackerRequest::Snapshot { id, respond_to } => {
                    let _ = respond_to.send(Ok(self.runs.get(&id).cloned()));
                }
            }
        }

        let pending: usize = self.waiters.values().map(Vec::len).sum();
        info!(open = self.runs.len(), pending, "Run tracker shutdown");
    }

    fn open(&mut self, mut record: RunRecord) -> RunId {
        if self.runs.contains_key(&record.id) {
            let base = record.id.clone();
            let mut n = 2;
            while self.runs.contains_key(&record.id) {
                record.id = RunId::new(format!("{base}#{n}"));
                n += 1;
            }
            debug!(run_id = %record.id, "Disambiguated colliding run id");
        }

        record.state = RunState::Running;
        let id = record.id.clone();
        let count = self.by_trace.entry(record.trace.clone()).or_insert(0);
        *count += 1;
        info!(
            run_id = %id,
            api = %record.event,
            trace_id = %record.trace,
            trace_open = *count,
            open = self.runs.len() + 1,
            "Opened"
        );
        self.runs.insert(id.clone(), record);
        self.publish_open_count();
        id
    }

    /// Removes a run and stamps its outcome. `None` when the id is not open.
    fn finish(
        &mut self,
        id: &RunId,
        outcome: RunOutcome,
        results: Vec<PluginResult>,
    ) -> Option<RunRecord> {
        let mut record = self.runs.remove(id)?;
        record.state = RunState::from(outcome);
        record.results = results;
        let remaining = self.decrement(&record.trace);
        info!(
            run_id = %id,
            trace_id = %record.trace,
            state = ?record.state,
            remaining,
            open = self.runs.len(),
            "Closed"
        );
        Some(record)
    }

    /// Wakes the trace's waiters once it has drained and republishes the open count.
    fn settle(&mut self, trace: &TraceKey) {
        if self.count(trace) == 0 {
            self.drain(trace);
        }
        self.publish_open_count();
    }

    fn count(&self, trace: &TraceKey) -> usize {
        self.by_trace.get(trace).copied().unwrap_or(0)
    }

    fn decrement(&mut self, trace: &TraceKey) -> usize {
        match self.by_trace.get_mut(trace) {
            Some(count) => {
                *count = count.saturating_sub(1);
                let remaining = *count;
                if remaining == 0 {
                    self.by_trace.remove(trace);
                }
                remaining
            }
            None => 0,
        }
    }

    fn drain(&mut self, trace: &TraceKey) {
        if let Some(waiters) = self.waiters.remove(trace) {
            debug!(trace_id = %trace, waiters = waiters.len(), "Trace drained");
            waiters.into_iter().for_each(Waiter::resolve);
        }
    }

    fn publish_open_count(&self) {
        let open = self.runs.len();
        self.idle.send_replace(open);
        if open == 0 {
            info!("Run queue empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::InvocationArgs;
    use crate::config::RunnerConfig;
    use tracing::Span;

    fn record(event: &str, trace_id: Option<&str>) -> RunRecord {
        let mut args = InvocationArgs::new();
        args.trace_id = trace_id.map(str::to_string);
        RunRecord::new(event, &args, None, Span::none(), &RunnerConfig::default())
    }

    fn spawn() -> RunTrackerClient {
        let (tracker, client) = RunTracker::new();
        tokio::spawn(tracker.run());
        client
    }

    #[tokio::test]
    async fn test_open_then_close_nets_to_zero() {
        let client = spawn();
        let id = client.open(record("onPreInit", Some("t1"))).await.unwrap();
        assert_eq!(client.open_count(Some("t1")).await.unwrap(), 1);
        assert_eq!(client.total_open_count().await.unwrap(), 1);

        let closed = client
            .close(id, RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap();
        assert_eq!(closed.state, RunState::Completed);
        assert_eq!(client.open_count(Some("t1")).await.unwrap(), 0);
        assert_eq!(client.total_open_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_colliding_ids_stay_unique() {
        let client = spawn();
        let first = record("onPreInit", None);
        let mut second = record("onPreInit", None);
        second.id = first.id.clone();

        let a = client.open(first).await.unwrap();
        let b = client.open(second).await.unwrap();
        assert_ne!(a, b);
        assert!(b.as_str().ends_with("#2"));
        assert_eq!(client.total_open_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_is_cancelled_when_opener_goes_away() {
        let client = spawn();
        // The request is enqueued on call; dropping the future drops the reply side.
        drop(client.open(record("onPreInit", Some("t1"))));

        assert_eq!(client.open_count(Some("t1")).await.unwrap(), 0);
        assert_eq!(client.total_open_count().await.unwrap(), 0);
        client.wait_for_quiescence(Some("t1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_marks_running() {
        let client = spawn();
        let id = client.open(record("onPreInit", None)).await.unwrap();
        let snapshot = client.snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.state, RunState::Running);
    }

    #[tokio::test]
    async fn test_close_unknown_run_is_error() {
        let client = spawn();
        let err = client
            .close(RunId::new("nope"), RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::UnknownRun(_)));
    }

    #[tokio::test]
    async fn test_quiescence_waits_for_every_run_of_trace() {
        let client = spawn();
        let outer = client.open(record("sourceNodes", Some("t1"))).await.unwrap();
        let inner = client.open(record("onCreateNode", Some("t1"))).await.unwrap();
        let other = client.open(record("onCreateNode", Some("t2"))).await.unwrap();

        let waiter = tokio::spawn(client.wait_for_quiescence(Some("t1")));

        client
            .close(outer, RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap();
        client
            .close(other, RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        client
            .close(inner, RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cascading_close_parks_until_drained() {
        let client = spawn();
        let outer = client.open(record("sourceNodes", Some("t1"))).await.unwrap();
        let inner = client.open(record("onCreateNode", Some("t1"))).await.unwrap();

        let parked = tokio::spawn(client.close(outer, RunOutcome::Completed, Vec::new(), true));
        // The parked close still removes the record.
        assert_eq!(client.total_open_count().await.unwrap(), 1);
        assert!(!parked.is_finished());

        client
            .close(inner, RunOutcome::Cancelled, Vec::new(), false)
            .await
            .unwrap();
        let record = parked.await.unwrap().unwrap();
        assert_eq!(record.event, "sourceNodes");
    }

    #[tokio::test]
    async fn test_idle_observable_reports_zero() {
        let client = spawn();
        let mut idle = client.subscribe_idle();
        let id = client.open(record("onPreInit", None)).await.unwrap();
        idle.changed().await.unwrap();
        assert_eq!(*idle.borrow_and_update(), 1);

        client
            .close(id, RunOutcome::Completed, Vec::new(), false)
            .await
            .unwrap();
        client.wait_idle().await.unwrap();
        assert_eq!(*idle.borrow(), 0);
    }

    #[tokio::test]
    async fn test_waiters_fail_when_tracker_stops() {
        let (tracker, client) = RunTracker::new();
        let handle = tokio::spawn(tracker.run());
        client.open(record("onPreInit", Some("t1"))).await.unwrap();

        // The request is enqueued here; the future only holds the response side.
        let waiter = tokio::spawn(client.wait_for_quiescence(Some("t1")));
        drop(client);
        handle.await.unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, RunnerError::TrackerDropped));
    }
}
