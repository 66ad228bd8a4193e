//! # Test Doubles
//!
//! Helpers for testing code that sits on top of the engine without a real
//! tracker, reporter or store.
//!
//! | Helper | Stands in for |
//! |--------|---------------|
//! | [`create_mock_tracker`] | a spawned [`RunTracker`](crate::tracker::RunTracker) |
//! | [`RecordingReporter`] | the host's reporter |
//! | [`RecordingSink`] | the host's store |
//!
//! With a mock tracker the test plays the actor: it receives each
//! [`TrackerRequest`] and answers it, which makes the order of tracker calls
//! observable.
//!
//! ```rust
//! use api_runner::mock::{create_mock_tracker, expect_open};
//! use api_runner::run::RunId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, mut requests) = create_mock_tracker();
//!     let opening = client.open(api_runner::run::RunRecord::new(
//!         "onPreInit",
//!         &Default::default(),
//!         None,
//!         tracing::Span::none(),
//!         &Default::default(),
//!     ));
//!
//!     let (record, respond_to) = expect_open(&mut requests).await.unwrap();
//!     assert_eq!(record.event, "onPreInit");
//!     respond_to.send(Ok(RunId::new("run-1"))).unwrap();
//!     assert_eq!(opening.await.unwrap().as_str(), "run-1");
//! }
//! ```

use crate::action::{Action, ActionSink};
use crate::client::RunTrackerClient;
use crate::message::{Response, TrackerRequest};
use crate::reporter::{Report, ReportKind, Reporter};
use crate::run::{PluginResult, RunId, RunOutcome, RunRecord};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

/// A tracker client whose requests land in the returned receiver.
///
/// The idle observable of the client stays at zero.
pub fn create_mock_tracker() -> (RunTrackerClient, mpsc::UnboundedReceiver<TrackerRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let (_idle, idle_rx) = watch::channel(0);
    (RunTrackerClient::new(sender, idle_rx), receiver)
}

/// Next request, if it is an `Open`.
pub async fn expect_open(
    receiver: &mut mpsc::UnboundedReceiver<TrackerRequest>,
) -> Option<(RunRecord, Response<RunId>)> {
    match receiver.recv().await {
        Some(TrackerRequest::Open { record, respond_to }) => Some((record, respond_to)),
        _ => None,
    }
}

/// A received `Close` request.
#[derive(Debug)]
pub struct CloseRequest {
    pub id: RunId,
    pub outcome: RunOutcome,
    pub results: Vec<PluginResult>,
    pub wait_for_cascade: bool,
    pub respond_to: Response<RunRecord>,
}

/// Next request, if it is a `Close`.
pub async fn expect_close(
    receiver: &mut mpsc::UnboundedReceiver<TrackerRequest>,
) -> Option<CloseRequest> {
    match receiver.recv().await {
        Some(TrackerRequest::Close {
            id,
            outcome,
            results,
            wait_for_cascade,
            respond_to,
        }) => Some(CloseRequest {
            id,
            outcome,
            results,
            wait_for_cascade,
            respond_to,
        }),
        _ => None,
    }
}

/// Collects every report.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn of_kind(&self, kind: ReportKind) -> Vec<Report> {
        self.reports()
            .into_iter()
            .filter(|report| report.kind == kind)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, report: Report) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

/// Collects every dispatched action.
#[derive(Debug, Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<Action>>,
}

impl RecordingSink {
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.actions().into_iter().map(|action| action.kind).collect()
    }
}

impl ActionSink for RecordingSink {
    fn dispatch(&self, action: Action) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }
}
