//! # Run Tracker Client
//!
//! This module defines the cloneable handle used to talk to the
//! [`RunTracker`](crate::tracker::RunTracker) actor.

use crate::error::RunnerError;
use crate::message::{Response, TrackerRequest};
use crate::run::{PluginResult, RunId, RunOutcome, RunRecord, TraceKey};
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};

/// A type-safe client for the run tracker.
///
/// Every request is enqueued when the method is *called*, not when the
/// returned future is first polled. The dispatcher relies on this to count a
/// nested run before the run that spawned it can close.
#[derive(Clone, Debug)]
pub struct RunTrackerClient {
    sender: mpsc::UnboundedSender<TrackerRequest>,
    idle: watch::Receiver<usize>,
}

impl RunTrackerClient {
    pub fn new(sender: mpsc::UnboundedSender<TrackerRequest>, idle: watch::Receiver<usize>) -> Self {
        Self { sender, idle }
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Response<T>) -> TrackerRequest,
    ) -> impl Future<Output = Result<T, RunnerError>> + Send + 'static
    where
        T: Send + 'static,
    {
        let (respond_to, response) = oneshot::channel();
        let sent = self
            .sender
            .send(make(respond_to))
            .map_err(|_| RunnerError::TrackerClosed);
        async move {
            sent?;
            response.await.map_err(|_| RunnerError::TrackerDropped)?
        }
    }

    pub fn open(
        &self,
        record: RunRecord,
    ) -> impl Future<Output = Result<RunId, RunnerError>> + Send + 'static {
        self.request(move |respond_to| TrackerRequest::Open { record, respond_to })
    }

    /// Closes a run. With `wait_for_cascade` the future resolves only once no
    /// run sharing its trace id is open any more.
    pub fn close(
        &self,
        id: RunId,
        outcome: RunOutcome,
        results: Vec<PluginResult>,
        wait_for_cascade: bool,
    ) -> impl Future<Output = Result<RunRecord, RunnerError>> + Send + 'static {
        self.request(move |respond_to| TrackerRequest::Close {
            id,
            outcome,
            results,
            wait_for_cascade,
            respond_to,
        })
    }

    pub fn wait_for_quiescence(
        &self,
        trace_id: Option<&str>,
    ) -> impl Future<Output = Result<(), RunnerError>> + Send + 'static {
        let trace = TraceKey::from(trace_id);
        self.request(move |respond_to| TrackerRequest::WaitForQuiescence { trace, respond_to })
    }

    pub fn total_open_count(&self) -> impl Future<Output = Result<usize, RunnerError>> + Send + 'static {
        self.request(move |respond_to| TrackerRequest::TotalOpen { respond_to })
    }

    pub fn open_count(
        &self,
        trace_id: Option<&str>,
    ) -> impl Future<Output = Result<usize, RunnerError>> + Send + 'static {
        let trace = TraceKey::from(trace_id);
        self.request(move |respond_to| TrackerRequest::OpenCount { trace, respond_to })
    }

    pub fn snapshot(
        &self,
        id: RunId,
    ) -> impl Future<Output = Result<Option<RunRecord>, RunnerError>> + Send + 'static {
        self.request(move |respond_to| TrackerRequest::Snapshot { id, respond_to })
    }

    /// Observes the total open count; zero means the queue is empty.
    pub fn subscribe_idle(&self) -> watch::Receiver<usize> {
        self.idle.clone()
    }

    /// Resolves once no run is open anywhere.
    pub async fn wait_idle(&self) -> Result<(), RunnerError> {
        let mut idle = self.idle.clone();
        idle.wait_for(|open| *open == 0)
            .await
            .map(|_| ())
            .map_err(|_| RunnerError::TrackerDropped)
    }
}
