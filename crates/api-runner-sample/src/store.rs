//! # Build Store
//!
//! The sample's mutation sink. Every action a plugin dispatches is reduced
//! here, in arrival order, under one lock.
//!
//! Two reductions feed back into the lifecycle:
//!
//! - a new or changed page publishes `EntityCreated` and runs `onCreatePage`
//!   on behalf of the plugin that created it,
//! - a new or changed node runs `onCreateNode`.
//!
//! Follow-up runs inherit the action's trace id, so a caller waiting on that
//! trace also waits for them. Deleting a page publishes `EntityRemoved`.
//!
//! The store needs the runner and the runner needs the store as its sink, so
//! the runner is attached after construction and detached on shutdown.

use crate::model::{FieldExtension, Node, Page, PageDelete};
use api_runner::{Action, ActionSink, ApiRunner, InvocationArgs, Signal, SignalBus};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Default)]
struct BuildState {
    pages: BTreeMap<String, Page>,
    nodes: BTreeMap<String, Node>,
    types: Vec<Value>,
    field_extensions: BTreeMap<String, FieldExtension>,
    third_party_schemas: Vec<Value>,
    history: Vec<String>,
}

/// What a reduction asks for once the lock is released.
enum FollowUp {
    None,
    PageCreated { page: Page, trace_id: Option<String> },
    PageRemoved { path: String },
    NodeCreated { node: Node, trace_id: Option<String> },
}

#[derive(Debug, Default)]
pub struct BuildStore {
    state: Mutex<BuildState>,
    signals: SignalBus,
    runner: Mutex<Option<ApiRunner>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decode<T: DeserializeOwned>(action: &Action) -> Option<T> {
    match serde_json::from_value(action.payload.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(kind = %action.kind, error = %err, "Malformed action payload");
            None
        }
    }
}

impl BuildStore {
    pub fn new(signals: SignalBus) -> Self {
        Self {
            signals,
            ..Self::default()
        }
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Enables follow-up lifecycle runs.
    pub fn attach_runner(&self, runner: ApiRunner) {
        *lock(&self.runner) = Some(runner);
    }

    /// Drops the store's runner handle so the tracker can shut down.
    pub fn detach_runner(&self) -> Option<ApiRunner> {
        lock(&self.runner).take()
    }

    pub fn pages(&self) -> Vec<Page> {
        lock(&self.state).pages.values().cloned().collect()
    }

    pub fn page(&self, path: &str) -> Option<Page> {
        lock(&self.state).pages.get(path).cloned()
    }

    pub fn page_paths(&self) -> Vec<String> {
        lock(&self.state).pages.keys().cloned().collect()
    }

    pub fn nodes(&self) -> Vec<Node> {
        lock(&self.state).nodes.values().cloned().collect()
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        lock(&self.state).nodes.get(id).cloned()
    }

    pub fn nodes_of_type(&self, kind: &str) -> Vec<Node> {
        lock(&self.state)
            .nodes
            .values()
            .filter(|node| node.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn types(&self) -> Vec<Value> {
        lock(&self.state).types.clone()
    }

    pub fn field_extension(&self, name: &str) -> Option<FieldExtension> {
        lock(&self.state).field_extensions.get(name).cloned()
    }

    pub fn field_extensions(&self) -> Vec<FieldExtension> {
        lock(&self.state).field_extensions.values().cloned().collect()
    }

    pub fn third_party_schemas(&self) -> Vec<Value> {
        lock(&self.state).third_party_schemas.clone()
    }

    /// Kinds of every reduced action, in order.
    pub fn history(&self) -> Vec<String> {
        lock(&self.state).history.clone()
    }

    fn reduce(&self, action: &Action) -> FollowUp {
        let owner = action.plugin.as_ref().map(|p| p.name.clone());
        let mut state = lock(&self.state);
        state.history.push(action.kind.clone());

        match action.kind.as_str() {
            "CREATE_PAGE" => {
                let Some(mut page) = decode::<Page>(action) else {
                    return FollowUp::None;
                };
                page.plugin_creator = owner;
                if state.pages.get(&page.path) == Some(&page) {
                    return FollowUp::None;
                }
                state.pages.insert(page.path.clone(), page.clone());
                FollowUp::PageCreated {
                    page,
                    trace_id: action.trace_id.clone(),
                }
            }
            "DELETE_PAGE" => {
                let Some(delete) = decode::<PageDelete>(action) else {
                    return FollowUp::None;
                };
                state.pages.remove(&delete.path);
                FollowUp::PageRemoved { path: delete.path }
            }
            "CREATE_NODE" => {
                let Some(mut node) = decode::<Node>(action) else {
                    return FollowUp::None;
                };
                let unchanged = state
                    .nodes
                    .get(&node.id)
                    .is_some_and(|old| old.internal.content_digest == node.internal.content_digest);
                if unchanged {
                    debug!(node_id = %node.id, "Node unchanged");
                    return FollowUp::None;
                }
                node.internal.owner = owner;
                state.nodes.insert(node.id.clone(), node.clone());
                FollowUp::NodeCreated {
                    node,
                    trace_id: action.trace_id.clone(),
                }
            }
            "CREATE_TYPES" => {
                state.types.push(action.payload.clone());
                FollowUp::None
            }
            "CREATE_FIELD_EXTENSION" => {
                if let Some(name) = action.payload.get("name").and_then(Value::as_str) {
                    let extension = FieldExtension {
                        name: name.to_string(),
                        args: action.payload["extension"]
                            .get("args")
                            .cloned()
                            .unwrap_or(Value::Null),
                        plugin: owner,
                    };
                    state.field_extensions.insert(extension.name.clone(), extension);
                }
                FollowUp::None
            }
            "ADD_THIRD_PARTY_SCHEMA" => {
                state.third_party_schemas.push(action.payload.clone());
                FollowUp::None
            }
            other => {
                warn!(kind = other, "No reducer for action");
                FollowUp::None
            }
        }
    }

    fn follow_up(&self, event: &str, args: InvocationArgs, plugin_source: Option<&str>) {
        let Some(runner) = lock(&self.runner).clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(api = event, "No runtime for follow-up run");
            return;
        };
        // Counted against the trace right here, before the caller's run closes.
        let run = runner.dispatch(event, args, plugin_source);
        let event = event.to_string();
        handle.spawn(async move {
            if let Err(err) = run.await {
                warn!(api = %event, error = %err, "Follow-up run failed");
            }
        });
    }
}

impl ActionSink for BuildStore {
    fn dispatch(&self, action: Action) {
        let plugin = action.plugin.as_ref().map(|p| p.name.clone());
        match self.reduce(&action) {
            FollowUp::None => {}
            FollowUp::PageCreated { page, trace_id } => {
                info!(path = %page.path, plugin = ?plugin, "Created page");
                self.signals.emit(Signal::EntityCreated {
                    path: page.path.clone(),
                    owner: plugin.clone(),
                    trace_id: trace_id.clone(),
                });
                let mut args = InvocationArgs::new().with_field("page", json!(page));
                args.trace_id = trace_id;
                self.follow_up("onCreatePage", args, plugin.as_deref());
            }
            FollowUp::PageRemoved { path } => {
                info!(path = %path, plugin = ?plugin, "Deleted page");
                self.signals.emit(Signal::EntityRemoved { path });
            }
            FollowUp::NodeCreated { node, trace_id } => {
                debug!(node_id = %node.id, kind = %node.kind(), "Created node");
                let mut args = InvocationArgs::new()
                    .with_field("node", json!(node))
                    .with_tag("nodeId", node.id.clone())
                    .with_tag("nodeType", node.kind().to_string());
                args.trace_id = trace_id;
                self.follow_up("onCreateNode", args, None);
            }
        }
    }
}

impl std::fmt::Debug for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildState")
            .field("pages", &self.pages.len())
            .field("nodes", &self.nodes.len())
            .field("types", &self.types.len())
            .finish_non_exhaustive()
    }
}
