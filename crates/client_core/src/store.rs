//! Canonical client-side graph.
//!
//! Every change goes through [`reduce`], one [`GraphAction`] per transition:
//! merge-by-id for updates, append for creates, filter-out-by-id for deletes,
//! replace-whole-collection for fetches. Only two actions touch more than one
//! collection: [`GraphAction::NodeRemoved`] also drops the node's connections,
//! and [`GraphAction::ConnectionAppended`] marks the nodes' `connections`
//! projection stale instead of patching it.

use std::collections::BTreeMap;

use shared::{
    domain::{
        Connection, ConnectionId, Interaction, Node, NodeId, Position, Report, ReportId, Subject,
        SubjectId, Whiteboard, WhiteboardId,
    },
    protocol::{NodeSummary, ZoomLevel},
};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::{
    error::RemoteFailure,
    view::{reduce_view, ViewAction, ViewFlags},
    ClientEvent,
};

/// Confirmation state of a locally edited entity.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus<T> {
    Confirmed,
    /// An edit is in flight; carries the optimistic value to display.
    Pending(T),
    /// The last edit was refused; the canonical entity still holds `last_good`.
    Failed {
        last_good: T,
        failure: RemoteFailure,
    },
}

/// The user-editable part of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub name: String,
    pub position: Position,
}

impl NodeDraft {
    pub fn of(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            position: node.position,
        }
    }
}

/// What invalidated the `Node::connections` projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionCause {
    ConnectionAppended(ConnectionId),
    ConnectionRemoved(ConnectionId),
    ConnectionsReplaced,
    NodeRemoved(NodeId),
}

/// Whether `Node::connections` still mirrors the connection set. Only a full
/// node fetch makes it fresh again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionFreshness {
    #[default]
    Fresh,
    Stale {
        cause: ProjectionCause,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphState {
    pub active_whiteboard: Option<WhiteboardId>,
    pub whiteboards: Vec<Whiteboard>,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub subjects: Vec<Subject>,
    pub reports: Vec<Report>,
    pub node_sync: BTreeMap<NodeId, SyncStatus<NodeDraft>>,
    pub node_connections: ProjectionFreshness,
}

impl GraphState {
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.node(node_id).is_some()
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|connection| connection.id == connection_id)
    }

    pub fn subject(&self, subject_id: SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|subject| subject.id == subject_id)
    }

    pub fn report(&self, report_id: ReportId) -> Option<&Report> {
        self.reports.iter().find(|report| report.id == report_id)
    }

    pub fn whiteboard(&self) -> Option<&Whiteboard> {
        let active = self.active_whiteboard?;
        self.whiteboards
            .iter()
            .find(|whiteboard| whiteboard.id == active)
    }

    pub fn sync_status(&self, node_id: NodeId) -> SyncStatus<NodeDraft> {
        self.node_sync
            .get(&node_id)
            .cloned()
            .unwrap_or(SyncStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphAction {
    WhiteboardsReplaced(Vec<Whiteboard>),
    WhiteboardActivated(WhiteboardId),
    ScaleConfirmed(ZoomLevel),
    NodesReplaced(Vec<Node>),
    NodeAppended(Node),
    NodeMerged(Node),
    NodeSummaryMerged {
        node_id: NodeId,
        summary: NodeSummary,
    },
    NodeRemoved(NodeId),
    NodeEditPending {
        node_id: NodeId,
        draft: NodeDraft,
    },
    NodeEditFailed {
        node_id: NodeId,
        failure: RemoteFailure,
    },
    InteractionsAppended {
        node_id: NodeId,
        interactions: Vec<Interaction>,
    },
    ConnectionsReplaced(Vec<Connection>),
    ConnectionAppended(Connection),
    ConnectionRemoved(ConnectionId),
    SubjectsReplaced(Vec<Subject>),
    SubjectAppended(Subject),
    SubjectMerged(Subject),
    SubjectSummaryMerged {
        subject_id: SubjectId,
        summary: Option<String>,
    },
    SubjectRemoved(SubjectId),
    ReportsReplaced(Vec<Report>),
    ReportAppended(Report),
}

fn upsert_by<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    match items.iter_mut().find(|existing| same(existing, &item)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Applies one action. Pure: the result depends only on the inputs.
pub fn reduce(mut state: GraphState, action: GraphAction) -> GraphState {
    match action {
        GraphAction::WhiteboardsReplaced(whiteboards) => {
            state.whiteboards = whiteboards;
        }
        GraphAction::WhiteboardActivated(whiteboard_id) => {
            state.active_whiteboard = Some(whiteboard_id);
        }
        GraphAction::ScaleConfirmed(level) => match state
            .whiteboards
            .iter_mut()
            .find(|whiteboard| whiteboard.id == level.id)
        {
            Some(whiteboard) => whiteboard.scale = level.scale,
            None => debug!(
                whiteboard_id = level.id.0,
                scale = level.scale,
                "dropping confirmed scale for whiteboard not yet fetched"
            ),
        },
        GraphAction::NodesReplaced(nodes) => {
            state
                .node_sync
                .retain(|node_id, _| nodes.iter().any(|node| node.id == *node_id));
            state.nodes = nodes;
            state.node_connections = ProjectionFreshness::Fresh;
        }
        GraphAction::NodeAppended(node) => {
            upsert_by(&mut state.nodes, node, |a, b| a.id == b.id);
        }
        GraphAction::NodeMerged(node) => {
            let node_id = node.id;
            match state.nodes.iter_mut().find(|existing| existing.id == node_id) {
                Some(existing) => {
                    *existing = node;
                    state.node_sync.remove(&node_id);
                }
                None => debug!(
                    node_id = node_id.0,
                    "dropping merge for node no longer in store"
                ),
            }
        }
        GraphAction::NodeSummaryMerged { node_id, summary } => {
            if let Some(node) = state.nodes.iter_mut().find(|node| node.id == node_id) {
                node.name = summary.name;
                node.summary = summary.summary;
            }
        }
        GraphAction::NodeRemoved(node_id) => {
            let projection_touched = state.nodes.iter().any(|node| {
                node.id != node_id
                    && node
                        .connections
                        .iter()
                        .any(|connection| connection.touches(node_id))
            });
            state.nodes.retain(|node| node.id != node_id);
            state
                .connections
                .retain(|connection| !connection.touches(node_id));
            state.node_sync.remove(&node_id);
            if projection_touched {
                state.node_connections = ProjectionFreshness::Stale {
                    cause: ProjectionCause::NodeRemoved(node_id),
                };
            }
        }
        GraphAction::NodeEditPending { node_id, draft } => {
            if state.contains_node(node_id) {
                state.node_sync.insert(node_id, SyncStatus::Pending(draft));
            }
        }
        GraphAction::NodeEditFailed { node_id, failure } => match state.node(node_id) {
            Some(node) => {
                let last_good = NodeDraft::of(node);
                state
                    .node_sync
                    .insert(node_id, SyncStatus::Failed { last_good, failure });
            }
            None => {
                state.node_sync.remove(&node_id);
            }
        },
        GraphAction::InteractionsAppended {
            node_id,
            interactions,
        } => match state.nodes.iter_mut().find(|node| node.id == node_id) {
            Some(node) => node.interaction_history.extend(interactions),
            None => debug!(
                node_id = node_id.0,
                dropped = interactions.len(),
                "dropping interactions for node no longer in store"
            ),
        },
        GraphAction::ConnectionsReplaced(connections) => {
            state.connections = connections;
            state.node_connections = ProjectionFreshness::Stale {
                cause: ProjectionCause::ConnectionsReplaced,
            };
        }
        GraphAction::ConnectionAppended(connection) => {
            let connection_id = connection.id;
            upsert_by(&mut state.connections, connection, |a, b| a.id == b.id);
            state.node_connections = ProjectionFreshness::Stale {
                cause: ProjectionCause::ConnectionAppended(connection_id),
            };
        }
        GraphAction::ConnectionRemoved(connection_id) => {
            state
                .connections
                .retain(|connection| connection.id != connection_id);
            state.node_connections = ProjectionFreshness::Stale {
                cause: ProjectionCause::ConnectionRemoved(connection_id),
            };
        }
        GraphAction::SubjectsReplaced(subjects) => {
            state.subjects = subjects;
        }
        GraphAction::SubjectAppended(subject) => {
            upsert_by(&mut state.subjects, subject, |a, b| a.id == b.id);
        }
        GraphAction::SubjectMerged(subject) => {
            let subject_id = subject.id;
            match state
                .subjects
                .iter_mut()
                .find(|existing| existing.id == subject_id)
            {
                Some(existing) => *existing = subject,
                None => debug!(
                    subject_id = subject_id.0,
                    "dropping merge for subject no longer in store"
                ),
            }
        }
        GraphAction::SubjectSummaryMerged {
            subject_id,
            summary,
        } => {
            if let Some(subject) = state
                .subjects
                .iter_mut()
                .find(|subject| subject.id == subject_id)
            {
                subject.summary = summary;
            }
        }
        GraphAction::SubjectRemoved(subject_id) => {
            state.subjects.retain(|subject| subject.id != subject_id);
        }
        GraphAction::ReportsReplaced(reports) => {
            state.reports = reports;
        }
        GraphAction::ReportAppended(report) => {
            upsert_by(&mut state.reports, report, |a, b| a.id == b.id);
        }
    }
    state
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub graph: GraphState,
    pub view: ViewFlags,
}

struct StoreInner {
    revision: u64,
    graph: GraphState,
    view: ViewFlags,
}

/// Shared state container. Hand it around as `Arc<Store>`; readers take
/// snapshots, writers dispatch actions.
pub struct Store {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<ClientEvent>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(GraphState::default(), ViewFlags::default())
    }

    pub fn with_state(graph: GraphState, view: ViewFlags) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            inner: Mutex::new(StoreInner {
                revision: 0,
                graph,
                view,
            }),
            events,
        }
    }

    /// Applies one graph action as a single transition and returns the new
    /// revision.
    pub async fn dispatch(&self, action: GraphAction) -> u64 {
        let revision = {
            let mut guard = self.inner.lock().await;
            let graph = std::mem::take(&mut guard.graph);
            guard.graph = reduce(graph, action);
            guard.revision += 1;
            guard.revision
        };
        let _ = self.events.send(ClientEvent::GraphChanged { revision });
        revision
    }

    pub async fn dispatch_view(&self, action: ViewAction) -> u64 {
        let revision = {
            let mut guard = self.inner.lock().await;
            let view = std::mem::take(&mut guard.view);
            guard.view = reduce_view(view, action);
            guard.revision += 1;
            guard.revision
        };
        let _ = self.events.send(ClientEvent::ViewChanged { revision });
        revision
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let guard = self.inner.lock().await;
        StoreSnapshot {
            revision: guard.revision,
            graph: guard.graph.clone(),
            view: guard.view.clone(),
        }
    }

    /// Runs `f` against the current state without cloning it.
    pub async fn read<R>(&self, f: impl FnOnce(&GraphState, &ViewFlags) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard.graph, &guard.view)
    }

    pub async fn revision(&self) -> u64 {
        self.inner.lock().await.revision
    }

    pub fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
