//! Issues remote operations and folds their results into the [`Store`].
//!
//! Point mutations are confirm-then-merge: the store only ever sees what the
//! backend answered. Mutations on the same entity run one at a time in issue
//! order through [`EntityQueue`]; whole-collection fetches are not queued, so
//! a fetch that lands after a newer merge still wins.

use std::sync::Arc;

use shared::{
    domain::{
        Connection, ConnectionId, ConnectionType, Interaction, NewNode, NewSubject, Node, NodeId,
        Position, Report, ReportId, Role, Subject, SubjectId, SubjectUpdate, Whiteboard,
        WhiteboardId, ZoomAction,
    },
    protocol::{NodeSummary, PromptExchange, ZoomLevel},
};
use tracing::{debug, info, warn};

use crate::{
    backend::{RemoteResult, WhiteboardBackend},
    error::{Operation, RemoteFailure},
    queue::{EntityKey, EntityQueue},
    store::{GraphAction, NodeDraft, Store},
    view::ViewAction,
    ClientEvent,
};

/// Everything a prompt round trip produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOutcome {
    pub exchange: PromptExchange,
    pub summary: NodeSummary,
}

pub struct MutationCoordinator {
    backend: Arc<dyn WhiteboardBackend>,
    store: Arc<Store>,
    queue: EntityQueue,
    whiteboard_id: WhiteboardId,
}

impl MutationCoordinator {
    pub fn new(
        backend: Arc<dyn WhiteboardBackend>,
        store: Arc<Store>,
        whiteboard_id: WhiteboardId,
    ) -> Self {
        Self {
            backend,
            store,
            queue: EntityQueue::new(),
            whiteboard_id,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn whiteboard_id(&self) -> WhiteboardId {
        self.whiteboard_id
    }

    fn failed(&self, failure: RemoteFailure) -> RemoteFailure {
        warn!(
            operation = %failure.operation,
            code = ?failure.code,
            status = ?failure.status,
            "mutation failed: {}",
            failure.message
        );
        self.store.publish(ClientEvent::MutationFailed {
            operation: failure.operation,
            failure: failure.clone(),
        });
        failure
    }

    // Fetches. Each replaces its collection wholesale.

    /// Lists whiteboards and makes sure the configured one is among them,
    /// loading it by id when the listing misses it or the backend has no
    /// listing route.
    pub async fn fetch_whiteboards(&self) -> RemoteResult<Vec<Whiteboard>> {
        let mut whiteboards = match self.backend.list_whiteboards().await {
            Ok(whiteboards) => whiteboards,
            Err(failure) if matches!(failure.status, Some(404 | 405)) => {
                debug!(
                    status = ?failure.status,
                    "whiteboard listing unavailable, loading the configured whiteboard alone"
                );
                Vec::new()
            }
            Err(failure) => return Err(self.failed(failure)),
        };
        if !whiteboards
            .iter()
            .any(|whiteboard| whiteboard.id == self.whiteboard_id)
        {
            match self.backend.get_whiteboard(self.whiteboard_id).await {
                Ok(whiteboard) => whiteboards.push(whiteboard),
                Err(failure) if failure.is_not_found() => {}
                Err(failure) => return Err(self.failed(failure)),
            }
        }

        let active_scale = whiteboards
            .iter()
            .find(|whiteboard| whiteboard.id == self.whiteboard_id)
            .map(|whiteboard| whiteboard.scale);
        self.store
            .dispatch(GraphAction::WhiteboardsReplaced(whiteboards.clone()))
            .await;

        match active_scale {
            Some(scale) => {
                self.store
                    .dispatch(GraphAction::WhiteboardActivated(self.whiteboard_id))
                    .await;
                self.store
                    .dispatch_view(ViewAction::VisualScaleSynced(scale))
                    .await;
            }
            None => warn!(
                whiteboard_id = self.whiteboard_id.0,
                "configured whiteboard is not among the fetched whiteboards"
            ),
        }
        Ok(whiteboards)
    }

    /// Reloads one node, interaction history included. Queued behind edits
    /// of the same node.
    pub async fn fetch_node(&self, node_id: NodeId) -> RemoteResult<Node> {
        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;
        let node = self
            .backend
            .get_node(node_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::NodeAppended(node.clone()))
            .await;
        Ok(node)
    }

    pub async fn fetch_nodes(&self) -> RemoteResult<Vec<Node>> {
        let nodes = self
            .backend
            .list_nodes()
            .await
            .map_err(|failure| self.failed(failure))?;
        debug!(count = nodes.len(), "replacing nodes");
        self.store
            .dispatch(GraphAction::NodesReplaced(nodes.clone()))
            .await;
        Ok(nodes)
    }

    pub async fn fetch_connections(&self) -> RemoteResult<Vec<Connection>> {
        let connections = self
            .backend
            .list_connections()
            .await
            .map_err(|failure| self.failed(failure))?;
        debug!(count = connections.len(), "replacing connections");
        self.store
            .dispatch(GraphAction::ConnectionsReplaced(connections.clone()))
            .await;
        Ok(connections)
    }

    pub async fn fetch_subjects(&self) -> RemoteResult<Vec<Subject>> {
        let subjects = self
            .backend
            .list_subjects(self.whiteboard_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::SubjectsReplaced(subjects.clone()))
            .await;
        Ok(subjects)
    }

    pub async fn fetch_reports(&self) -> RemoteResult<Vec<Report>> {
        let reports = self
            .backend
            .list_reports()
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::ReportsReplaced(reports.clone()))
            .await;
        Ok(reports)
    }

    /// Loads every collection. Nodes come after connections so the nodes'
    /// `connections` projection ends up fresh.
    pub async fn refresh_all(&self) -> RemoteResult<()> {
        self.fetch_whiteboards().await?;
        self.fetch_connections().await?;
        self.fetch_nodes().await?;
        self.fetch_subjects().await?;
        self.fetch_reports().await?;
        info!(whiteboard_id = self.whiteboard_id.0, "whiteboard refreshed");
        Ok(())
    }

    // Nodes.

    pub async fn create_node(&self, new_node: NewNode) -> RemoteResult<Node> {
        let node = self
            .backend
            .create_node(&new_node)
            .await
            .map_err(|failure| self.failed(failure))?;
        info!(node_id = node.id.0, "node created");
        self.store
            .dispatch(GraphAction::NodeAppended(node.clone()))
            .await;
        Ok(node)
    }

    /// Creates a node, then reloads every node so fields the backend derives
    /// on other nodes are current too.
    pub async fn create_node_and_refresh(&self, new_node: NewNode) -> RemoteResult<Node> {
        let node = self.create_node(new_node).await?;
        self.fetch_nodes().await?;
        Ok(node)
    }

    pub async fn move_node(&self, node_id: NodeId, position: Position) -> RemoteResult<Node> {
        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;
        self.mark_pending(node_id, |draft| draft.position = position)
            .await;

        let result = self.backend.update_node_position(node_id, position).await;
        self.settle_node_edit(node_id, result).await
    }

    pub async fn rename_node(&self, node_id: NodeId, name: &str) -> RemoteResult<Node> {
        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;
        self.mark_pending(node_id, |draft| draft.name = name.to_string())
            .await;

        let result = self.backend.rename_node(node_id, name).await;
        self.settle_node_edit(node_id, result).await
    }

    async fn mark_pending(&self, node_id: NodeId, edit: impl FnOnce(&mut NodeDraft)) {
        let draft = self
            .store
            .read(|graph, _| graph.node(node_id).map(NodeDraft::of))
            .await;
        if let Some(mut draft) = draft {
            edit(&mut draft);
            self.store
                .dispatch(GraphAction::NodeEditPending { node_id, draft })
                .await;
        }
    }

    async fn settle_node_edit(
        &self,
        node_id: NodeId,
        result: RemoteResult<Node>,
    ) -> RemoteResult<Node> {
        match result {
            Ok(node) => {
                info!(node_id = node_id.0, "node edit confirmed");
                self.store
                    .dispatch(GraphAction::NodeMerged(node.clone()))
                    .await;
                Ok(node)
            }
            Err(failure) => {
                self.store
                    .dispatch(GraphAction::NodeEditFailed {
                        node_id,
                        failure: failure.clone(),
                    })
                    .await;
                Err(self.failed(failure))
            }
        }
    }

    pub async fn delete_node(&self, node_id: NodeId) -> RemoteResult<NodeId> {
        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;
        let deleted = self
            .backend
            .delete_node(node_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        info!(node_id = deleted.0, "node deleted");
        self.store.dispatch(GraphAction::NodeRemoved(deleted)).await;
        self.store
            .dispatch_view(ViewAction::NodeRemoved(deleted))
            .await;
        Ok(deleted)
    }

    /// Records one message on a node and appends every row the backend
    /// persisted for it.
    pub async fn record_interaction(
        &self,
        node_id: NodeId,
        role: Role,
        content: &str,
    ) -> RemoteResult<Vec<Interaction>> {
        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;
        let interactions = self
            .backend
            .interact(node_id, role, content)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::InteractionsAppended {
                node_id,
                interactions: interactions.clone(),
            })
            .await;
        Ok(interactions)
    }

    /// Prompt, then summary, then a full node reload. A failing step stops
    /// the sequence; what earlier steps merged stays.
    pub async fn send_prompt(&self, node_id: NodeId, prompt: &str) -> RemoteResult<PromptOutcome> {
        if prompt.trim().is_empty() {
            return Err(self.failed(RemoteFailure::rejected(
                Operation::SendPrompt,
                "prompt must not be empty",
            )));
        }

        let _turn = self.queue.enter(EntityKey::Node(node_id)).await;

        let exchange = self
            .backend
            .send_prompt(node_id, prompt)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::InteractionsAppended {
                node_id,
                interactions: vec![
                    Interaction::unconfirmed(node_id, Role::User, exchange.user_prompt.clone()),
                    Interaction::unconfirmed(
                        node_id,
                        Role::Assistant,
                        exchange.llm_response.clone(),
                    ),
                ],
            })
            .await;

        let summary = self
            .backend
            .generate_node_summary(node_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::NodeSummaryMerged {
                node_id,
                summary: summary.clone(),
            })
            .await;

        self.fetch_nodes().await?;
        info!(node_id = node_id.0, "prompt exchange complete");
        Ok(PromptOutcome { exchange, summary })
    }

    // Connections.

    pub async fn connect_nodes(
        &self,
        source: NodeId,
        target: NodeId,
        kind: ConnectionType,
    ) -> RemoteResult<Connection> {
        if source == target {
            return Err(self.failed(RemoteFailure::rejected(
                Operation::ConnectNodes,
                "cannot connect a node to itself",
            )));
        }

        let _turn = self
            .queue
            .enter_all(&[EntityKey::Node(source), EntityKey::Node(target)])
            .await;
        let connection = self
            .backend
            .connect_nodes(source, target, kind)
            .await
            .map_err(|failure| self.failed(failure))?;
        info!(
            connection_id = connection.id.0,
            source = source.0,
            target = target.0,
            "nodes connected"
        );
        self.store
            .dispatch(GraphAction::ConnectionAppended(connection))
            .await;
        Ok(connection)
    }

    pub async fn delete_connection(
        &self,
        connection_id: ConnectionId,
    ) -> RemoteResult<ConnectionId> {
        let _turn = self
            .queue
            .enter(EntityKey::Connection(connection_id))
            .await;
        let deleted = self
            .backend
            .delete_connection(connection_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::ConnectionRemoved(deleted))
            .await;
        Ok(deleted)
    }

    // Subjects.

    pub async fn create_subject(&self, name: &str) -> RemoteResult<Subject> {
        let new_subject = NewSubject {
            name: name.to_string(),
            summary: None,
            whiteboard_id: self.whiteboard_id,
        };
        let subject = self
            .backend
            .create_subject(&new_subject)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::SubjectAppended(subject.clone()))
            .await;
        Ok(subject)
    }

    pub async fn update_subject(
        &self,
        subject_id: SubjectId,
        update: SubjectUpdate,
    ) -> RemoteResult<Subject> {
        let _turn = self.queue.enter(EntityKey::Subject(subject_id)).await;
        let subject = self
            .backend
            .update_subject(subject_id, &update)
            .await
            .map_err(|failure| self.failed(failure))?;
        info!(subject_id = subject_id.0, "subject update confirmed");
        self.store
            .dispatch(GraphAction::SubjectMerged(subject.clone()))
            .await;
        Ok(subject)
    }

    pub async fn delete_subject(&self, subject_id: SubjectId) -> RemoteResult<SubjectId> {
        let _turn = self.queue.enter(EntityKey::Subject(subject_id)).await;
        let deleted = self
            .backend
            .delete_subject(subject_id)
            .await
            .map_err(|failure| self.failed(failure))?;
        self.store
            .dispatch(GraphAction::SubjectRemoved(deleted))
            .await;
        Ok(deleted)
    }

    pub async fn summarize_subject(
        &self,
        subject_id: SubjectId,
        text: &str,
    ) -> RemoteResult<Option<String>> {
        let _turn = self.queue.enter(EntityKey::Subject(subject_id)).await;
        let summary = self
            .backend
            .summarize_subject(text, subject_id)
            .await
            .map_err(|failure| self.failed(failure))?
            .summary;
        self.store
            .dispatch(GraphAction::SubjectSummaryMerged {
                subject_id,
                summary: summary.clone(),
            })
            .await;
        Ok(summary)
    }

    // Whiteboard.

    /// The rendered scale moves at once; the confirmed scale follows the
    /// backend. A failed call leaves the rendered scale where it is.
    pub async fn zoom(&self, action: ZoomAction) -> RemoteResult<ZoomLevel> {
        self.store
            .dispatch_view(ViewAction::VisualZoom(action))
            .await;

        let _turn = self
            .queue
            .enter(EntityKey::Whiteboard(self.whiteboard_id))
            .await;
        let level = self
            .backend
            .update_zoom(self.whiteboard_id, action)
            .await
            .map_err(|failure| self.failed(failure))?;
        debug!(scale = level.scale, "zoom confirmed");
        self.store
            .dispatch(GraphAction::ScaleConfirmed(level))
            .await;
        Ok(level)
    }

    // Reports.

    pub async fn create_report(&self, show: bool) -> RemoteResult<Report> {
        self.store
            .dispatch_view(ViewAction::ReportCreationStarted)
            .await;

        match self.backend.create_report(self.whiteboard_id).await {
            Ok(report) => {
                info!(report_id = report.id.0, "report created");
                self.store
                    .dispatch(GraphAction::ReportAppended(report.clone()))
                    .await;
                self.store
                    .dispatch_view(ViewAction::ReportCreated {
                        report: report.clone(),
                        show,
                    })
                    .await;
                Ok(report)
            }
            Err(failure) => {
                self.store
                    .dispatch_view(ViewAction::ReportCreationFailed)
                    .await;
                Err(self.failed(failure))
            }
        }
    }

    /// Opens a report from the history list.
    pub async fn view_report(&self, report_id: ReportId) -> RemoteResult<Report> {
        self.store
            .dispatch_view(ViewAction::ReportFetchStarted(report_id))
            .await;

        match self.backend.get_report(report_id).await {
            Ok(report) => {
                self.store
                    .dispatch(GraphAction::ReportAppended(report.clone()))
                    .await;
                self.store
                    .dispatch_view(ViewAction::ReportFetched(report.clone()))
                    .await;
                Ok(report)
            }
            Err(failure) => {
                self.store
                    .dispatch_view(ViewAction::ReportFetchFailed(report_id))
                    .await;
                Err(self.failed(failure))
            }
        }
    }

    // UI intents. Local only.

    pub async fn expand_node(&self, node_id: NodeId) {
        self.store.dispatch_view(ViewAction::Expand(node_id)).await;
    }

    pub async fn close_expanded(&self) {
        self.store.dispatch_view(ViewAction::CloseExpanded).await;
    }

    pub async fn highlight(&self, node_id: Option<NodeId>) {
        self.store
            .dispatch_view(ViewAction::Highlight(node_id))
            .await;
    }

    pub async fn show_report(&self, show: bool) {
        self.store.dispatch_view(ViewAction::ShowReport(show)).await;
    }

    pub async fn show_report_history(&self, show: bool) {
        self.store
            .dispatch_view(ViewAction::ShowReportHistory(show))
            .await;
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
