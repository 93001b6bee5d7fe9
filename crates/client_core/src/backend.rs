use async_trait::async_trait;
use shared::{
    domain::{
        Connection, ConnectionId, ConnectionType, Interaction, NewNode, NewSubject, Node, NodeId,
        Position, Report, ReportId, Role, Subject, SubjectId, SubjectUpdate, Whiteboard,
        WhiteboardId, ZoomAction,
    },
    protocol::{NodeSummary, PromptExchange, SubjectSummary, ZoomLevel},
};

use crate::error::{Operation, RemoteFailure};

pub type RemoteResult<T> = std::result::Result<T, RemoteFailure>;

/// The authoritative store plus LLM service, seen as one call per operation.
///
/// Implementations make exactly one attempt per call and never retry.
/// Successful results are the entity as the remote side persisted it.
#[async_trait]
pub trait WhiteboardBackend: Send + Sync {
    async fn create_node(&self, node: &NewNode) -> RemoteResult<Node>;
    async fn list_nodes(&self) -> RemoteResult<Vec<Node>>;
    async fn get_node(&self, node_id: NodeId) -> RemoteResult<Node>;
    async fn update_node_position(&self, node_id: NodeId, position: Position)
        -> RemoteResult<Node>;
    async fn rename_node(&self, node_id: NodeId, name: &str) -> RemoteResult<Node>;
    async fn delete_node(&self, node_id: NodeId) -> RemoteResult<NodeId>;
    /// Records a message; the backend answers with every row it persisted
    /// (the message itself followed by the assistant's reply).
    async fn interact(
        &self,
        node_id: NodeId,
        role: Role,
        content: &str,
    ) -> RemoteResult<Vec<Interaction>>;
    async fn send_prompt(&self, node_id: NodeId, prompt: &str) -> RemoteResult<PromptExchange>;
    async fn generate_node_summary(&self, node_id: NodeId) -> RemoteResult<NodeSummary>;

    async fn connect_nodes(
        &self,
        source: NodeId,
        target: NodeId,
        kind: ConnectionType,
    ) -> RemoteResult<Connection>;
    async fn list_connections(&self) -> RemoteResult<Vec<Connection>>;
    async fn delete_connection(&self, connection_id: ConnectionId) -> RemoteResult<ConnectionId>;

    async fn create_subject(&self, subject: &NewSubject) -> RemoteResult<Subject>;
    async fn list_subjects(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Vec<Subject>>;
    async fn update_subject(
        &self,
        subject_id: SubjectId,
        update: &SubjectUpdate,
    ) -> RemoteResult<Subject>;
    async fn delete_subject(&self, subject_id: SubjectId) -> RemoteResult<SubjectId>;
    async fn summarize_subject(
        &self,
        text: &str,
        subject_id: SubjectId,
    ) -> RemoteResult<SubjectSummary>;

    async fn list_whiteboards(&self) -> RemoteResult<Vec<Whiteboard>>;
    async fn get_whiteboard(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Whiteboard>;
    async fn update_zoom(
        &self,
        whiteboard_id: WhiteboardId,
        action: ZoomAction,
    ) -> RemoteResult<ZoomLevel>;

    async fn create_report(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Report>;
    async fn list_reports(&self) -> RemoteResult<Vec<Report>>;
    async fn get_report(&self, report_id: ReportId) -> RemoteResult<Report>;
}

/// Stands in when no backend is configured. Every call fails at once; nothing
/// is queued for later.
pub struct UnreachableBackend;

fn unavailable<T>(operation: Operation) -> RemoteResult<T> {
    Err(RemoteFailure::unavailable(
        operation,
        "whiteboard backend is unavailable",
    ))
}

#[async_trait]
impl WhiteboardBackend for UnreachableBackend {
    async fn create_node(&self, _node: &NewNode) -> RemoteResult<Node> {
        unavailable(Operation::CreateNode)
    }

    async fn list_nodes(&self) -> RemoteResult<Vec<Node>> {
        unavailable(Operation::ListNodes)
    }

    async fn get_node(&self, _node_id: NodeId) -> RemoteResult<Node> {
        unavailable(Operation::GetNode)
    }

    async fn update_node_position(
        &self,
        _node_id: NodeId,
        _position: Position,
    ) -> RemoteResult<Node> {
        unavailable(Operation::UpdateNodePosition)
    }

    async fn rename_node(&self, _node_id: NodeId, _name: &str) -> RemoteResult<Node> {
        unavailable(Operation::RenameNode)
    }

    async fn delete_node(&self, _node_id: NodeId) -> RemoteResult<NodeId> {
        unavailable(Operation::DeleteNode)
    }

    async fn interact(
        &self,
        _node_id: NodeId,
        _role: Role,
        _content: &str,
    ) -> RemoteResult<Vec<Interaction>> {
        unavailable(Operation::Interact)
    }

    async fn send_prompt(&self, _node_id: NodeId, _prompt: &str) -> RemoteResult<PromptExchange> {
        unavailable(Operation::SendPrompt)
    }

    async fn generate_node_summary(&self, _node_id: NodeId) -> RemoteResult<NodeSummary> {
        unavailable(Operation::GenerateNodeSummary)
    }

    async fn connect_nodes(
        &self,
        _source: NodeId,
        _target: NodeId,
        _kind: ConnectionType,
    ) -> RemoteResult<Connection> {
        unavailable(Operation::ConnectNodes)
    }

    async fn list_connections(&self) -> RemoteResult<Vec<Connection>> {
        unavailable(Operation::ListConnections)
    }

    async fn delete_connection(&self, _connection_id: ConnectionId) -> RemoteResult<ConnectionId> {
        unavailable(Operation::DeleteConnection)
    }

    async fn create_subject(&self, _subject: &NewSubject) -> RemoteResult<Subject> {
        unavailable(Operation::CreateSubject)
    }

    async fn list_subjects(&self, _whiteboard_id: WhiteboardId) -> RemoteResult<Vec<Subject>> {
        unavailable(Operation::ListSubjects)
    }

    async fn update_subject(
        &self,
        _subject_id: SubjectId,
        _update: &SubjectUpdate,
    ) -> RemoteResult<Subject> {
        unavailable(Operation::UpdateSubject)
    }

    async fn delete_subject(&self, _subject_id: SubjectId) -> RemoteResult<SubjectId> {
        unavailable(Operation::DeleteSubject)
    }

    async fn summarize_subject(
        &self,
        _text: &str,
        _subject_id: SubjectId,
    ) -> RemoteResult<SubjectSummary> {
        unavailable(Operation::SummarizeSubject)
    }

    async fn list_whiteboards(&self) -> RemoteResult<Vec<Whiteboard>> {
        unavailable(Operation::ListWhiteboards)
    }

    async fn get_whiteboard(&self, _whiteboard_id: WhiteboardId) -> RemoteResult<Whiteboard> {
        unavailable(Operation::GetWhiteboard)
    }

    async fn update_zoom(
        &self,
        _whiteboard_id: WhiteboardId,
        _action: ZoomAction,
    ) -> RemoteResult<ZoomLevel> {
        unavailable(Operation::UpdateZoom)
    }

    async fn create_report(&self, _whiteboard_id: WhiteboardId) -> RemoteResult<Report> {
        unavailable(Operation::CreateReport)
    }

    async fn list_reports(&self) -> RemoteResult<Vec<Report>> {
        unavailable(Operation::ListReports)
    }

    async fn get_report(&self, _report_id: ReportId) -> RemoteResult<Report> {
        unavailable(Operation::GetReport)
    }
}
