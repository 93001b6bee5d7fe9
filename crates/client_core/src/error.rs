use std::fmt;

use shared::{
    domain::{ConnectionId, NodeId},
    error::{ApiError, DetailBody, ErrorCode},
};
use thiserror::Error;

/// Every call the remote boundary knows how to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateNode,
    ListNodes,
    GetNode,
    UpdateNodePosition,
    RenameNode,
    DeleteNode,
    Interact,
    SendPrompt,
    GenerateNodeSummary,
    ConnectNodes,
    ListConnections,
    DeleteConnection,
    CreateSubject,
    ListSubjects,
    UpdateSubject,
    DeleteSubject,
    SummarizeSubject,
    ListWhiteboards,
    GetWhiteboard,
    UpdateZoom,
    CreateReport,
    ListReports,
    GetReport,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateNode => "create_node",
            Operation::ListNodes => "list_nodes",
            Operation::GetNode => "get_node",
            Operation::UpdateNodePosition => "update_node_position",
            Operation::RenameNode => "rename_node",
            Operation::DeleteNode => "delete_node",
            Operation::Interact => "interact",
            Operation::SendPrompt => "send_prompt",
            Operation::GenerateNodeSummary => "generate_node_summary",
            Operation::ConnectNodes => "connect_nodes",
            Operation::ListConnections => "list_connections",
            Operation::DeleteConnection => "delete_connection",
            Operation::CreateSubject => "create_subject",
            Operation::ListSubjects => "list_subjects",
            Operation::UpdateSubject => "update_subject",
            Operation::DeleteSubject => "delete_subject",
            Operation::SummarizeSubject => "summarize_subject",
            Operation::ListWhiteboards => "list_whiteboards",
            Operation::GetWhiteboard => "get_whiteboard",
            Operation::UpdateZoom => "update_zoom",
            Operation::CreateReport => "create_report",
            Operation::ListReports => "list_reports",
            Operation::GetReport => "get_report",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote call that failed, or a request refused before it was sent.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{operation} failed with {code:?}: {message}")]
pub struct RemoteFailure {
    pub operation: Operation,
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status when the backend answered; `None` for transport errors and
    /// local rejections.
    pub status: Option<u16>,
    /// Error body exactly as the backend sent it, when it was JSON.
    pub payload: Option<serde_json::Value>,
}

impl RemoteFailure {
    pub fn new(operation: Operation, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            operation,
            code,
            message: message.into(),
            status: None,
            payload: None,
        }
    }

    pub fn rejected(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, ErrorCode::Validation, message)
    }

    pub fn unavailable(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, ErrorCode::Unavailable, message)
    }

    /// Builds a failure from a non-success HTTP answer. Understands the
    /// `{code, message}` body and FastAPI's `{detail}` body; anything else is
    /// kept as raw text.
    pub fn from_response(operation: Operation, status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<serde_json::Value>(body).ok();
        let mut code = ErrorCode::from_status(status);
        let message = match &payload {
            Some(value) => {
                if let Ok(api_error) = serde_json::from_value::<ApiError>(value.clone()) {
                    code = api_error.code;
                    api_error.message
                } else if let Ok(detail) = serde_json::from_value::<DetailBody>(value.clone()) {
                    detail.message()
                } else {
                    value.to_string()
                }
            }
            None if body.trim().is_empty() => format!("remote answered with status {status}"),
            None => body.trim().to_string(),
        };

        Self {
            operation,
            code,
            message,
            status: Some(status),
            payload,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

/// A view refers to an entity the store no longer holds. Read-time only; the
/// view renders nothing for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReferentialGap {
    #[error("expanded node {0} is no longer in the store")]
    ExpandedNode(NodeId),
    #[error("highlighted node {0} is no longer in the store")]
    HighlightedNode(NodeId),
    #[error("connection {connection_id} references missing node {node_id}")]
    DanglingConnection {
        connection_id: ConnectionId,
        node_id: NodeId,
    },
}
