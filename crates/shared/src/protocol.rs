use serde::{Deserialize, Serialize};

use crate::domain::{
    Connection, ConnectionType, InteractionId, NodeId, Role, SubjectId, WhiteboardId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameQuery {
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectQuery {
    pub target_node_id: NodeId,
    pub type_of_connection: ConnectionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractQuery {
    pub role: Role,
    pub content: String,
}

/// Row shape returned by the interact endpoint; it omits `node_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRow {
    pub id: InteractionId,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub interactions: Vec<InteractionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

/// Result of one LLM round trip on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExchange {
    pub user_prompt: String,
    #[serde(default)]
    pub context_used: Option<String>,
    pub llm_response: String,
}

/// Generated title and summary for a node. The backend answers with the whole
/// node; only these two fields are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSummaryRequest {
    pub subject_id: SubjectId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectListQuery {
    pub whiteboard_id: WhiteboardId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomQuery {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevel {
    pub id: WhiteboardId,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReportRequest {
    pub whiteboard_id: WhiteboardId,
}
