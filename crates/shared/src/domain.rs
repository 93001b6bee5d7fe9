use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(WhiteboardId);
id_newtype!(SubjectId);
id_newtype!(NodeId);
id_newtype!(InteractionId);
id_newtype!(ConnectionId);
id_newtype!(ReportId);

pub const DEFAULT_NODE_NAME: &str = "New Node";
pub const DEFAULT_SCALE: f64 = 1.0;
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 2.0;
pub const ZOOM_STEP: f64 = 0.1;

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Whiteboard {
    pub id: WhiteboardId,
    pub name: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub whiteboard_id: WhiteboardId,
}

/// Full replacement of a subject's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectUpdate {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub whiteboard_id: WhiteboardId,
}

impl SubjectUpdate {
    /// Starts from the subject as it is now.
    pub fn of(subject: &Subject) -> Self {
        Self {
            name: subject.name.clone(),
            summary: subject.summary.clone(),
            whiteboard_id: subject.whiteboard_id,
        }
    }
}

/// Subject payload before the backend has assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub whiteboard_id: WhiteboardId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One chat turn recorded against a node.
///
/// `id` is `None` for turns appended from a prompt exchange; the next full node
/// fetch replaces them with the persisted rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub id: Option<InteractionId>,
    pub node_id: NodeId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl Interaction {
    pub fn unconfirmed(node_id: NodeId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            node_id,
            role,
            content: content.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    MainConnection,
    SubConnection,
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::MainConnection => "main_connection",
            ConnectionType::SubConnection => "sub_connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    #[serde(rename = "type_of_connection")]
    pub kind: ConnectionType,
}

impl Connection {
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }

    /// The endpoint opposite `node_id`, treating the edge as undirected.
    pub fn other_end(&self, node_id: NodeId) -> Option<NodeId> {
        if self.source_node_id == node_id {
            Some(self.target_node_id)
        } else if self.target_node_id == node_id {
            Some(self.source_node_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default = "default_node_name")]
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub summary: Option<String>,
    pub whiteboard_id: WhiteboardId,
    /// Outgoing edges as last reported by the backend. Goes stale after local
    /// connect/disconnect until the next full node fetch.
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub interaction_history: Vec<Interaction>,
}

/// Node payload before the backend has assigned an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    pub position: Position,
    pub whiteboard_id: WhiteboardId,
}

impl NewNode {
    pub fn new(whiteboard_id: WhiteboardId, position: Position) -> Self {
        Self {
            name: default_node_name(),
            prompt: None,
            subject_id: None,
            position,
            whiteboard_id,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_subject(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub whiteboard_id: WhiteboardId,
    pub title: String,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomAction {
    In,
    Out,
    Reset,
    Custom(f64),
}

impl ZoomAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoomAction::In => "in",
            ZoomAction::Out => "out",
            ZoomAction::Reset => "reset",
            ZoomAction::Custom(_) => "custom",
        }
    }

    /// Scale the backend will settle on for this action, clamped to
    /// [`MIN_SCALE`, `MAX_SCALE`].
    pub fn apply(self, current: f64) -> f64 {
        let next = match self {
            ZoomAction::In => current + ZOOM_STEP,
            ZoomAction::Out => current - ZOOM_STEP,
            ZoomAction::Reset => DEFAULT_SCALE,
            ZoomAction::Custom(scale) => scale,
        };
        next.clamp(MIN_SCALE, MAX_SCALE)
    }
}
