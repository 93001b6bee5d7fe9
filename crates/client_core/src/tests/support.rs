use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{
        Connection, ConnectionId, ConnectionType, Interaction, InteractionId, NewNode, NewSubject,
        Node, NodeId, Position, Report, ReportId, Role, Subject, SubjectId, SubjectUpdate,
        Whiteboard, WhiteboardId, ZoomAction, DEFAULT_NODE_NAME, DEFAULT_SCALE,
    },
    protocol::{NodeSummary, PromptExchange, SubjectSummary, ZoomLevel},
};
use tokio::sync::{oneshot, Mutex};

use crate::{
    backend::{RemoteResult, WhiteboardBackend},
    coordinator::MutationCoordinator,
    error::{Operation, RemoteFailure},
    store::Store,
};

pub(crate) const WHITEBOARD: WhiteboardId = WhiteboardId(1);

pub(crate) fn node(id: i64, name: &str) -> Node {
    Node {
        id: NodeId(id),
        name: name.to_string(),
        prompt: None,
        subject_id: None,
        position: Position::default(),
        summary: None,
        whiteboard_id: WHITEBOARD,
        connections: Vec::new(),
        interaction_history: Vec::new(),
    }
}

pub(crate) fn connection(id: i64, source: i64, target: i64) -> Connection {
    Connection {
        id: ConnectionId(id),
        source_node_id: NodeId(source),
        target_node_id: NodeId(target),
        kind: ConnectionType::MainConnection,
    }
}

pub(crate) fn report(id: i64, title: &str) -> Report {
    Report {
        id: ReportId(id),
        whiteboard_id: WHITEBOARD,
        title: title.to_string(),
        introduction: Some(format!("{title} introduction")),
        body: Some(format!("{title} body")),
        conclusion: Some(format!("{title} conclusion")),
    }
}

pub(crate) fn not_found(operation: Operation, detail: &str) -> RemoteFailure {
    RemoteFailure::from_response(operation, 404, &format!(r#"{{"detail":"{detail}"}}"#))
}

/// Builds a coordinator over `backend` with an empty store.
pub(crate) fn coordinator(backend: Arc<FakeBackend>) -> MutationCoordinator {
    MutationCoordinator::new(backend, Arc::new(Store::new()), WHITEBOARD)
}

struct FakeDb {
    next_id: i64,
    whiteboards: Vec<Whiteboard>,
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    subjects: Vec<Subject>,
    reports: Vec<Report>,
}

impl FakeDb {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node_mut(&mut self, operation: Operation, node_id: NodeId) -> RemoteResult<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == node_id)
            .ok_or_else(|| not_found(operation, "Node not found"))
    }

    /// Nodes come back with their outgoing edges, as the backend serializes them.
    fn hydrate(&self, node: &Node) -> Node {
        let mut node = node.clone();
        node.connections = self
            .connections
            .iter()
            .filter(|connection| connection.source_node_id == node.id)
            .copied()
            .collect();
        node
    }

    fn record(
        &mut self,
        node_id: NodeId,
        role: Role,
        content: String,
    ) -> RemoteResult<Interaction> {
        let id = self.next_id();
        let node = self.node_mut(Operation::Interact, node_id)?;
        let interaction = Interaction {
            id: Some(InteractionId(id)),
            node_id,
            role,
            content,
            timestamp: None,
        };
        node.interaction_history.push(interaction.clone());
        Ok(interaction)
    }
}

/// In-memory backend that answers like the real one: trims names, refuses
/// self-loops and duplicate edges, cascades node deletes.
///
/// Tests can inject a failure per operation and hold a response back with
/// [`FakeBackend::hold`]; the store-side effect is computed first, the answer
/// is delivered once the returned sender fires.
pub(crate) struct FakeBackend {
    db: Mutex<FakeDb>,
    failures: Mutex<HashMap<Operation, RemoteFailure>>,
    gates: Mutex<HashMap<Operation, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<Operation>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            db: Mutex::new(FakeDb {
                next_id: 1,
                whiteboards: vec![Whiteboard {
                    id: WHITEBOARD,
                    name: "Default Whiteboard".to_string(),
                    scale: DEFAULT_SCALE,
                    created_at: None,
                    updated_at: None,
                }],
                nodes: Vec::new(),
                connections: Vec::new(),
                subjects: Vec::new(),
                reports: Vec::new(),
            }),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_next_id(mut self, next_id: i64) -> Self {
        self.db.get_mut().next_id = next_id;
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) async fn seed_node(&self, name: &str) -> Node {
        let mut db = self.db.lock().await;
        let id = db.next_id();
        let seeded = node(id, name);
        db.nodes.push(seeded.clone());
        seeded
    }

    pub(crate) async fn seed_connection(&self, source: NodeId, target: NodeId) -> Connection {
        let mut db = self.db.lock().await;
        let id = db.next_id();
        let seeded = connection(id, source.0, target.0);
        db.connections.push(seeded);
        seeded
    }

    pub(crate) async fn seed_subject(&self, name: &str) -> Subject {
        let mut db = self.db.lock().await;
        let id = db.next_id();
        let seeded = Subject {
            id: SubjectId(id),
            name: name.to_string(),
            summary: None,
            whiteboard_id: WHITEBOARD,
        };
        db.subjects.push(seeded.clone());
        seeded
    }

    pub(crate) async fn seed_report(&self, title: &str) -> Report {
        let mut db = self.db.lock().await;
        let id = db.next_id();
        let seeded = report(id, title);
        db.reports.push(seeded.clone());
        seeded
    }

    pub(crate) async fn fail(&self, operation: Operation, failure: RemoteFailure) {
        self.failures.lock().await.insert(operation, failure);
    }

    pub(crate) async fn fail_with(&self, operation: Operation, status: u16, detail: &str) {
        let failure =
            RemoteFailure::from_response(operation, status, &format!(r#"{{"detail":"{detail}"}}"#));
        self.fail(operation, failure).await;
    }

    pub(crate) async fn recover(&self, operation: Operation) {
        self.failures.lock().await.remove(&operation);
    }

    /// Holds back the next answer to `operation` until the sender fires or
    /// is dropped.
    pub(crate) async fn hold(&self, operation: Operation) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .await
            .entry(operation)
            .or_default()
            .push_back(rx);
        tx
    }

    pub(crate) async fn calls(&self) -> Vec<Operation> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// Waits until `operation` has been called `count` times.
    pub(crate) async fn called(&self, operation: Operation, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.call_count(operation).await < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("backend call never arrived");
    }

    pub(crate) async fn stored_node(&self, node_id: NodeId) -> Option<Node> {
        let db = self.db.lock().await;
        db.nodes
            .iter()
            .find(|node| node.id == node_id)
            .map(|node| db.hydrate(node))
    }

    async fn respond<T>(
        &self,
        operation: Operation,
        compute: impl FnOnce(&mut FakeDb) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        self.calls.lock().await.push(operation);
        let injected = self.failures.lock().await.get(&operation).cloned();
        let result = match injected {
            Some(failure) => Err(failure),
            None => {
                let mut db = self.db.lock().await;
                compute(&mut *db)
            }
        };

        let gate = self
            .gates
            .lock()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }
}

fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn bad_request(operation: Operation, detail: &str) -> RemoteFailure {
    RemoteFailure::from_response(operation, 400, &format!(r#"{{"detail":"{detail}"}}"#))
}

#[async_trait]
impl WhiteboardBackend for FakeBackend {
    async fn create_node(&self, new_node: &NewNode) -> RemoteResult<Node> {
        self.respond(Operation::CreateNode, |db| {
            let id = db.next_id();
            let name = match new_node.name.trim() {
                "" => DEFAULT_NODE_NAME.to_string(),
                trimmed => trimmed.to_string(),
            };
            let mut created = node(id, &name);
            created.prompt = new_node.prompt.clone();
            created.subject_id = new_node.subject_id;
            created.whiteboard_id = new_node.whiteboard_id;
            created.position =
                Position::new(round(new_node.position.x), round(new_node.position.y));
            created.interaction_history.push(Interaction {
                id: Some(InteractionId(db.next_id())),
                node_id: created.id,
                role: Role::Assistant,
                content: "Hello! How can I help you today?".to_string(),
                timestamp: None,
            });
            db.nodes.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn list_nodes(&self) -> RemoteResult<Vec<Node>> {
        self.respond(Operation::ListNodes, |db| {
            Ok(db.nodes.iter().map(|node| db.hydrate(node)).collect())
        })
        .await
    }

    async fn get_node(&self, node_id: NodeId) -> RemoteResult<Node> {
        self.respond(Operation::GetNode, |db| {
            let node = db.node_mut(Operation::GetNode, node_id)?.clone();
            Ok(db.hydrate(&node))
        })
        .await
    }

    async fn update_node_position(
        &self,
        node_id: NodeId,
        position: Position,
    ) -> RemoteResult<Node> {
        self.respond(Operation::UpdateNodePosition, |db| {
            let node = db.node_mut(Operation::UpdateNodePosition, node_id)?;
            node.position = Position::new(round(position.x), round(position.y));
            let node = node.clone();
            Ok(db.hydrate(&node))
        })
        .await
    }

    async fn rename_node(&self, node_id: NodeId, name: &str) -> RemoteResult<Node> {
        self.respond(Operation::RenameNode, |db| {
            let node = db.node_mut(Operation::RenameNode, node_id)?;
            node.name = name.trim().to_string();
            let node = node.clone();
            Ok(db.hydrate(&node))
        })
        .await
    }

    async fn delete_node(&self, node_id: NodeId) -> RemoteResult<NodeId> {
        self.respond(Operation::DeleteNode, |db| {
            db.node_mut(Operation::DeleteNode, node_id)?;
            db.nodes.retain(|node| node.id != node_id);
            db.connections
                .retain(|connection| !connection.touches(node_id));
            Ok(node_id)
        })
        .await
    }

    async fn interact(
        &self,
        node_id: NodeId,
        role: Role,
        content: &str,
    ) -> RemoteResult<Vec<Interaction>> {
        self.respond(Operation::Interact, |db| {
            let message = db.record(node_id, role, content.to_string())?;
            let reply = db.record(
                node_id,
                Role::Assistant,
                format!("Mock response for: {content}"),
            )?;
            Ok(vec![message, reply])
        })
        .await
    }

    async fn send_prompt(&self, node_id: NodeId, prompt: &str) -> RemoteResult<PromptExchange> {
        self.respond(Operation::SendPrompt, |db| {
            let llm_response = format!("Answer to: {prompt}");
            db.record(node_id, Role::User, prompt.to_string())?;
            db.record(node_id, Role::Assistant, llm_response.clone())?;
            Ok(PromptExchange {
                user_prompt: prompt.to_string(),
                context_used: None,
                llm_response,
            })
        })
        .await
    }

    async fn generate_node_summary(&self, node_id: NodeId) -> RemoteResult<NodeSummary> {
        self.respond(Operation::GenerateNodeSummary, |db| {
            let node = db.node_mut(Operation::GenerateNodeSummary, node_id)?;
            let last = node
                .interaction_history
                .last()
                .map(|interaction| interaction.content.clone())
                .ok_or_else(|| {
                    bad_request(
                        Operation::GenerateNodeSummary,
                        "No interactions found for this node.",
                    )
                })?;
            node.name = format!("Summary of {}", node.id);
            node.summary = Some(format!("Latest: {last}"));
            Ok(NodeSummary {
                name: node.name.clone(),
                summary: node.summary.clone(),
            })
        })
        .await
    }

    async fn connect_nodes(
        &self,
        source: NodeId,
        target: NodeId,
        kind: ConnectionType,
    ) -> RemoteResult<Connection> {
        self.respond(Operation::ConnectNodes, |db| {
            db.node_mut(Operation::ConnectNodes, source)?;
            db.node_mut(Operation::ConnectNodes, target)?;
            if source == target {
                return Err(bad_request(
                    Operation::ConnectNodes,
                    "A node cannot connect to itself",
                ));
            }
            if db.connections.iter().any(|connection| {
                connection.source_node_id == source && connection.target_node_id == target
            }) {
                return Err(bad_request(
                    Operation::ConnectNodes,
                    "Connection already exists",
                ));
            }
            let created = Connection {
                id: ConnectionId(db.next_id()),
                source_node_id: source,
                target_node_id: target,
                kind,
            };
            db.connections.push(created);
            Ok(created)
        })
        .await
    }

    async fn list_connections(&self) -> RemoteResult<Vec<Connection>> {
        self.respond(Operation::ListConnections, |db| Ok(db.connections.clone()))
            .await
    }

    async fn delete_connection(&self, connection_id: ConnectionId) -> RemoteResult<ConnectionId> {
        self.respond(Operation::DeleteConnection, |db| {
            let before = db.connections.len();
            db.connections
                .retain(|connection| connection.id != connection_id);
            if db.connections.len() == before {
                return Err(not_found(
                    Operation::DeleteConnection,
                    "Connection not found",
                ));
            }
            Ok(connection_id)
        })
        .await
    }

    async fn create_subject(&self, new_subject: &NewSubject) -> RemoteResult<Subject> {
        self.respond(Operation::CreateSubject, |db| {
            if db
                .subjects
                .iter()
                .any(|subject| subject.whiteboard_id == new_subject.whiteboard_id)
            {
                return Err(bad_request(
                    Operation::CreateSubject,
                    "Whiteboard already has a subject.",
                ));
            }
            let created = Subject {
                id: SubjectId(db.next_id()),
                name: new_subject.name.clone(),
                summary: new_subject.summary.clone(),
                whiteboard_id: new_subject.whiteboard_id,
            };
            db.subjects.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn list_subjects(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Vec<Subject>> {
        self.respond(Operation::ListSubjects, |db| {
            Ok(db
                .subjects
                .iter()
                .filter(|subject| subject.whiteboard_id == whiteboard_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn update_subject(
        &self,
        subject_id: SubjectId,
        update: &SubjectUpdate,
    ) -> RemoteResult<Subject> {
        self.respond(Operation::UpdateSubject, |db| {
            let subject = db
                .subjects
                .iter_mut()
                .find(|subject| subject.id == subject_id)
                .ok_or_else(|| not_found(Operation::UpdateSubject, "Subject not found"))?;
            subject.name = update.name.trim().to_string();
            subject.summary = update.summary.clone();
            subject.whiteboard_id = update.whiteboard_id;
            Ok(subject.clone())
        })
        .await
    }

    async fn delete_subject(&self, subject_id: SubjectId) -> RemoteResult<SubjectId> {
        self.respond(Operation::DeleteSubject, |db| {
            let before = db.subjects.len();
            db.subjects.retain(|subject| subject.id != subject_id);
            if db.subjects.len() == before {
                return Err(not_found(Operation::DeleteSubject, "Subject not found"));
            }
            Ok(subject_id)
        })
        .await
    }

    async fn summarize_subject(
        &self,
        text: &str,
        subject_id: SubjectId,
    ) -> RemoteResult<SubjectSummary> {
        self.respond(Operation::SummarizeSubject, |db| {
            let subject = db
                .subjects
                .iter_mut()
                .find(|subject| subject.id == subject_id)
                .ok_or_else(|| not_found(Operation::SummarizeSubject, "Subject not found"))?;
            subject.summary = Some(format!("Summary: {text}"));
            Ok(SubjectSummary {
                summary: subject.summary.clone(),
            })
        })
        .await
    }

    async fn list_whiteboards(&self) -> RemoteResult<Vec<Whiteboard>> {
        self.respond(Operation::ListWhiteboards, |db| Ok(db.whiteboards.clone()))
            .await
    }

    async fn get_whiteboard(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Whiteboard> {
        self.respond(Operation::GetWhiteboard, |db| {
            db.whiteboards
                .iter()
                .find(|whiteboard| whiteboard.id == whiteboard_id)
                .cloned()
                .ok_or_else(|| not_found(Operation::GetWhiteboard, "Whiteboard not found"))
        })
        .await
    }

    async fn update_zoom(
        &self,
        whiteboard_id: WhiteboardId,
        action: ZoomAction,
    ) -> RemoteResult<ZoomLevel> {
        self.respond(Operation::UpdateZoom, |db| {
            let whiteboard = db
                .whiteboards
                .iter_mut()
                .find(|whiteboard| whiteboard.id == whiteboard_id)
                .ok_or_else(|| not_found(Operation::UpdateZoom, "Whiteboard not found"))?;
            whiteboard.scale = action.apply(whiteboard.scale);
            Ok(ZoomLevel {
                id: whiteboard.id,
                scale: whiteboard.scale,
            })
        })
        .await
    }

    async fn create_report(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Report> {
        self.respond(Operation::CreateReport, |db| {
            let subject = db
                .subjects
                .iter()
                .find(|subject| subject.whiteboard_id == whiteboard_id)
                .cloned()
                .ok_or_else(|| {
                    not_found(
                        Operation::CreateReport,
                        "No subjects found for this whiteboard",
                    )
                })?;
            let id = db.next_id();
            let created = report(id, &subject.name);
            db.reports.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn list_reports(&self) -> RemoteResult<Vec<Report>> {
        self.respond(Operation::ListReports, |db| Ok(db.reports.clone()))
            .await
    }

    async fn get_report(&self, report_id: ReportId) -> RemoteResult<Report> {
        self.respond(Operation::GetReport, |db| {
            db.reports
                .iter()
                .find(|report| report.id == report_id)
                .cloned()
                .ok_or_else(|| not_found(Operation::GetReport, "Report not found"))
        })
        .await
    }
}

