use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{
        Connection, ConnectionId, ConnectionType, Interaction, NewNode, NewSubject, Node, NodeId,
        Position, Report, ReportId, Role, Subject, SubjectId, SubjectUpdate, Whiteboard,
        WhiteboardId, ZoomAction,
    },
    error::ErrorCode,
    protocol::{
        ConnectQuery, ConnectResponse, CreateReportRequest, InteractQuery, InteractResponse,
        NodeSummary, PromptExchange, PromptRequest, RenameQuery, SubjectListQuery,
        SubjectSummary, SubjectSummaryRequest, ZoomLevel, ZoomQuery,
    },
};
use tracing::{debug, warn};

use crate::{
    backend::{RemoteResult, WhiteboardBackend},
    error::{Operation, RemoteFailure},
    settings::ClientSettings,
};

/// [`WhiteboardBackend`] over the backend's JSON HTTP API.
///
/// `base_url` includes the `/api` prefix, e.g. `http://localhost:8000/api`.
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build whiteboard http client")?;
        Ok(Self::with_client(http, settings.api_base_url.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> RemoteResult<Response> {
        debug!(operation = %operation, "issuing remote call");
        let response = request
            .send()
            .await
            .map_err(|err| transport_failure(operation, err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let failure = RemoteFailure::from_response(operation, status.as_u16(), &body);
        warn!(
            operation = %operation,
            status = status.as_u16(),
            code = ?failure.code,
            "remote call failed: {}",
            failure.message
        );
        Err(failure)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> RemoteResult<T> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| {
                RemoteFailure::new(
                    operation,
                    ErrorCode::Decode,
                    format!("undecodable response body: {err}"),
                )
            })
    }
}

fn transport_failure(operation: Operation, err: reqwest::Error) -> RemoteFailure {
    warn!(operation = %operation, "remote call did not complete: {err}");
    if err.is_decode() {
        RemoteFailure::new(operation, ErrorCode::Decode, err.to_string())
    } else {
        RemoteFailure::unavailable(operation, err.to_string())
    }
}

#[async_trait]
impl WhiteboardBackend for HttpBackend {
    async fn create_node(&self, node: &NewNode) -> RemoteResult<Node> {
        self.fetch(
            Operation::CreateNode,
            self.http.post(self.url("/node/")).json(node),
        )
        .await
    }

    async fn list_nodes(&self) -> RemoteResult<Vec<Node>> {
        self.fetch(Operation::ListNodes, self.http.get(self.url("/node/")))
            .await
    }

    async fn get_node(&self, node_id: NodeId) -> RemoteResult<Node> {
        self.fetch(
            Operation::GetNode,
            self.http.get(self.url(&format!("/node/{node_id}"))),
        )
        .await
    }

    async fn update_node_position(
        &self,
        node_id: NodeId,
        position: Position,
    ) -> RemoteResult<Node> {
        self.fetch(
            Operation::UpdateNodePosition,
            self.http
                .put(self.url(&format!("/node/{node_id}/position")))
                .json(&position),
        )
        .await
    }

    async fn rename_node(&self, node_id: NodeId, name: &str) -> RemoteResult<Node> {
        self.fetch(
            Operation::RenameNode,
            self.http
                .put(self.url(&format!("/node/{node_id}/name")))
                .query(&RenameQuery {
                    new_name: name.to_string(),
                }),
        )
        .await
    }

    async fn delete_node(&self, node_id: NodeId) -> RemoteResult<NodeId> {
        self.send(
            Operation::DeleteNode,
            self.http.delete(self.url(&format!("/node/{node_id}"))),
        )
        .await?;
        Ok(node_id)
    }

    async fn interact(
        &self,
        node_id: NodeId,
        role: Role,
        content: &str,
    ) -> RemoteResult<Vec<Interaction>> {
        let response: InteractResponse = self
            .fetch(
                Operation::Interact,
                self.http
                    .post(self.url(&format!("/node/{node_id}/interact")))
                    .query(&InteractQuery {
                        role,
                        content: content.to_string(),
                    }),
            )
            .await?;

        Ok(response
            .interactions
            .into_iter()
            .map(|row| Interaction {
                id: Some(row.id),
                node_id,
                role: row.role,
                content: row.content,
                timestamp: None,
            })
            .collect())
    }

    async fn send_prompt(&self, node_id: NodeId, prompt: &str) -> RemoteResult<PromptExchange> {
        self.fetch(
            Operation::SendPrompt,
            self.http
                .post(self.url(&format!("/interaction_history/{node_id}/prompt")))
                .json(&PromptRequest {
                    prompt: prompt.to_string(),
                }),
        )
        .await
    }

    async fn generate_node_summary(&self, node_id: NodeId) -> RemoteResult<NodeSummary> {
        self.fetch(
            Operation::GenerateNodeSummary,
            self.http
                .post(self.url(&format!("/node/{node_id}/generate-summary"))),
        )
        .await
    }

    async fn connect_nodes(
        &self,
        source: NodeId,
        target: NodeId,
        kind: ConnectionType,
    ) -> RemoteResult<Connection> {
        let response: ConnectResponse = self
            .fetch(
                Operation::ConnectNodes,
                self.http
                    .post(self.url(&format!("/node/{source}/connect")))
                    .query(&ConnectQuery {
                        target_node_id: target,
                        type_of_connection: kind,
                    }),
            )
            .await?;

        response.connections.into_iter().next().ok_or_else(|| {
            RemoteFailure::new(
                Operation::ConnectNodes,
                ErrorCode::Decode,
                "connect response carried no connection",
            )
        })
    }

    async fn list_connections(&self) -> RemoteResult<Vec<Connection>> {
        self.fetch(
            Operation::ListConnections,
            self.http.get(self.url("/connection/")),
        )
        .await
    }

    async fn delete_connection(&self, connection_id: ConnectionId) -> RemoteResult<ConnectionId> {
        self.send(
            Operation::DeleteConnection,
            self.http
                .delete(self.url(&format!("/connection/{connection_id}"))),
        )
        .await?;
        Ok(connection_id)
    }

    async fn create_subject(&self, subject: &NewSubject) -> RemoteResult<Subject> {
        self.fetch(
            Operation::CreateSubject,
            self.http.post(self.url("/subject/")).json(subject),
        )
        .await
    }

    async fn list_subjects(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Vec<Subject>> {
        self.fetch(
            Operation::ListSubjects,
            self.http
                .get(self.url("/subject/"))
                .query(&SubjectListQuery { whiteboard_id }),
        )
        .await
    }

    async fn update_subject(
        &self,
        subject_id: SubjectId,
        update: &SubjectUpdate,
    ) -> RemoteResult<Subject> {
        self.fetch(
            Operation::UpdateSubject,
            self.http
                .put(self.url(&format!("/subject/{subject_id}")))
                .json(update),
        )
        .await
    }

    async fn delete_subject(&self, subject_id: SubjectId) -> RemoteResult<SubjectId> {
        self.send(
            Operation::DeleteSubject,
            self.http.delete(self.url(&format!("/subject/{subject_id}"))),
        )
        .await?;
        Ok(subject_id)
    }

    async fn summarize_subject(
        &self,
        text: &str,
        subject_id: SubjectId,
    ) -> RemoteResult<SubjectSummary> {
        self.fetch(
            Operation::SummarizeSubject,
            self.http
                .post(self.url("/subject/create-summary"))
                .json(&SubjectSummaryRequest {
                    subject_id,
                    text: text.to_string(),
                }),
        )
        .await
    }

    async fn list_whiteboards(&self) -> RemoteResult<Vec<Whiteboard>> {
        self.fetch(
            Operation::ListWhiteboards,
            self.http.get(self.url("/whiteboard/")),
        )
        .await
    }

    async fn get_whiteboard(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Whiteboard> {
        self.fetch(
            Operation::GetWhiteboard,
            self.http
                .get(self.url(&format!("/whiteboard/{whiteboard_id}"))),
        )
        .await
    }

    async fn update_zoom(
        &self,
        whiteboard_id: WhiteboardId,
        action: ZoomAction,
    ) -> RemoteResult<ZoomLevel> {
        let scale = match action {
            ZoomAction::Custom(scale) => Some(scale),
            _ => None,
        };
        self.fetch(
            Operation::UpdateZoom,
            self.http
                .patch(self.url(&format!("/whiteboard/{whiteboard_id}/zoom")))
                .query(&ZoomQuery {
                    action: action.as_str().to_string(),
                    scale,
                }),
        )
        .await
    }

    async fn create_report(&self, whiteboard_id: WhiteboardId) -> RemoteResult<Report> {
        self.fetch(
            Operation::CreateReport,
            self.http
                .post(self.url("/report/"))
                .json(&CreateReportRequest { whiteboard_id }),
        )
        .await
    }

    async fn list_reports(&self) -> RemoteResult<Vec<Report>> {
        match self
            .fetch(Operation::ListReports, self.http.get(self.url("/report/")))
            .await
        {
            // The backend answers 404 instead of an empty list.
            Err(failure) if failure.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    async fn get_report(&self, report_id: ReportId) -> RemoteResult<Report> {
        self.fetch(
            Operation::GetReport,
            self.http.get(self.url(&format!("/report/{report_id}"))),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
