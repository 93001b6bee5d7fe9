use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings,
    settings::normalize_api_base_url,
    view::{self, ExpandedView},
    MutationCoordinator,
};
use serde_json::json;
use shared::domain::{
    ConnectionId, ConnectionType, NewNode, NodeId, Position, ReportId, Role, SubjectId,
    SubjectUpdate, WhiteboardId, ZoomAction,
};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(about = "Drive a whiteboard backend from the command line")]
struct Cli {
    /// Overrides `api_base_url` from whiteboard.toml and the environment.
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    whiteboard_id: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load everything and print the whiteboard.
    Show {
        #[arg(long)]
        expand: Option<i64>,
    },
    /// Reload one node with its chat history.
    Node {
        node_id: i64,
    },
    CreateNode {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        #[arg(long)]
        subject_id: Option<i64>,
        /// Reload every node after creating.
        #[arg(long)]
        refresh: bool,
    },
    Move {
        node_id: i64,
        x: f64,
        y: f64,
    },
    Rename {
        node_id: i64,
        name: String,
    },
    Delete {
        node_id: i64,
    },
    Connect {
        source: i64,
        target: i64,
        #[arg(long, default_value = "main")]
        kind: String,
    },
    Disconnect {
        connection_id: i64,
    },
    Interact {
        node_id: i64,
        content: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
    Prompt {
        node_id: i64,
        prompt: String,
    },
    Subject {
        name: String,
    },
    UpdateSubject {
        subject_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    DeleteSubject {
        subject_id: i64,
    },
    Summarize {
        subject_id: i64,
        text: String,
    },
    /// `in`, `out`, `reset`, or `custom --scale <value>`.
    Zoom {
        action: String,
        #[arg(long)]
        scale: Option<f64>,
    },
    Report,
    Reports,
    ViewReport {
        report_id: i64,
    },
}

fn parse_kind(raw: &str) -> Result<ConnectionType> {
    match raw.to_ascii_lowercase().as_str() {
        "main" | "main_connection" => Ok(ConnectionType::MainConnection),
        "sub" | "sub_connection" => Ok(ConnectionType::SubConnection),
        other => bail!("unknown connection kind '{other}', expected main or sub"),
    }
}

fn parse_role(raw: &str) -> Result<Role> {
    match raw.to_ascii_lowercase().as_str() {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        other => bail!("unknown role '{other}', expected user or assistant"),
    }
}

fn parse_zoom(action: &str, scale: Option<f64>) -> Result<ZoomAction> {
    match (action.to_ascii_lowercase().as_str(), scale) {
        ("in", _) => Ok(ZoomAction::In),
        ("out", _) => Ok(ZoomAction::Out),
        ("reset", _) => Ok(ZoomAction::Reset),
        ("custom", Some(scale)) => Ok(ZoomAction::Custom(scale)),
        ("custom", None) => bail!("custom zoom needs --scale"),
        (other, _) => bail!("unknown zoom action '{other}'"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn show(coordinator: &MutationCoordinator, expand: Option<i64>) -> Result<()> {
    coordinator
        .refresh_all()
        .await
        .context("failed to load whiteboard")?;
    if let Some(node_id) = expand {
        coordinator.expand_node(NodeId(node_id)).await;
    }

    let snapshot = coordinator.store().snapshot().await;
    let graph = &snapshot.graph;
    for gap in view::dangling_connections(graph) {
        warn!("{gap}");
    }

    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter_map(|node| view::display_node(graph, node.id))
        .map(|node| {
            json!({
                "id": node.id,
                "name": node.name,
                "position": node.position,
                "summary": node.summary,
                "neighbours": view::neighbours(graph, node.id),
            })
        })
        .collect();
    let expanded = match view::expanded_view(graph, &snapshot.view) {
        ExpandedView::Collapsed => None,
        ExpandedView::Open(node) => Some(json!({
            "id": node.id,
            "name": node.name,
            "interaction_history": node.interaction_history,
        })),
        ExpandedView::Gap(gap) => {
            warn!("{gap}");
            None
        }
    };

    print_json(&json!({
        "whiteboard": graph.whiteboard(),
        "visual_scale": snapshot.view.visual_scale,
        "nodes": nodes,
        "connections": view::renderable_connections(graph),
        "subjects": graph.subjects,
        "reports": graph
            .reports
            .iter()
            .map(|report| json!({"id": report.id, "title": report.title}))
            .collect::<Vec<_>>(),
        "expanded": expanded,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = load_settings().context("invalid whiteboard settings")?;
    if let Some(url) = cli.api_base_url.as_deref() {
        settings.api_base_url = normalize_api_base_url(url)?;
    }
    if let Some(whiteboard_id) = cli.whiteboard_id {
        settings.whiteboard_id = WhiteboardId(whiteboard_id);
    }
    let coordinator = client_core::connect(&settings)?;

    match cli.command {
        Command::Show { expand } => show(&coordinator, expand).await?,
        Command::Node { node_id } => {
            let node = coordinator.fetch_node(NodeId(node_id)).await?;
            print_json(&node)?;
        }
        Command::CreateNode {
            name,
            x,
            y,
            subject_id,
            refresh,
        } => {
            let mut new_node = NewNode::new(settings.whiteboard_id, Position::new(x, y));
            if let Some(name) = name {
                new_node = new_node.with_name(name);
            }
            if let Some(subject_id) = subject_id {
                new_node = new_node.with_subject(SubjectId(subject_id));
            }
            let node = if refresh {
                coordinator.create_node_and_refresh(new_node).await?
            } else {
                coordinator.create_node(new_node).await?
            };
            print_json(&node)?;
        }
        Command::Move { node_id, x, y } => {
            let node = coordinator
                .move_node(NodeId(node_id), Position::new(x, y))
                .await?;
            print_json(&node)?;
        }
        Command::Rename { node_id, name } => {
            let node = coordinator.rename_node(NodeId(node_id), &name).await?;
            print_json(&node)?;
        }
        Command::Delete { node_id } => {
            let deleted = coordinator.delete_node(NodeId(node_id)).await?;
            println!("deleted node_id={deleted}");
        }
        Command::Connect {
            source,
            target,
            kind,
        } => {
            let connection = coordinator
                .connect_nodes(NodeId(source), NodeId(target), parse_kind(&kind)?)
                .await?;
            print_json(&connection)?;
        }
        Command::Disconnect { connection_id } => {
            let deleted = coordinator
                .delete_connection(ConnectionId(connection_id))
                .await?;
            println!("deleted connection_id={deleted}");
        }
        Command::Interact {
            node_id,
            content,
            role,
        } => {
            let rows = coordinator
                .record_interaction(NodeId(node_id), parse_role(&role)?, &content)
                .await?;
            print_json(&rows)?;
        }
        Command::Prompt { node_id, prompt } => {
            let outcome = coordinator.send_prompt(NodeId(node_id), &prompt).await?;
            print_json(&json!({
                "response": outcome.exchange.llm_response,
                "name": outcome.summary.name,
                "summary": outcome.summary.summary,
            }))?;
        }
        Command::Subject { name } => {
            let subject = coordinator.create_subject(&name).await?;
            print_json(&subject)?;
        }
        Command::UpdateSubject {
            subject_id,
            name,
            summary,
        } => {
            let subject_id = SubjectId(subject_id);
            let current = coordinator
                .fetch_subjects()
                .await?
                .into_iter()
                .find(|subject| subject.id == subject_id)
                .with_context(|| format!("subject {subject_id} not found"))?;
            let mut update = SubjectUpdate::of(&current);
            if let Some(name) = name {
                update.name = name;
            }
            if summary.is_some() {
                update.summary = summary;
            }
            let subject = coordinator.update_subject(subject_id, update).await?;
            print_json(&subject)?;
        }
        Command::DeleteSubject { subject_id } => {
            let deleted = coordinator.delete_subject(SubjectId(subject_id)).await?;
            println!("deleted subject_id={deleted}");
        }
        Command::Summarize { subject_id, text } => {
            let summary = coordinator
                .summarize_subject(SubjectId(subject_id), &text)
                .await?;
            print_json(&json!({ "summary": summary }))?;
        }
        Command::Zoom { action, scale } => {
            let level = coordinator.zoom(parse_zoom(&action, scale)?).await?;
            println!("whiteboard {} scale={:.2}", level.id, level.scale);
        }
        Command::Report => {
            let report = coordinator
                .create_report(true)
                .await
                .context("report generation failed")?;
            print_json(&report)?;
        }
        Command::Reports => {
            let reports = coordinator.fetch_reports().await?;
            print_json(&reports)?;
        }
        Command::ViewReport { report_id } => {
            let report = coordinator.view_report(ReportId(report_id)).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
