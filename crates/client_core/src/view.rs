//! UI-only flags and the selectors that combine them with the graph.
//!
//! Selectors never write to the graph. An id in [`ViewFlags`] that no longer
//! resolves is reported as a [`ReferentialGap`] and rendered as nothing.

use std::borrow::Cow;

use shared::domain::{Connection, Node, NodeId, Report, ReportId, ZoomAction, DEFAULT_SCALE};

use crate::{
    error::ReferentialGap,
    store::{GraphState, SyncStatus},
};

/// Report on screen. Creation runs beside it in [`ReportCreation`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReportPhase {
    #[default]
    Idle,
    Ready(Report),
    /// A history entry was requested; `previous` stays on screen meanwhile.
    Fetching {
        requested: ReportId,
        previous: Option<Report>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportCreation {
    #[default]
    Idle,
    /// `superseded` is set once a history entry is opened meanwhile; the new
    /// report then lands in the list without taking over the screen.
    InFlight { superseded: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewFlags {
    pub expanded_node: Option<NodeId>,
    pub highlighted_node: Option<NodeId>,
    pub show_report: bool,
    pub show_report_history: bool,
    pub report: ReportPhase,
    pub creation: ReportCreation,
    /// Zoom level the renderer shows right now; the confirmed value lives on
    /// the whiteboard in the graph.
    pub visual_scale: f64,
}

impl Default for ViewFlags {
    fn default() -> Self {
        Self {
            expanded_node: None,
            highlighted_node: None,
            show_report: false,
            show_report_history: false,
            report: ReportPhase::Idle,
            creation: ReportCreation::Idle,
            visual_scale: DEFAULT_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    Expand(NodeId),
    CloseExpanded,
    Highlight(Option<NodeId>),
    /// A node left the graph through a confirmed delete.
    NodeRemoved(NodeId),
    ReportCreationStarted,
    ReportCreated { report: Report, show: bool },
    ReportCreationFailed,
    ReportFetchStarted(ReportId),
    ReportFetched(Report),
    ReportFetchFailed(ReportId),
    ShowReport(bool),
    ShowReportHistory(bool),
    VisualZoom(ZoomAction),
    VisualScaleSynced(f64),
}

pub fn reduce_view(mut flags: ViewFlags, action: ViewAction) -> ViewFlags {
    match action {
        ViewAction::Expand(node_id) => flags.expanded_node = Some(node_id),
        ViewAction::CloseExpanded => flags.expanded_node = None,
        ViewAction::Highlight(node_id) => flags.highlighted_node = node_id,
        ViewAction::NodeRemoved(node_id) => {
            if flags.expanded_node == Some(node_id) {
                flags.expanded_node = None;
            }
            if flags.highlighted_node == Some(node_id) {
                flags.highlighted_node = None;
            }
        }
        ViewAction::ReportCreationStarted => {
            flags.creation = ReportCreation::InFlight { superseded: false };
        }
        ViewAction::ReportCreated { report, show } => {
            let superseded = matches!(
                flags.creation,
                ReportCreation::InFlight { superseded: true }
            );
            flags.creation = ReportCreation::Idle;
            if !superseded {
                flags.report = ReportPhase::Ready(report);
                if show {
                    flags.show_report = true;
                }
            }
        }
        ViewAction::ReportCreationFailed => flags.creation = ReportCreation::Idle,
        ViewAction::ReportFetchStarted(requested) => {
            if let ReportCreation::InFlight { superseded } = &mut flags.creation {
                *superseded = true;
            }
            let previous = match std::mem::take(&mut flags.report) {
                ReportPhase::Ready(report) => Some(report),
                ReportPhase::Fetching { previous, .. } => previous,
                ReportPhase::Idle => None,
            };
            flags.report = ReportPhase::Fetching {
                requested,
                previous,
            };
        }
        ViewAction::ReportFetched(report) => {
            // Only the most recent request may land; older answers are stale.
            let current = matches!(
                &flags.report,
                ReportPhase::Fetching { requested, .. } if *requested == report.id
            );
            if current {
                flags.report = ReportPhase::Ready(report);
                flags.show_report = true;
                flags.show_report_history = false;
            }
        }
        ViewAction::ReportFetchFailed(failed) => {
            if let ReportPhase::Fetching {
                requested,
                previous,
            } = &flags.report
            {
                if *requested == failed {
                    flags.report = match previous.clone() {
                        Some(report) => ReportPhase::Ready(report),
                        None => ReportPhase::Idle,
                    };
                }
            }
        }
        ViewAction::ShowReport(show) => flags.show_report = show,
        ViewAction::ShowReportHistory(show) => flags.show_report_history = show,
        ViewAction::VisualZoom(action) => flags.visual_scale = action.apply(flags.visual_scale),
        ViewAction::VisualScaleSynced(scale) => flags.visual_scale = scale,
    }
    flags
}

pub fn is_creating_report(flags: &ViewFlags) -> bool {
    matches!(flags.creation, ReportCreation::InFlight { .. })
}

/// The report on screen: always a whole report or nothing.
pub fn active_report(flags: &ViewFlags) -> Option<&Report> {
    match &flags.report {
        ReportPhase::Ready(report) => Some(report),
        ReportPhase::Fetching { previous, .. } => previous.as_ref(),
        ReportPhase::Idle => None,
    }
}

pub fn report_panel_visible(flags: &ViewFlags) -> bool {
    flags.show_report && active_report(flags).is_some()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedView<'a> {
    Collapsed,
    Open(&'a Node),
    Gap(ReferentialGap),
}

pub fn expanded_view<'a>(graph: &'a GraphState, flags: &ViewFlags) -> ExpandedView<'a> {
    match flags.expanded_node {
        None => ExpandedView::Collapsed,
        Some(node_id) => match graph.node(node_id) {
            Some(node) => ExpandedView::Open(node),
            None => ExpandedView::Gap(ReferentialGap::ExpandedNode(node_id)),
        },
    }
}

/// Node as it should be drawn: a pending edit shows its optimistic value.
pub fn display_node(graph: &GraphState, node_id: NodeId) -> Option<Cow<'_, Node>> {
    let node = graph.node(node_id)?;
    match graph.node_sync.get(&node_id) {
        Some(SyncStatus::Pending(draft)) => {
            let mut shown = node.clone();
            shown.name = draft.name.clone();
            shown.position = draft.position;
            Some(Cow::Owned(shown))
        }
        _ => Some(Cow::Borrowed(node)),
    }
}

/// Edges incident to `node_id`, computed from the connection set rather than
/// the node's cached projection.
pub fn node_connections(graph: &GraphState, node_id: NodeId) -> Vec<&Connection> {
    graph
        .connections
        .iter()
        .filter(|connection| connection.touches(node_id))
        .collect()
}

pub fn neighbours(graph: &GraphState, node_id: NodeId) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = node_connections(graph, node_id)
        .into_iter()
        .filter_map(|connection| connection.other_end(node_id))
        .filter(|other| graph.contains_node(*other))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Edges whose endpoints both resolve.
pub fn renderable_connections(graph: &GraphState) -> Vec<&Connection> {
    graph
        .connections
        .iter()
        .filter(|connection| {
            graph.contains_node(connection.source_node_id)
                && graph.contains_node(connection.target_node_id)
        })
        .collect()
}

pub fn dangling_connections(graph: &GraphState) -> Vec<ReferentialGap> {
    graph
        .connections
        .iter()
        .filter_map(|connection| {
            [connection.source_node_id, connection.target_node_id]
                .into_iter()
                .find(|node_id| !graph.contains_node(*node_id))
                .map(|node_id| ReferentialGap::DanglingConnection {
                    connection_id: connection.id,
                    node_id,
                })
        })
        .collect()
}

/// The highlighted node, if it still exists.
pub fn highlighted_node(
    graph: &GraphState,
    flags: &ViewFlags,
) -> Result<Option<NodeId>, ReferentialGap> {
    match flags.highlighted_node {
        None => Ok(None),
        Some(node_id) if graph.contains_node(node_id) => Ok(Some(node_id)),
        Some(node_id) => Err(ReferentialGap::HighlightedNode(node_id)),
    }
}

pub fn is_highlighted(graph: &GraphState, flags: &ViewFlags, node_id: NodeId) -> bool {
    match highlighted_node(graph, flags) {
        Ok(Some(highlighted)) => {
            highlighted == node_id || neighbours(graph, highlighted).contains(&node_id)
        }
        _ => false,
    }
}

pub fn highlighted_connections<'a>(
    graph: &'a GraphState,
    flags: &ViewFlags,
) -> Vec<&'a Connection> {
    match highlighted_node(graph, flags) {
        Ok(Some(highlighted)) => renderable_connections(graph)
            .into_iter()
            .filter(|connection| connection.touches(highlighted))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
