use std::sync::Arc;

use anyhow::Result;

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod queue;
pub mod settings;
pub mod store;
pub mod view;

pub use backend::{RemoteResult, UnreachableBackend, WhiteboardBackend};
pub use coordinator::{MutationCoordinator, PromptOutcome};
pub use error::{Operation, ReferentialGap, RemoteFailure};
pub use http::HttpBackend;
pub use settings::{load_settings, ClientSettings};
pub use store::{GraphAction, GraphState, Store, StoreSnapshot, SyncStatus};
pub use view::{ViewAction, ViewFlags};

/// Broadcast to every [`Store::subscribe`] receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    GraphChanged {
        revision: u64,
    },
    ViewChanged {
        revision: u64,
    },
    MutationFailed {
        operation: Operation,
        failure: RemoteFailure,
    },
}

/// Wires an HTTP backend and an empty store for the configured whiteboard.
pub fn connect(settings: &ClientSettings) -> Result<MutationCoordinator> {
    let backend = HttpBackend::from_settings(settings)?;
    Ok(MutationCoordinator::new(
        Arc::new(backend),
        Arc::new(Store::new()),
        settings.whiteboard_id,
    ))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
