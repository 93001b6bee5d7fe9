use std::{collections::HashMap, sync::Arc};

use shared::domain::{ConnectionId, NodeId, SubjectId, WhiteboardId};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Entity a mutation is serialized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Whiteboard(WhiteboardId),
    Node(NodeId),
    Connection(ConnectionId),
    Subject(SubjectId),
}

/// Per-entity FIFO: a mutation holds its entity's slot from issue until its
/// result is merged. tokio's mutex hands the slot over in request order.
#[derive(Default)]
pub struct EntityQueue {
    slots: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
}

/// Held slots; dropping it lets the next mutation on those entities run.
pub struct EntityTurn {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl EntityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: EntityKey) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        // Nobody outside the map holds or waits on an idle slot.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.entry(key).or_default().clone()
    }

    pub async fn enter(&self, key: EntityKey) -> EntityTurn {
        self.enter_all(&[key]).await
    }

    /// Takes several slots in ascending key order so two multi-entity
    /// mutations can never wait on each other.
    pub async fn enter_all(&self, keys: &[EntityKey]) -> EntityTurn {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slot(key).await;
            guards.push(slot.lock_owned().await);
        }
        EntityTurn { _guards: guards }
    }

    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
#[path = "tests/queue_tests.rs"]
mod tests;
