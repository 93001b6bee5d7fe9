use std::time::Duration;

use super::*;
use tokio::time::timeout;

const NODE_1: EntityKey = EntityKey::Node(NodeId(1));
const NODE_2: EntityKey = EntityKey::Node(NodeId(2));

#[tokio::test]
async fn same_entity_waits_for_the_holder() {
    let queue = EntityQueue::new();
    let turn = queue.enter(NODE_1).await;

    assert!(timeout(Duration::from_millis(50), queue.enter(NODE_1))
        .await
        .is_err());

    drop(turn);
    timeout(Duration::from_secs(1), queue.enter(NODE_1))
        .await
        .expect("slot released");
}

#[tokio::test]
async fn other_entities_are_not_blocked() {
    let queue = EntityQueue::new();
    let _turn = queue.enter(NODE_1).await;

    timeout(Duration::from_secs(1), queue.enter(NODE_2))
        .await
        .expect("independent entity");
    timeout(
        Duration::from_secs(1),
        queue.enter(EntityKey::Whiteboard(WhiteboardId(1))),
    )
    .await
    .expect("whiteboard slot");
}

#[tokio::test]
async fn repeated_keys_in_one_turn_do_not_deadlock() {
    let queue = EntityQueue::new();
    let turn = timeout(
        Duration::from_secs(1),
        queue.enter_all(&[NODE_2, NODE_1, NODE_2]),
    )
    .await
    .expect("enter_all");

    assert!(timeout(Duration::from_millis(50), queue.enter(NODE_2))
        .await
        .is_err());
    drop(turn);
}

#[tokio::test]
async fn idle_slots_are_pruned() {
    let queue = EntityQueue::new();
    drop(queue.enter_all(&[NODE_1, NODE_2]).await);
    assert_eq!(queue.tracked().await, 2);

    let _turn = queue
        .enter(EntityKey::Subject(SubjectId(5)))
        .await;
    assert_eq!(queue.tracked().await, 1);
}
