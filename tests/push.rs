//! Exercises `push`/`push_many` against a real Postgres instance: sequential
//! versioning under concurrent same-aggregate pushes, independent commits
//! for different aggregates, and in-order batch assignment (spec.md §8,
//! scenarios 1-2, properties P1 and P3).

use eventstore::{Command, EventStoreBuilder};
use serde_json::json;
use sqlx::{Pool, Postgres};

fn command(instance_id: &str, aggregate_type: &str, aggregate_id: &str, event_type: &str, seq: u32) -> Command {
    Command {
        instance_id: instance_id.to_string(),
        aggregate_type: aggregate_type.to_string(),
        aggregate_id: aggregate_id.to_string(),
        event_type: event_type.to_string(),
        revision: Some(1),
        payload: json!({ "i": seq }),
        creator: "system".to_string(),
        owner: aggregate_id.to_string(),
        unique_constraints: vec![],
    }
}

#[sqlx::test]
async fn sequential_versions_under_concurrent_same_aggregate_pushes(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    store
        .push(command("t1", "user", "user-X", "user.created", 0))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..3 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.push(command("t1", "user", "user-X", "user.updated", i)).await
        }));
    }

    let mut versions: Vec<i64> = Vec::new();
    for handle in handles {
        let event = handle.await.unwrap().expect("concurrent update should eventually succeed");
        versions.push(event.aggregate_version);
    }
    versions.sort_unstable();
    assert_eq!(versions, vec![2, 3, 4]);

    let aggregate = store.aggregate("t1", "user", "user-X", None).await.unwrap().expect("aggregate exists");
    assert_eq!(aggregate.version, 4);
    assert_eq!(aggregate.events.len(), 4);

    // Every in-order version appears exactly once, with no gaps.
    let observed: Vec<i64> = aggregate.events.iter().map(|event| event.aggregate_version).collect();
    assert_eq!(observed, vec![1, 2, 3, 4]);
}

#[sqlx::test]
async fn parallel_different_aggregates_commit_independently(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    let store_a = store.clone();
    let store_b = store.clone();

    let (event_a, event_b) = tokio::join!(
        store_a.push(command("t1", "user", "user-1", "user.created", 0)),
        store_b.push(command("t1", "user", "user-2", "user.created", 0)),
    );

    let event_a = event_a.unwrap();
    let event_b = event_b.unwrap();

    assert_eq!(event_a.aggregate_version, 1);
    assert_eq!(event_b.aggregate_version, 1);
    assert_ne!(event_a.position(), event_b.position());
}

#[sqlx::test]
async fn batch_events_share_position_and_assign_sequential_in_tx_order(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    let commands = vec![
        command("t1", "user", "user-1", "user.created", 0),
        command("t1", "org", "org-1", "org.created", 0),
        command("t1", "user", "user-2", "user.created", 0),
    ];

    let events = store.push_many(commands, None).await.unwrap();

    assert_eq!(events.len(), 3);
    let position = events[0].position;
    assert!(events.iter().all(|event| event.position == position));

    let mut in_tx_orders: Vec<i32> = events.iter().map(|event| event.in_tx_order).collect();
    in_tx_orders.sort_unstable();
    assert_eq!(in_tx_orders, vec![0, 1, 2]);
}
