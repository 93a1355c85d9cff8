//! `push_with_concurrency_check` (spec.md §8, scenario 3): mismatched expected
//! version fails the whole batch with no new rows, and mixed-aggregate batches
//! are rejected before any transaction opens.

use eventstore::{Command, EventStoreBuilder, Error};
use serde_json::json;
use sqlx::{Pool, Postgres};

fn command(aggregate_type: &str, aggregate_id: &str, event_type: &str) -> Command {
    Command {
        instance_id: "t1".to_string(),
        aggregate_type: aggregate_type.to_string(),
        aggregate_id: aggregate_id.to_string(),
        event_type: event_type.to_string(),
        revision: Some(1),
        payload: json!({}),
        creator: "system".to_string(),
        owner: aggregate_id.to_string(),
        unique_constraints: vec![],
    }
}

#[sqlx::test]
async fn mismatched_expected_version_fails_with_no_partial_commit(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    store.push(command("user", "user-X", "user.created")).await.unwrap();

    let result = store
        .push_with_concurrency_check(vec![command("user", "user-X", "user.updated")], 999, None)
        .await;

    match result {
        Err(Error::Concurrency { expected, actual }) => {
            assert_eq!(expected, 999);
            assert_eq!(actual, 1);
        }
        other => panic!("expected a Concurrency error, got {other:?}"),
    }

    let aggregate = store.aggregate("t1", "user", "user-X", None).await.unwrap().expect("aggregate exists");
    assert_eq!(aggregate.version, 1);
    assert_eq!(aggregate.events.len(), 1);
}

#[sqlx::test]
async fn matching_expected_version_succeeds_and_advances(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    let created = store.push(command("user", "user-X", "user.created")).await.unwrap();
    assert_eq!(created.aggregate_version, 1);

    let events = store
        .push_with_concurrency_check(vec![command("user", "user-X", "user.updated")], 1, None)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].aggregate_version, 2);
}

#[sqlx::test]
async fn mixed_aggregates_are_rejected_before_any_transaction(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    let result = store
        .push_with_concurrency_check(
            vec![command("user", "user-1", "user.created"), command("user", "user-2", "user.created")],
            0,
            None,
        )
        .await;

    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let instances = store.instance_ids(None).await.unwrap();
    assert!(instances.is_empty(), "no rows should have been written");
}
