//! `FilterToReducer` applied to a filter must produce the same final
//! read-model state as `Query(filter)` followed by one `append_events` +
//! `reduce` (spec.md §8, property P7), even when the store has to paginate
//! internally because the result set is larger than one batch.

use async_trait::async_trait;
use eventstore::{Command, Error, Event, EventStoreBuilder, Filter, Reducer};
use serde_json::json;
use sqlx::{Pool, Postgres};

#[derive(Default)]
struct CountingReducer {
    pending: Vec<Event>,
    applied: u64,
    last_payload_sum: i64,
}

#[async_trait]
impl Reducer for CountingReducer {
    fn append_events(&mut self, events: &[Event]) {
        self.pending.extend_from_slice(events);
    }

    async fn reduce(&mut self) -> Result<(), Error> {
        for event in self.pending.drain(..) {
            self.applied += 1;
            self.last_payload_sum += event.payload["i"].as_i64().unwrap_or(0);
        }
        Ok(())
    }
}

fn command(aggregate_id: &str, seq: i64) -> Command {
    Command {
        instance_id: "t1".to_string(),
        aggregate_type: "user".to_string(),
        aggregate_id: aggregate_id.to_string(),
        event_type: "user.updated".to_string(),
        revision: Some(1),
        payload: json!({ "i": seq }),
        creator: "system".to_string(),
        owner: aggregate_id.to_string(),
        unique_constraints: vec![],
    }
}

#[sqlx::test]
async fn streaming_reduction_matches_one_shot_reduction(pool: Pool<Postgres>) {
    let store = EventStoreBuilder::new(pool).try_build().await.unwrap();

    // More than one internal batch (filter_to_reducer batches by >= 100).
    for i in 0..230 {
        store.push(command("user-X", i)).await.unwrap();
    }

    let filter = Filter::new().with_instance_id("t1").with_aggregate_types(vec!["user".to_string()]);

    let mut streamed = CountingReducer::default();
    store.filter_to_reducer(&filter, &mut streamed).await.unwrap();

    let mut one_shot = CountingReducer::default();
    let events = store.query(&filter).await.unwrap();
    one_shot.append_events(&events);
    one_shot.reduce().await.unwrap();

    assert_eq!(streamed.applied, one_shot.applied);
    assert_eq!(streamed.applied, 230);
    assert_eq!(streamed.last_payload_sum, one_shot.last_payload_sum);
}
