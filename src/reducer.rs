use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::event::{Event, Position};
use crate::Error;

/// Contract for streaming committed events into a stateful read-model
/// accumulator. [`crate::EventStore::filter_to_reducer`] calls `append_events`
/// for every fetched batch followed by `reduce`, and never materializes the
/// whole result set in memory.
#[async_trait]
pub trait Reducer: Send {
    fn append_events(&mut self, events: &[Event]);

    async fn reduce(&mut self) -> Result<(), Error>;
}

/// Base read-model bookkeeping shared by every concrete projection. Not a
/// supertype: concrete read models embed this struct and override
/// `handle_event`/`serialize_state` on their own type.
#[derive(Debug, Clone, Default)]
pub struct ReadModelState {
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub instance_id: String,
    pub owner: String,
    pub processed_sequence: u64,
    pub position: Position,
    pub creation_date: Option<DateTime<Utc>>,
    pub change_date: Option<DateTime<Utc>>,
}

impl ReadModelState {
    /// Folds one event's metadata into the base state. Concrete read models
    /// call this from their `handle_event` before mutating domain fields.
    pub fn apply(&mut self, event: &Event) {
        if self.processed_sequence == 0 {
            self.aggregate_id = event.aggregate_id.clone();
            self.aggregate_type = event.aggregate_type.clone();
            self.instance_id = event.instance_id.clone();
            self.creation_date = Some(event.created_at);
        }

        self.owner = event.owner.clone();
        self.processed_sequence += 1;
        self.position = event.position();
        self.change_date = Some(event.created_at);
    }

    /// Resets the base state to zero, leaving domain fields on the concrete
    /// read model untouched. Used explicitly by operators rebuilding a
    /// projection from scratch.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(aggregate_id: &str, seq: i64) -> Event {
        Event {
            instance_id: "t1".into(),
            aggregate_type: "user".into(),
            aggregate_id: aggregate_id.into(),
            event_type: "user.updated".into(),
            aggregate_version: seq,
            revision: 1,
            payload: json!({}),
            creator: "system".into(),
            owner: "owner-1".into(),
            created_at: Utc::now(),
            position: rust_decimal::Decimal::new(seq, 0),
            in_tx_order: 0,
        }
    }

    #[test]
    fn apply_tracks_creation_date_only_on_first_event() {
        let mut state = ReadModelState::default();
        state.apply(&event("a", 1));
        let first_creation = state.creation_date;
        state.apply(&event("a", 2));
        assert_eq!(state.creation_date, first_creation);
        assert_eq!(state.processed_sequence, 2);
    }

    #[test]
    fn reset_zeroes_the_base_state() {
        let mut state = ReadModelState::default();
        state.apply(&event("a", 1));
        state.reset();
        assert_eq!(state.processed_sequence, 0);
        assert!(state.creation_date.is_none());
    }
}
