use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::Error;

/// A store-global monotonic marker. Every event committed by the same
/// `Push*` transaction shares its `position`; `in_tx_order` disambiguates
/// between them. Represented as an exact [`Decimal`], never a float -
/// equality on tied positions is load-bearing for [`crate::event::Event`]
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub position: Decimal,
    pub in_tx_order: i32,
}

impl Position {
    pub const ZERO: Position = Position {
        position: Decimal::ZERO,
        in_tx_order: 0,
    };

    pub fn new(position: Decimal, in_tx_order: i32) -> Self {
        Self { position, in_tx_order }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::ZERO
    }
}

/// The schema revision assumed when a [`Command`] leaves `revision` unset.
pub const DEFAULT_REVISION: u16 = 1;

/// A command: an event-to-be. Same shape as [`Event`] minus the fields that
/// only the store can assign (`aggregate_version`, `created_at`, `position`,
/// `in_tx_order`).
#[derive(Debug, Clone)]
pub struct Command {
    pub instance_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    /// Defaults to [`DEFAULT_REVISION`] when `None`.
    pub revision: Option<u16>,
    pub payload: Value,
    pub creator: String,
    pub owner: String,
    pub unique_constraints: Vec<crate::constraint::UniqueConstraintClaim>,
}

impl Command {
    /// The revision that will be written for this command: `revision` if
    /// set, otherwise [`DEFAULT_REVISION`].
    pub fn resolved_revision(&self) -> u16 {
        self.revision.unwrap_or(DEFAULT_REVISION)
    }

    /// A command is valid iff `instance_id`, `aggregate_type`, `aggregate_id`,
    /// `event_type`, `creator` and `owner` are all non-empty. `Push*` must
    /// reject invalid commands before opening a transaction.
    pub fn validate(&self) -> Result<(), Error> {
        let missing = [
            ("instance_id", self.instance_id.is_empty()),
            ("aggregate_type", self.aggregate_type.is_empty()),
            ("aggregate_id", self.aggregate_id.is_empty()),
            ("event_type", self.event_type.is_empty()),
            ("creator", self.creator.is_empty()),
            ("owner", self.owner.is_empty()),
        ]
        .into_iter()
        .find(|(_, empty)| *empty);

        match missing {
            Some((field, _)) => Err(Error::InvalidArgument(format!("command is missing required field `{field}`"))),
            None => Ok(()),
        }
    }
}

/// An immutable, committed append to the event log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Event {
    pub instance_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub aggregate_version: i64,
    pub revision: i32,
    pub payload: Value,
    pub creator: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub position: Decimal,
    pub in_tx_order: i32,
}

impl Event {
    pub fn position(&self) -> Position {
        Position::new(self.position, self.in_tx_order)
    }
}

/// An aggregate reconstructed from its events: the fold of its history.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub id: String,
    pub aggregate_type: String,
    pub instance_id: String,
    pub owner: String,
    pub version: i64,
    pub position: Position,
    pub events: Vec<Event>,
}

impl Aggregate {
    /// Builds an aggregate from a non-empty, ascending-by-version slice of
    /// events belonging to the same `(instance_id, aggregate_type, aggregate_id)`.
    /// Returns `None` for an empty slice - callers map that to "aggregate not found".
    pub fn from_events(events: Vec<Event>) -> Option<Self> {
        let last = events.last()?;
        Some(Self {
            id: last.aggregate_id.clone(),
            aggregate_type: last.aggregate_type.clone(),
            instance_id: last.instance_id.clone(),
            owner: last.owner.clone(),
            version: last.aggregate_version,
            position: last.position(),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_command() -> Command {
        Command {
            instance_id: "t1".into(),
            aggregate_type: "user".into(),
            aggregate_id: "user-1".into(),
            event_type: "user.created".into(),
            revision: Some(1),
            payload: serde_json::json!({}),
            creator: "system".into(),
            owner: "user-1".into(),
            unique_constraints: vec![],
        }
    }

    #[test]
    fn validates_a_well_formed_command() {
        assert!(valid_command().validate().is_ok());
    }

    #[test]
    fn rejects_commands_with_empty_required_fields() {
        let mut command = valid_command();
        command.owner = String::new();
        assert!(matches!(command.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn position_orders_lexicographically_on_position_then_in_tx_order() {
        let a = Position::new(Decimal::new(10, 0), 3);
        let b = Position::new(Decimal::new(10, 0), 4);
        let c = Position::new(Decimal::new(11, 0), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn aggregate_from_events_is_none_for_empty_history() {
        assert!(Aggregate::from_events(vec![]).is_none());
    }

    #[test]
    fn resolved_revision_falls_back_to_the_default_when_unset() {
        let mut command = valid_command();
        command.revision = None;
        assert_eq!(command.resolved_revision(), DEFAULT_REVISION);

        command.revision = Some(7);
        assert_eq!(command.resolved_revision(), 7);
    }
}
