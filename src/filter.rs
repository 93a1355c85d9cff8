use chrono::{DateTime, Utc};

use crate::event::Position;

/// An optional-valued selector over the event log. Every non-`None` field is
/// applied conjunctively; array fields use `ANY` membership; `position` acts
/// as a greater-or-equal-than anchor.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub aggregate_types: Option<Vec<String>>,
    pub aggregate_ids: Option<Vec<String>>,
    pub event_types: Option<Vec<String>>,
    pub instance_id: Option<String>,
    pub owner: Option<String>,
    pub creator: Option<String>,
    pub created_at_from: Option<DateTime<Utc>>,
    pub created_at_to: Option<DateTime<Utc>>,
    pub position: Option<Position>,
    pub limit: Option<u32>,
    pub desc: bool,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_aggregate_types(mut self, aggregate_types: Vec<String>) -> Self {
        self.aggregate_types = Some(aggregate_types);
        self
    }

    pub fn with_aggregate_ids(mut self, aggregate_ids: Vec<String>) -> Self {
        self.aggregate_ids = Some(aggregate_ids);
        self
    }

    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }
}

/// A union of filters (OR-semantics) with an optional exclusion filter and a
/// global limit/direction applied after the union.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub filters: Vec<Filter>,
    pub exclude: Option<Filter>,
    pub limit: Option<u32>,
    pub desc: bool,
}

impl SearchQuery {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            exclude: None,
            limit: None,
            desc: false,
        }
    }

    pub fn excluding(mut self, filter: Filter) -> Self {
        self.exclude = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }
}
