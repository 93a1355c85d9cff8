use std::time::Duration;

/// Engine-wide configuration. Mirrors the collaborator-facing contract: every
/// field has a default matching the values the command layer and projection
/// runtime are built and tested against.
#[derive(Debug, Clone)]
pub struct EventstoreConfig {
    pub instance_id: String,
    pub max_push_batch_size: usize,
    pub push_timeout: Duration,
    pub enable_subscriptions: bool,
    pub max_retries: u32,
}

impl Default for EventstoreConfig {
    fn default() -> Self {
        Self {
            instance_id: "default".to_string(),
            max_push_batch_size: 100,
            push_timeout: Duration::from_millis(30_000),
            enable_subscriptions: true,
            max_retries: 3,
        }
    }
}

/// Per-projection configuration: what it listens to, how big its batches are,
/// and how often it polls when not woken by the subscription bus.
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    pub name: String,
    pub tables: Vec<String>,
    pub event_types: Vec<String>,
    pub aggregate_types: Vec<String>,
    pub batch_size: u32,
    pub interval: Duration,
    pub enable_locking: bool,
}

impl ProjectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            event_types: Vec::new(),
            aggregate_types: Vec::new(),
            batch_size: 100,
            interval: Duration::from_millis(1000),
            enable_locking: false,
        }
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = event_types;
        self
    }

    pub fn with_aggregate_types(mut self, aggregate_types: Vec<String>) -> Self {
        self.aggregate_types = aggregate_types;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_locking_enabled(mut self) -> Self {
        self.enable_locking = true;
        self
    }
}
