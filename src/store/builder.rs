use sqlx::PgPool;

use crate::bus::SubscriptionBus;
use crate::config::EventstoreConfig;

use super::sql;
use super::{EventStore, Inner};

/// Builds a brand-new [`EventStore`]. Mirrors the teacher crate's
/// `PgStoreBuilder`: construct, optionally tweak configuration, `try_build`
/// runs migrations unless explicitly disabled.
pub struct EventStoreBuilder {
    pool: PgPool,
    config: EventstoreConfig,
    run_migrations: bool,
}

impl EventStoreBuilder {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: EventstoreConfig::default(),
            run_migrations: true,
        }
    }

    pub fn with_config(mut self, config: EventstoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Skips running migrations. Use when the schema is already provisioned
    /// (e.g. by a separate migration step at deploy time).
    pub fn without_running_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    /// Runs migrations (unless disabled) and returns the built store.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if migrations fail to apply.
    pub async fn try_build(self) -> Result<EventStore, sqlx::Error> {
        if self.run_migrations {
            sql::run_migrations(&self.pool).await?;
        }

        let bus = SubscriptionBus::new(self.config.enable_subscriptions);

        Ok(EventStore {
            inner: std::sync::Arc::new(Inner {
                pool: self.pool,
                config: self.config,
                bus,
            }),
        })
    }
}
