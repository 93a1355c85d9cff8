//! The per-projection catch-up task: load checkpoint, tick or wake on new
//! events, fetch a batch, hand matching events to the handler inside one
//! transaction, persist the checkpoint in that same transaction.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgAdvisoryLock, PgAdvisoryLockGuard, PgAdvisoryLockKey};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::SubscriptionFilter;
use crate::config::ProjectionConfig;
use crate::event::{Event, Position};
use crate::store::EventStore;
use crate::Error;

use super::checkpoint;

/// A handler a projection drives. Unlike [`crate::reducer::Reducer`] (the
/// pull-based `filter_to_reducer` contract), this runs inside the runtime's
/// own per-batch transaction, so a handler failure rolls back its write-side
/// effects along with the checkpoint advance.
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    /// Applies one event's effect to the projection's materialized table(s).
    /// Errors here abort the whole batch's transaction - the checkpoint does
    /// not advance and every event in the batch is retried next tick.
    async fn handle(&self, event: &Event, connection: &mut PgConnection) -> Result<(), Error>;
}

/// Point-in-time status of one running projection.
#[derive(Debug, Clone, Default)]
pub struct ProjectionHealth {
    pub name: String,
    pub current_position: Position,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A registered, possibly running, projection.
pub struct ProjectionHandle {
    config: ProjectionConfig,
    handler: Arc<dyn ProjectionHandler>,
    health: Arc<Mutex<ProjectionHealth>>,
    shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
}

impl ProjectionHandle {
    pub fn new(config: ProjectionConfig, handler: Arc<dyn ProjectionHandler>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let health = Arc::new(Mutex::new(ProjectionHealth {
            name: config.name.clone(),
            ..ProjectionHealth::default()
        }));

        Self {
            config,
            handler,
            health,
            shutdown,
            shutdown_rx,
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn health(&self) -> ProjectionHealth {
        self.health.lock().expect("projection health lock poisoned").clone()
    }

    /// Spawns this projection's catch-up task. A no-op if already running.
    pub fn start(&mut self, store: EventStore) {
        if self.task.is_some() {
            return;
        }

        let config = self.config.clone();
        let handler = Arc::clone(&self.handler);
        let health = Arc::clone(&self.health);
        let mut shutdown_rx = self.shutdown_rx.clone();

        self.task = Some(tokio::spawn(async move {
            run(store, config, handler, health, &mut shutdown_rx).await;
        }));
    }

    /// Signals the task to stop and waits for it to finish its current batch.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[ouroboros::self_referencing]
struct HeldAdvisoryLock {
    lock: PgAdvisoryLock,
    #[borrows(lock)]
    #[covariant]
    guard: PgAdvisoryLockGuard<'this, PoolConnection<Postgres>>,
}

async fn acquire_projection_lock(pool: &PgPool, name: &str) -> Result<HeldAdvisoryLock, sqlx::Error> {
    let connection = pool.acquire().await?;
    let lock = PgAdvisoryLock::with_key(PgAdvisoryLockKey::BigInt(lock_key(name)));

    HeldAdvisoryLockAsyncSendTryBuilder {
        lock,
        guard_builder: |lock: &PgAdvisoryLock| Box::pin(async move { lock.acquire(connection).await }),
    }
    .try_build()
    .await
}

fn lock_key(name: &str) -> i64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() as i64
}

async fn run(
    store: EventStore,
    config: ProjectionConfig,
    handler: Arc<dyn ProjectionHandler>,
    health: Arc<Mutex<ProjectionHealth>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let _lock_guard = if config.enable_locking {
        match acquire_projection_lock(store.pool(), &config.name).await {
            Ok(guard) => Some(guard),
            Err(error) => {
                tracing::error!(projection = %config.name, %error, "failed to acquire projection advisory lock");
                return;
            }
        }
    } else {
        None
    };

    let subscription_filter = SubscriptionFilter {
        aggregate_types: non_empty(&config.aggregate_types),
        event_types: non_empty(&config.event_types),
    };
    let mut subscription = store.subscribe(subscription_filter);
    let mut interval = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {},
            batch = subscription.receiver.recv() => {
                if batch.is_none() {
                    // Bus closed (store shutting down); fall through to shutdown check below.
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        if *shutdown_rx.borrow() {
            return;
        }

        loop {
            match tick(&store, &config, handler.as_ref(), &health).await {
                Ok(processed_full_batch) => {
                    if !processed_full_batch {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(projection = %config.name, %error, "projection tick failed, will retry");
                    let _ = checkpoint::record_error(store.pool(), &config.name, &error.to_string()).await;
                    break;
                }
            }

            if *shutdown_rx.borrow() {
                return;
            }
        }
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

/// Runs one catch-up batch. Returns `Ok(true)` if the fetched batch was full
/// (more events likely remain and the caller should tick again immediately).
async fn tick(
    store: &EventStore,
    config: &ProjectionConfig,
    handler: &dyn ProjectionHandler,
    health: &Arc<Mutex<ProjectionHealth>>,
) -> Result<bool, Error> {
    let mut transaction = store.pool().begin().await?;

    let checkpoint = checkpoint::load(&mut transaction, &config.name).await?;
    let batch = store.events_after_position_on(&mut transaction, checkpoint, config.batch_size).await?;

    if batch.is_empty() {
        transaction.commit().await?;
        return Ok(false);
    }

    let is_full_batch = (batch.len() as u32) >= config.batch_size;
    let last_position = batch.last().expect("checked non-empty above").position();

    for event in &batch {
        if matches(config, event) {
            handler.handle(event, &mut transaction).await?;
        }
    }

    checkpoint::advance(&mut transaction, &config.name, last_position).await?;
    transaction.commit().await?;

    let mut health = health.lock().expect("projection health lock poisoned");
    health.current_position = last_position;
    health.last_processed_at = Some(Utc::now());
    health.last_error = None;

    Ok(is_full_batch)
}

fn matches(config: &ProjectionConfig, event: &Event) -> bool {
    let aggregate_ok = config.aggregate_types.is_empty() || config.aggregate_types.iter().any(|t| t == &event.aggregate_type);
    let event_ok = config.event_types.is_empty() || config.event_types.iter().any(|t| t == &event.event_type);
    aggregate_ok && event_ok
}
