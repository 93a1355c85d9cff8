//! The event store engine (`SPEC_FULL.md` §4.D): `push`/`push_many`,
//! `push_with_concurrency_check`, the read surface, and `filter_to_reducer`.
//!
//! Modeled on the teacher crate's `PgStore<A>`: an `Arc`-wrapped inner struct
//! holding the pool, configuration, and the instance-scoped subscription bus,
//! so the store is cheaply `Clone`-able while sharing one connection pool and
//! one bus.

mod builder;
pub mod sql;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

pub use builder::EventStoreBuilder;

use crate::bus::{SubscriptionBus, SubscriptionFilter};
use crate::config::EventstoreConfig;
use crate::constraint::{scope_key, UniqueConstraintClaim};
use crate::event::{Aggregate, Command, Event, Position};
use crate::filter::{Filter, SearchQuery};
use crate::reducer::Reducer;
use crate::Error;

type AggregateKey = (String, String, String);

struct Inner {
    pool: PgPool,
    config: EventstoreConfig,
    bus: SubscriptionBus,
}

/// The event store engine. Cheaply cloneable - every clone shares the same
/// connection pool and subscription bus.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<Inner>,
}

/// Outcome of a single push attempt, distinguishing already-classified,
/// non-retryable application errors from raw database errors that still need
/// [`crate::error::classify`] to decide whether another attempt is worthwhile.
enum AttemptError {
    Typed(Error),
    Db(sqlx::Error),
}

impl From<sqlx::Error> for AttemptError {
    fn from(error: sqlx::Error) -> Self {
        AttemptError::Db(error)
    }
}

impl EventStore {
    pub fn config(&self) -> &EventstoreConfig {
        &self.inner.config
    }

    /// The underlying connection pool, for collaborators that need to open
    /// their own transaction alongside the store (the projection runtime's
    /// per-batch transaction, notably).
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Registers a subscriber on this store's instance-scoped subscription
    /// bus. See `SPEC_FULL.md` §4.E.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> crate::bus::Subscription {
        self.inner.bus.subscribe(filter)
    }

    /// `Push(cmd)` is `PushMany([cmd])[0]`.
    #[tracing::instrument(skip_all, fields(aggregate_type = %command.aggregate_type, aggregate_id = %command.aggregate_id))]
    pub async fn push(&self, command: Command) -> Result<Event, Error> {
        let mut events = self.push_many(vec![command], None).await?;
        Ok(events.remove(0))
    }

    /// Validates and persists a batch of commands, returning the committed
    /// events in input order. `max_retries` bounds the retry budget for this
    /// call only; `None` falls back to the store's configured
    /// `EventstoreConfig::max_retries` (default 3). See `SPEC_FULL.md` §4.D
    /// for the retry algorithm.
    #[tracing::instrument(skip_all, fields(batch_size = commands.len(), max_retries))]
    pub async fn push_many(&self, commands: Vec<Command>, max_retries: Option<u32>) -> Result<Vec<Event>, Error> {
        self.push_many_inner(commands, None, max_retries).await
    }

    /// All commands must share `(aggregate_type, aggregate_id)`. Fails the
    /// whole batch with `Concurrency` if the aggregate's actual version,
    /// observed under lock, does not match `expected_version`. `max_retries`
    /// has the same per-call meaning as on [`EventStore::push_many`].
    #[tracing::instrument(skip_all, fields(expected_version, max_retries))]
    pub async fn push_with_concurrency_check(
        &self,
        commands: Vec<Command>,
        expected_version: i64,
        max_retries: Option<u32>,
    ) -> Result<Vec<Event>, Error> {
        if let Some(first) = commands.first() {
            let mismatched = commands
                .iter()
                .any(|command| command.aggregate_type != first.aggregate_type || command.aggregate_id != first.aggregate_id);
            if mismatched {
                return Err(Error::InvalidArgument(
                    "push_with_concurrency_check requires every command to target the same aggregate".to_string(),
                ));
            }
        }

        self.push_many_inner(commands, Some(expected_version), max_retries).await
    }

    async fn push_many_inner(
        &self,
        commands: Vec<Command>,
        expected_version: Option<i64>,
        max_retries: Option<u32>,
    ) -> Result<Vec<Event>, Error> {
        if commands.is_empty() {
            return Err(Error::InvalidArgument("command batch must not be empty".to_string()));
        }

        if commands.len() > self.inner.config.max_push_batch_size {
            return Err(Error::InvalidArgument(format!(
                "batch of {} commands exceeds max_push_batch_size of {}",
                commands.len(),
                self.inner.config.max_push_batch_size
            )));
        }

        for command in &commands {
            command.validate()?;
        }

        let max_retries = max_retries.unwrap_or(self.inner.config.max_retries);

        match tokio::time::timeout(
            self.inner.config.push_timeout,
            self.push_with_retry(&commands, expected_version, max_retries),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::Internal("push_timeout elapsed before the transaction committed".to_string())),
        }
    }

    async fn push_with_retry(&self, commands: &[Command], expected_version: Option<i64>, max_retries: u32) -> Result<Vec<Event>, Error> {
        let mut attempt: u32 = 0;

        loop {
            match self.push_attempt(commands, expected_version).await {
                Ok(events) => {
                    self.inner.bus.publish(Arc::new(events.clone()));
                    return Ok(events);
                }
                Err(AttemptError::Typed(error)) => return Err(error),
                Err(AttemptError::Db(db_error)) => {
                    let class = crate::error::classify(&db_error);

                    if !class.is_retryable() {
                        return Err(Error::Sqlx(db_error));
                    }

                    if attempt >= max_retries {
                        tracing::warn!(attempt, "push exhausted its retry budget on a retryable error");
                        return Err(Error::Transient(db_error));
                    }

                    let backoff = Duration::from_millis(10 * 2u64.pow(attempt));
                    tracing::debug!(attempt, ?backoff, error = %db_error, "retrying push after a transient database error");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn push_attempt(&self, commands: &[Command], expected_version: Option<i64>) -> Result<Vec<Event>, AttemptError> {
        let mut transaction: Transaction<'_, Postgres> = self.inner.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *transaction)
            .await?;

        let position = fetch_transaction_position(&mut transaction).await?;
        let created_at = Utc::now();

        let mut current_versions: HashMap<AggregateKey, i64> = HashMap::new();
        let mut batch_index: HashMap<AggregateKey, i64> = HashMap::new();
        let mut events = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            let key: AggregateKey = (
                command.instance_id.clone(),
                command.aggregate_type.clone(),
                command.aggregate_id.clone(),
            );

            if !current_versions.contains_key(&key) {
                lock_aggregate(&mut transaction, &key).await?;
                let current = read_current_version(&mut transaction, &key).await?;

                if let Some(expected) = expected_version {
                    if current != expected {
                        return Err(AttemptError::Typed(Error::Concurrency {
                            expected,
                            actual: current,
                        }));
                    }
                }

                current_versions.insert(key.clone(), current);
                batch_index.insert(key.clone(), 0);
            }

            for claim in &command.unique_constraints {
                apply_constraint(&mut transaction, &command.instance_id, claim).await?;
            }

            let next_index = batch_index.get_mut(&key).expect("aggregate key was inserted above");
            *next_index += 1;
            let next_version = current_versions[&key] + *next_index;

            let event = insert_event(&mut transaction, command, next_version, position, index as i32, created_at).await?;
            events.push(event);
        }

        transaction.commit().await?;
        Ok(events)
    }

    /// Applies every non-`None` filter field conjunctively; array filters use
    /// `ANY` membership; `position` acts as a greater-or-equal-than anchor.
    pub async fn query(&self, filter: &Filter) -> Result<Vec<Event>, Error> {
        self.query_with(&self.inner.pool, filter).await
    }

    async fn query_with<'e, E>(&self, executor: E, filter: &Filter) -> Result<Vec<Event>, Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let (predicate, _) = sql::compile_filter(filter, 1);
        let order = sql::order_by(filter.desc);
        let sql = format!("SELECT * FROM events WHERE {predicate} {order}{}", limit_clause(filter.limit));

        let mut query = sqlx::query_as::<_, Event>(&sql);
        query = bind_filter(query, filter);

        Ok(query.fetch_all(executor).await?)
    }

    /// Unions each filter's result set (OR-semantics), applies the optional
    /// exclusion filter, then globally orders and limits.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Event>, Error> {
        let sql = sql::compile_search(query);
        let sql = format!("{sql}{}", limit_clause(query.limit));

        let mut compiled = sqlx::query_as::<_, Event>(&sql);
        for filter in &query.filters {
            compiled = bind_filter(compiled, filter);
        }
        if let Some(exclude) = &query.exclude {
            compiled = bind_filter(compiled, exclude);
        }

        Ok(compiled.fetch_all(&self.inner.pool).await?)
    }

    pub async fn count(&self, filter: &Filter) -> Result<i64, Error> {
        let (predicate, _) = sql::compile_filter(filter, 1);
        let sql = format!("SELECT COUNT(*) FROM events WHERE {predicate}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        query = bind_filter_scalar(query, filter);

        Ok(query.fetch_one(&self.inner.pool).await?)
    }

    /// Returns the most recently committed event for the given aggregate, or
    /// `None` if it has never been written to. `instance_id` is part of an
    /// aggregate's identity (`SPEC_FULL.md` §3) alongside `aggregate_type`/
    /// `aggregate_id`, so it is always explicit here rather than implied by
    /// the store's own configuration.
    pub async fn latest_event(&self, instance_id: &str, aggregate_type: &str, aggregate_id: &str) -> Result<Option<Event>, Error> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE instance_id = $1 AND aggregate_type = $2 AND aggregate_id = $3
             ORDER BY aggregate_version DESC LIMIT 1",
        )
        .bind(instance_id)
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.inner.pool)
        .await?;

        Ok(event)
    }

    /// Reconstructs an aggregate from its events, in ascending
    /// `aggregate_version` order, optionally capped at `version`. Returns
    /// `None` if the aggregate has no events. See [`EventStore::latest_event`]
    /// on why `instance_id` is an explicit parameter rather than implied.
    pub async fn aggregate(
        &self,
        instance_id: &str,
        aggregate_type: &str,
        aggregate_id: &str,
        version: Option<i64>,
    ) -> Result<Option<Aggregate>, Error> {
        let events = match version {
            Some(max_version) => {
                sqlx::query_as::<_, Event>(
                    "SELECT * FROM events WHERE instance_id = $1 AND aggregate_type = $2 AND aggregate_id = $3
                     AND aggregate_version <= $4 ORDER BY aggregate_version ASC",
                )
                .bind(instance_id)
                .bind(aggregate_type)
                .bind(aggregate_id)
                .bind(max_version)
                .fetch_all(&self.inner.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Event>(
                    "SELECT * FROM events WHERE instance_id = $1 AND aggregate_type = $2 AND aggregate_id = $3
                     ORDER BY aggregate_version ASC",
                )
                .bind(instance_id)
                .bind(aggregate_type)
                .bind(aggregate_id)
                .fetch_all(&self.inner.pool)
                .await?
            }
        };

        Ok(Aggregate::from_events(events))
    }

    /// Returns events with `position > anchor.position OR (position = anchor.position
    /// AND in_tx_order > anchor.in_tx_order)`, ordered ascending, bounded by `limit`.
    /// Iterating with the last returned event's position as the next anchor yields
    /// every event exactly once, in global order (`SPEC_FULL.md` §8, P4).
    pub async fn events_after_position(&self, anchor: Position, limit: u32) -> Result<Vec<Event>, Error> {
        Ok(events_after_position_with(&self.inner.pool, anchor, limit).await?)
    }

    /// Same as [`EventStore::events_after_position`], but runs on a caller-owned
    /// connection or transaction rather than the pool - used by the projection
    /// runtime so its checkpoint read and fetch share one transaction.
    pub async fn events_after_position_on(&self, connection: &mut PgConnection, anchor: Position, limit: u32) -> Result<Vec<Event>, Error> {
        Ok(events_after_position_with(connection, anchor, limit).await?)
    }

    /// The maximum `(position, in_tx_order)` pair over events matching
    /// `filter`, or `Position::ZERO` if none match.
    pub async fn latest_position(&self, filter: Option<&Filter>) -> Result<Position, Error> {
        let default_filter = Filter::default();
        let filter = filter.unwrap_or(&default_filter);
        let (predicate, _) = sql::compile_filter(filter, 1);
        let sql = format!(
            "SELECT position, in_tx_order FROM events WHERE {predicate}
             ORDER BY position DESC, in_tx_order DESC LIMIT 1"
        );

        let mut query = sqlx::query_as::<_, (Decimal, i32)>(&sql);
        query = bind_filter(query, filter);

        let row = query.fetch_optional(&self.inner.pool).await?;
        Ok(row.map(|(position, in_tx_order)| Position::new(position, in_tx_order)).unwrap_or_default())
    }

    /// Every `instance_id` with at least one event matching `filter`, sorted
    /// ascending.
    pub async fn instance_ids(&self, filter: Option<&Filter>) -> Result<Vec<String>, Error> {
        let default_filter = Filter::default();
        let filter = filter.unwrap_or(&default_filter);
        let (predicate, _) = sql::compile_filter(filter, 1);
        let sql = format!("SELECT DISTINCT instance_id FROM events WHERE {predicate} ORDER BY instance_id ASC");

        let mut query = sqlx::query_scalar::<_, String>(&sql);
        query = bind_filter_scalar(query, filter);

        Ok(query.fetch_all(&self.inner.pool).await?)
    }

    /// Streams matching events into `reducer` in batches of at least 100,
    /// calling `append_events` then `reduce` per batch; never materializes
    /// the whole result set in memory (`SPEC_FULL.md` §8, P7).
    ///
    /// The first page honors `filter.position` with `Query`'s own
    /// greater-or-equal-than semantics. Every page after that re-anchors on
    /// the previous page's last event using a strict `(position, in_tx_order)`
    /// tie-break - a bare `position >=` anchor would re-match and re-apply
    /// that last event to `reducer` on the next page, double-counting it
    /// whenever a batch boundary lands on events sharing one `position`
    /// (`SPEC_FULL.md` §8, P4/P7).
    pub async fn filter_to_reducer(&self, filter: &Filter, reducer: &mut (dyn Reducer + Send)) -> Result<(), Error> {
        const BATCH_SIZE: u32 = 100;

        let batch_size = filter.limit.unwrap_or(BATCH_SIZE).max(BATCH_SIZE);
        let mut anchor = filter.position.unwrap_or_default();
        let mut first_page = true;

        loop {
            let batch = if first_page {
                let page_filter = Filter {
                    position: Some(anchor),
                    limit: Some(batch_size),
                    ..filter.clone()
                };
                self.query(&page_filter).await?
            } else {
                self.query_strictly_after(filter, anchor, batch_size).await?
            };

            if batch.is_empty() {
                break;
            }

            let exhausted = (batch.len() as u32) < batch_size;
            anchor = batch.last().expect("checked non-empty above").position();
            first_page = false;

            reducer.append_events(&batch);
            reducer.reduce().await?;

            if exhausted {
                break;
            }
        }

        Ok(())
    }

    /// Matches `filter`'s other fields (ignoring its own `position`) and
    /// `position > anchor.position OR (position = anchor.position AND
    /// in_tx_order > anchor.in_tx_order)`, ordered ascending - the same
    /// tie-break [`events_after_position_with`] uses, for callers that need
    /// to paginate a filtered result set without ever re-matching the
    /// boundary event.
    async fn query_strictly_after(&self, filter: &Filter, anchor: Position, limit: u32) -> Result<Vec<Event>, Error> {
        let mut base = filter.clone();
        base.position = None;

        let (predicate, next_param) = sql::compile_filter(&base, 1);
        let position_param = next_param;
        let in_tx_order_param = next_param + 1;
        let limit_param = next_param + 2;
        let sql = format!(
            "SELECT * FROM events WHERE {predicate} AND (position > ${position_param} OR (position = ${position_param} AND in_tx_order > ${in_tx_order_param}))
             ORDER BY position ASC, in_tx_order ASC LIMIT ${limit_param}"
        );

        let mut query = sqlx::query_as::<_, Event>(&sql);
        query = bind_filter(query, &base);
        query = query.bind(anchor.position).bind(anchor.in_tx_order).bind(i64::from(limit));

        Ok(query.fetch_all(&self.inner.pool).await?)
    }

    /// Verifies the pool can still reach the database.
    pub async fn health(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.inner.pool).await?;
        Ok(())
    }

    /// Closes the connection pool and the subscription bus.
    pub async fn close(&self) {
        self.inner.bus.close_all();
        self.inner.pool.close().await;
    }
}

async fn events_after_position_with<'e, E>(executor: E, anchor: Position, limit: u32) -> Result<Vec<Event>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events
         WHERE position > $1 OR (position = $1 AND in_tx_order > $2)
         ORDER BY position ASC, in_tx_order ASC
         LIMIT $3",
    )
    .bind(anchor.position)
    .bind(anchor.in_tx_order)
    .bind(i64::from(limit))
    .fetch_all(executor)
    .await
}

fn limit_clause(limit: Option<u32>) -> String {
    match limit {
        Some(limit) => format!(" LIMIT {limit}"),
        None => String::new(),
    }
}

/// Binds a [`Filter`]'s present fields onto a query, in the exact order
/// [`sql::compile_filter`] numbered them.
fn bind_filter<'q, O>(
    mut query: sqlx::query_as::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments>,
    filter: &'q Filter,
) -> sqlx::query_as::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments> {
    if let Some(instance_id) = &filter.instance_id {
        query = query.bind(instance_id);
    }
    if let Some(aggregate_types) = &filter.aggregate_types {
        query = query.bind(aggregate_types);
    }
    if let Some(aggregate_ids) = &filter.aggregate_ids {
        query = query.bind(aggregate_ids);
    }
    if let Some(event_types) = &filter.event_types {
        query = query.bind(event_types);
    }
    if let Some(owner) = &filter.owner {
        query = query.bind(owner);
    }
    if let Some(creator) = &filter.creator {
        query = query.bind(creator);
    }
    if let Some(created_at_from) = &filter.created_at_from {
        query = query.bind(created_at_from);
    }
    if let Some(created_at_to) = &filter.created_at_to {
        query = query.bind(created_at_to);
    }
    if let Some(position) = &filter.position {
        query = query.bind(position.position);
    }
    query
}

fn bind_filter_scalar<'q, O>(
    mut query: sqlx::query_scalar::QueryScalar<'q, Postgres, O, sqlx::postgres::PgArguments>,
    filter: &'q Filter,
) -> sqlx::query_scalar::QueryScalar<'q, Postgres, O, sqlx::postgres::PgArguments> {
    if let Some(instance_id) = &filter.instance_id {
        query = query.bind(instance_id);
    }
    if let Some(aggregate_types) = &filter.aggregate_types {
        query = query.bind(aggregate_types);
    }
    if let Some(aggregate_ids) = &filter.aggregate_ids {
        query = query.bind(aggregate_ids);
    }
    if let Some(event_types) = &filter.event_types {
        query = query.bind(event_types);
    }
    if let Some(owner) = &filter.owner {
        query = query.bind(owner);
    }
    if let Some(creator) = &filter.creator {
        query = query.bind(creator);
    }
    if let Some(created_at_from) = &filter.created_at_from {
        query = query.bind(created_at_from);
    }
    if let Some(created_at_to) = &filter.created_at_to {
        query = query.bind(created_at_to);
    }
    if let Some(position) = &filter.position {
        query = query.bind(position.position);
    }
    query
}

/// Reads a monotonic, wall-clock-derived `position` once per transaction so
/// every event committed by this batch shares it (`SPEC_FULL.md` §9, Open
/// Question 2: the clock-based path, not `MAX(position)+1`, is the one that
/// upholds P2 under concurrent writers).
async fn fetch_transaction_position(transaction: &mut PgConnection) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar("SELECT EXTRACT(EPOCH FROM clock_timestamp())::numeric(20,6)")
        .fetch_one(transaction)
        .await
}

/// Serializes concurrent writers to the same aggregate using a transaction-scoped
/// advisory lock, automatically released at commit or rollback. This replaces the
/// teacher's session-held `PgAdvisoryLockGuard` (acquired on a dedicated pooled
/// connection and released on `Drop`) with the simpler `pg_advisory_xact_lock`
/// function, since our lock's lifetime is always exactly the push transaction's.
async fn lock_aggregate(transaction: &mut PgConnection, key: &AggregateKey) -> Result<(), sqlx::Error> {
    let lock_key = format!("{}:{}:{}", key.0, key.1, key.2);
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(lock_key)
        .execute(transaction)
        .await?;
    Ok(())
}

async fn read_current_version(transaction: &mut PgConnection, key: &AggregateKey) -> Result<i64, sqlx::Error> {
    // The advisory lock above already serializes writers to a brand-new aggregate
    // (no row yet to lock); FOR UPDATE covers the common case of an existing one.
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT aggregate_version FROM events
         WHERE instance_id = $1 AND aggregate_type = $2 AND aggregate_id = $3
         ORDER BY aggregate_version DESC LIMIT 1 FOR UPDATE",
    )
    .bind(&key.0)
    .bind(&key.1)
    .bind(&key.2)
    .fetch_optional(transaction)
    .await?;

    Ok(row.map(|(version,)| version).unwrap_or(0))
}

/// Applies one unique-constraint operation inside the surrounding transaction.
/// `Add`'s failure is mapped directly to the non-retryable
/// [`Error::UniqueConstraintViolation`] here, rather than left for the retry
/// loop's generic classifier - this is an application-level conflict, not a
/// transient database race (`SPEC_FULL.md` §7).
async fn apply_constraint(transaction: &mut PgConnection, instance_id: &str, claim: &UniqueConstraintClaim) -> Result<(), AttemptError> {
    match claim {
        UniqueConstraintClaim::Add {
            unique_type,
            unique_field,
            scope,
        } => {
            let key = scope_key(*scope, instance_id);
            let result = sqlx::query("INSERT INTO unique_constraints (unique_type, unique_field, instance_id) VALUES ($1, $2, $3)")
                .bind(unique_type)
                .bind(unique_field)
                .bind(key)
                .execute(transaction)
                .await;

            match result {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(db_error)) if db_error.code().as_deref() == Some("23505") => {
                    Err(AttemptError::Typed(Error::UniqueConstraintViolation {
                        unique_type: unique_type.clone(),
                        unique_field: unique_field.clone(),
                    }))
                }
                Err(other) => Err(AttemptError::Db(other)),
            }
        }
        UniqueConstraintClaim::Remove {
            unique_type,
            unique_field,
            scope,
        } => {
            let key = scope_key(*scope, instance_id);
            sqlx::query("DELETE FROM unique_constraints WHERE unique_type = $1 AND unique_field = $2 AND instance_id = $3")
                .bind(unique_type)
                .bind(unique_field)
                .bind(key)
                .execute(transaction)
                .await?;
            Ok(())
        }
        UniqueConstraintClaim::InstanceRemove => {
            sqlx::query("DELETE FROM unique_constraints WHERE instance_id = $1")
                .bind(instance_id)
                .execute(transaction)
                .await?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_event(
    transaction: &mut PgConnection,
    command: &Command,
    aggregate_version: i64,
    position: Decimal,
    in_tx_order: i32,
    created_at: DateTime<Utc>,
) -> Result<Event, sqlx::Error> {
    sqlx::query(
        "INSERT INTO events
         (instance_id, aggregate_type, aggregate_id, event_type, aggregate_version, revision,
          payload, creator, owner, position, in_tx_order, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&command.instance_id)
    .bind(&command.aggregate_type)
    .bind(&command.aggregate_id)
    .bind(&command.event_type)
    .bind(aggregate_version)
    .bind(i32::from(command.resolved_revision()))
    .bind(&command.payload)
    .bind(&command.creator)
    .bind(&command.owner)
    .bind(position)
    .bind(in_tx_order)
    .bind(created_at)
    .execute(transaction)
    .await?;

    Ok(Event {
        instance_id: command.instance_id.clone(),
        aggregate_type: command.aggregate_type.clone(),
        aggregate_id: command.aggregate_id.clone(),
        event_type: command.event_type.clone(),
        aggregate_version,
        revision: i32::from(command.resolved_revision()),
        payload: command.payload.clone(),
        creator: command.creator.clone(),
        owner: command.owner.clone(),
        created_at,
        position,
        in_tx_order,
    })
}
