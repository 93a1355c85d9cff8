/// Errors returned by every public, fallible operation on the [`crate::EventStore`].
///
/// Read methods return empty results rather than an error when a filter simply
/// matches nothing; [`Error::NotFound`] is reserved for explicit by-id lookups.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A command failed structural validation, or a batch violated a static
    /// limit (size, mixed aggregates in a concurrency-checked push). No
    /// transaction is ever opened for this class of error.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic concurrency check failed: the aggregate's actual version at
    /// lock time did not match the version the caller expected.
    #[error("concurrency conflict: expected version {expected}, found {actual}")]
    Concurrency { expected: i64, actual: i64 },

    /// A unique-constraint claim collided with one already held in the same
    /// scope. This is an application-level conflict, not a transient database
    /// race, and is never retried.
    #[error("unique constraint violation: {unique_type}/{unique_field}")]
    UniqueConstraintViolation { unique_type: String, unique_field: String },

    /// An explicit by-id lookup (aggregate, checkpoint) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transient database error survived the push retry budget.
    #[error("transient database error after retries: {0}")]
    Transient(#[source] sqlx::Error),

    /// A programming or schema error; should never occur at steady state.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Neutral classification of a database failure, derived once from the
/// engine-native SQLSTATE so that upper layers never pattern-match on
/// Postgres-specific error codes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// `40001` - the transaction could not be serialized against others.
    SerializationFailure,
    /// `40P01` - a deadlock was detected and this transaction was the victim.
    DeadlockDetected,
    /// `55P03` / `NOWAIT` failures - a row lock could not be acquired.
    LockUnavailable,
    /// `23505` - a unique index was violated outside of the application-level
    /// constraint table (e.g. the aggregate_version race on concurrent writers).
    UniqueViolation,
    /// Connection drops, pool exhaustion, timeouts: worth a retry.
    Transient,
    /// Anything else: schema errors, programming errors, unrecoverable.
    Fatal,
}

impl ErrorClass {
    /// Whether a push attempt that failed with this class should be retried,
    /// per the backoff schedule in [`crate::config::EventstoreConfig`].
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::SerializationFailure | ErrorClass::DeadlockDetected | ErrorClass::LockUnavailable | ErrorClass::UniqueViolation
        )
    }
}

/// Classifies a raw [`sqlx::Error`] using the Postgres SQLSTATE, the single
/// place in the crate allowed to inspect engine-specific error codes.
pub fn classify(error: &sqlx::Error) -> ErrorClass {
    match error {
        sqlx::Error::Database(db_error) => match db_error.code().as_deref() {
            Some("40001") => ErrorClass::SerializationFailure,
            Some("40P01") => ErrorClass::DeadlockDetected,
            Some("55P03") => ErrorClass::LockUnavailable,
            Some("23505") => ErrorClass::UniqueViolation,
            _ => ErrorClass::Fatal,
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}
