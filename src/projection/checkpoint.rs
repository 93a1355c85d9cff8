//! Persistence for per-projection checkpoints (`SPEC_FULL.md` §4.G / §6.1).
//!
//! A checkpoint is always written in the same transaction as the handler's
//! side effects, so a crash between them is impossible: either both land, or
//! neither does, and the event is retried next tick.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::event::Position;

/// Loads a projection's checkpoint, creating a zeroed row for it if this is
/// its first run.
pub async fn load(connection: &mut PgConnection, name: &str) -> Result<Position, sqlx::Error> {
    let row: Option<(Decimal, i32)> = sqlx::query_as("SELECT position, in_tx_order FROM projection_checkpoints WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *connection)
        .await?;

    match row {
        Some((position, in_tx_order)) => Ok(Position::new(position, in_tx_order)),
        None => {
            sqlx::query(
                "INSERT INTO projection_checkpoints (name, position, in_tx_order) VALUES ($1, 0, 0)
                 ON CONFLICT (name) DO NOTHING",
            )
            .bind(name)
            .execute(connection)
            .await?;
            Ok(Position::ZERO)
        }
    }
}

/// Advances a projection's checkpoint to `position`, clearing any recorded
/// `last_error`. Must be called inside the same transaction as the batch of
/// handler invocations it accounts for.
pub async fn advance(connection: &mut PgConnection, name: &str, position: Position) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE projection_checkpoints SET position = $2, in_tx_order = $3, updated_at = now(), last_error = NULL
         WHERE name = $1",
    )
    .bind(name)
    .bind(position.position)
    .bind(position.in_tx_order)
    .execute(connection)
    .await?;
    Ok(())
}

/// Records a handler failure against a projection's checkpoint row without
/// advancing the checkpoint itself, so the failed batch is retried next tick.
pub async fn record_error(pool: &sqlx::PgPool, name: &str, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE projection_checkpoints SET last_error = $2, updated_at = now() WHERE name = $1")
        .bind(name)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}
