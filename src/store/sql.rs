//! Embedded schema migrations and SQL statement builders for the Postgres
//! substrate. Mirrors the teacher crate's `Migrations`/`Statements` split:
//! migrations run once at store build time, statements are plain `format!`-ed
//! strings bound with `sqlx::query`.

use sqlx::{PgPool, Postgres, Transaction};

use crate::filter::{Filter, SearchQuery};

pub const CREATE_EVENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS events
(
    instance_id text NOT NULL,
    aggregate_type text NOT NULL,
    aggregate_id text NOT NULL,
    event_type text NOT NULL,
    aggregate_version bigint NOT NULL,
    revision int NOT NULL,
    created_at timestamptz NOT NULL DEFAULT now(),
    payload jsonb,
    creator text NOT NULL,
    owner text NOT NULL,
    position numeric NOT NULL,
    in_tx_order int NOT NULL,
    CONSTRAINT events_pkey PRIMARY KEY (instance_id, aggregate_type, aggregate_id, aggregate_version)
)";

pub const CREATE_EVENTS_POSITION_INDEX: &str = "
CREATE INDEX IF NOT EXISTS events_position_idx ON events USING btree (position, in_tx_order)";

pub const CREATE_EVENTS_AGGREGATE_INDEX: &str = "
CREATE INDEX IF NOT EXISTS events_aggregate_idx ON events USING btree (aggregate_type, aggregate_id)";

pub const CREATE_UNIQUE_CONSTRAINTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS unique_constraints
(
    unique_type text NOT NULL,
    unique_field text NOT NULL,
    instance_id text NOT NULL,
    CONSTRAINT unique_constraints_pkey PRIMARY KEY (unique_type, unique_field, instance_id)
)";

pub const CREATE_PROJECTION_CHECKPOINTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS projection_checkpoints
(
    name text PRIMARY KEY,
    position numeric NOT NULL DEFAULT 0,
    in_tx_order int NOT NULL DEFAULT 0,
    updated_at timestamptz NOT NULL DEFAULT now(),
    last_error text
)";

/// Runs every migration inside a single transaction, so a partially-applied
/// schema is never observable by a concurrent store startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut transaction: Transaction<'_, Postgres> = pool.begin().await?;

    for statement in [
        CREATE_EVENTS_TABLE,
        CREATE_EVENTS_POSITION_INDEX,
        CREATE_EVENTS_AGGREGATE_INDEX,
        CREATE_UNIQUE_CONSTRAINTS_TABLE,
        CREATE_PROJECTION_CHECKPOINTS_TABLE,
    ] {
        sqlx::query(statement).execute(&mut *transaction).await?;
    }

    transaction.commit().await
}

/// Builds the `WHERE` clause and parameter bindings for a single [`Filter`].
/// Returned as a `(predicate, params)` pair; the caller is responsible for
/// binding `params` onto the query in order, since `sqlx` has no portable
/// dynamic-bind API for an arbitrary number of parameters.
pub struct CompiledFilter {
    pub predicate: String,
}

/// Compiles a [`Filter`] into a standalone predicate, numbering its bind
/// parameters starting at `$1`. `desc` only affects the statement's `ORDER BY`,
/// not this predicate, and is applied by the caller.
pub fn compile_filter(filter: &Filter, starting_param: usize) -> (String, usize) {
    compile_filter_aliased(filter, starting_param, None)
}

/// Same as [`compile_filter`], but every column reference is qualified with
/// `alias.` when given. Needed wherever the predicate runs in a scope with
/// more than one `events`-shaped table in scope - the exclusion filter inside
/// [`compile_search`]'s `NOT EXISTS` subquery, notably, where a bare column
/// name would be ambiguous between the unioned `matched` rows and the
/// `excluded` table the subquery scans.
pub fn compile_filter_aliased(filter: &Filter, starting_param: usize, alias: Option<&str>) -> (String, usize) {
    let mut clauses: Vec<String> = Vec::new();
    let mut param = starting_param;
    let prefix = alias.map(|a| format!("{a}.")).unwrap_or_default();

    let mut next = |count: usize| -> Vec<usize> {
        let range: Vec<usize> = (param..param + count).collect();
        param += count;
        range
    };

    if filter.instance_id.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}instance_id = ${idx}"));
    }
    if filter.aggregate_types.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}aggregate_type = ANY(${idx})"));
    }
    if filter.aggregate_ids.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}aggregate_id = ANY(${idx})"));
    }
    if filter.event_types.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}event_type = ANY(${idx})"));
    }
    if filter.owner.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}owner = ${idx}"));
    }
    if filter.creator.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}creator = ${idx}"));
    }
    if filter.created_at_from.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}created_at >= ${idx}"));
    }
    if filter.created_at_to.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}created_at <= ${idx}"));
    }
    if filter.position.is_some() {
        let idx = next(1)[0];
        clauses.push(format!("{prefix}position >= ${idx}"));
    }

    let predicate = if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        clauses.join(" AND ")
    };

    (predicate, param)
}

pub fn order_by(desc: bool) -> &'static str {
    // in_tx_order always stays ascending: it is the deterministic commit
    // order within a transaction, regardless of the outer direction
    // (SPEC_FULL.md §9, Open Question 1).
    if desc {
        "ORDER BY position DESC, in_tx_order ASC"
    } else {
        "ORDER BY position ASC, in_tx_order ASC"
    }
}

/// Compiles a [`SearchQuery`]'s unioned filters plus its optional exclusion
/// filter into one `SELECT` body. Returns the SQL text; bind order follows
/// each filter's fields in the order documented on [`compile_filter`], filters
/// first (in order), exclusion filter last.
pub fn compile_search(query: &SearchQuery) -> String {
    let mut param = 1;
    let mut unioned = Vec::new();

    for filter in &query.filters {
        let (predicate, next_param) = compile_filter(filter, param);
        param = next_param;
        unioned.push(format!("SELECT * FROM events WHERE {predicate}"));
    }

    let union_sql = if unioned.is_empty() {
        "SELECT * FROM events WHERE FALSE".to_string()
    } else {
        unioned.join(" UNION ")
    };

    let excluded_sql = match &query.exclude {
        Some(exclude) => {
            let (predicate, _) = compile_filter_aliased(exclude, param, Some("excluded"));
            format!(
                "SELECT * FROM ({union_sql}) matched WHERE NOT EXISTS (
                    SELECT 1 FROM events excluded
                    WHERE excluded.instance_id = matched.instance_id
                      AND excluded.aggregate_type = matched.aggregate_type
                      AND excluded.aggregate_id = matched.aggregate_id
                      AND excluded.aggregate_version = matched.aggregate_version
                      AND {predicate}
                )"
            )
        }
        None => format!("SELECT * FROM ({union_sql}) matched"),
    };

    let direction = if query.desc { "DESC" } else { "ASC" };
    format!("{excluded_sql} ORDER BY position {direction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_filter_defaults_to_true_with_no_fields_set() {
        let (predicate, next_param) = compile_filter(&Filter::new(), 1);
        assert_eq!(predicate, "TRUE");
        assert_eq!(next_param, 1);
    }

    #[test]
    fn compile_filter_numbers_params_in_declaration_order() {
        let filter = Filter::new().with_instance_id("t1").with_aggregate_types(vec!["user".into()]);
        let (predicate, next_param) = compile_filter(&filter, 1);
        assert_eq!(predicate, "instance_id = $1 AND aggregate_type = ANY($2)");
        assert_eq!(next_param, 3);
    }

    #[test]
    fn compile_search_unions_multiple_filters() {
        let query = SearchQuery::new(vec![
            Filter::new().with_instance_id("t1"),
            Filter::new().with_aggregate_types(vec!["user".into()]),
        ]);
        let sql = compile_search(&query);
        assert!(sql.contains("UNION"));
        assert!(sql.contains("ORDER BY position ASC"));
    }
}
