/// Scope of a unique-constraint claim: per-tenant, or global across every
/// `instance_id`. Global claims are stored with the empty-string sentinel in
/// the `instance_id` column (see `§6.1` of the schema contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraintScope {
    Instance,
    Global,
}

/// An operation on the unique-constraint table, carried alongside a
/// [`crate::Command`] and applied inside the same transaction as the event
/// it rides along with. `Add` always runs before that event's insert.
#[derive(Debug, Clone)]
pub enum UniqueConstraintClaim {
    Add {
        unique_type: String,
        unique_field: String,
        scope: UniqueConstraintScope,
    },
    Remove {
        unique_type: String,
        unique_field: String,
        scope: UniqueConstraintScope,
    },
    InstanceRemove,
}

/// Resolves the `instance_id` column value for a claim scoped to `instance_id`,
/// using the empty-string sentinel for global claims.
pub(crate) fn scope_key<'a>(scope: UniqueConstraintScope, instance_id: &'a str) -> &'a str {
    match scope {
        UniqueConstraintScope::Instance => instance_id,
        UniqueConstraintScope::Global => "",
    }
}
