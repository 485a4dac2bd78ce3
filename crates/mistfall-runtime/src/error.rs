//! The runtime's error taxonomy. Schema errors live in `mistfall-core` and
//! are never raised outside `Schema::build`, so they are folded in here
//! only via `#[from]` for callers that want a single error type to
//! propagate.

/// Errors a live write, read, delete, or transaction can surface.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A schema failed to build. Only reachable through `#[from]`
    /// conversion at an application boundary that builds schemas lazily.
    #[error(transparent)]
    Schema(#[from] mistfall_core::SchemaError),

    /// Insert would collide with an existing primary key.
    #[error("primary key violation on {table}: {key} already exists")]
    PrimaryKeyViolation {
        /// The table being inserted into.
        table: String,
        /// The colliding primary-key value, rendered for the message.
        key: String,
    },

    /// A not-null column resolved to null/undefined.
    #[error("not-null violation: {table}.{column} is required")]
    NotNullViolation {
        /// The table.
        table: String,
        /// The offending column.
        column: String,
    },

    /// A foreign-key column's target row did not exist at write time.
    #[error(
        "foreign key violation: {table}.{column} references {target_table}.{target_column} = {value}, which does not exist"
    )]
    ForeignKeyViolation {
        /// The table declaring the foreign key.
        table: String,
        /// The column declaring the foreign key.
        column: String,
        /// The referenced table.
        target_table: String,
        /// The referenced column.
        target_column: String,
        /// The value that failed to resolve, rendered for the message.
        value: String,
    },

    /// A delete was blocked by a dependent row.
    #[error(
        "restrict-deletion violation: row in {table} is referenced by {dependent_table}.{dependent_column}"
    )]
    RestrictDeletionViolation {
        /// The table the delete targeted.
        table: String,
        /// The dependent table holding a reference to it.
        dependent_table: String,
        /// The dependent column.
        dependent_column: String,
    },

    /// A session operation named a table outside its declared set.
    #[error("undeclared table {table} used inside a transaction session")]
    UndeclaredTable {
        /// The offending table name.
        table: String,
    },

    /// `transaction` was invoked with an empty table list.
    #[error("transaction requires at least one declared table")]
    EmptyTransaction,

    /// The backend itself failed (store open, request, or abort failure).
    #[error("backend error: {0}")]
    Backend(String),

    /// Identity allocation failed (sequence unavailable or overflowed).
    #[error("could not allocate an identity value for table {table}")]
    IdentityAllocationFailed {
        /// The table whose sequence failed to advance.
        table: String,
    },

    /// A table name was not found in the schema.
    #[error("no such table: {0}")]
    UnknownTable(String),
}

/// Convenience alias used across the runtime and backend crates.
pub type Result<T> = std::result::Result<T, RuntimeError>;
