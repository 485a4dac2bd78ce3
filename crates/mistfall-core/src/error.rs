//! Schema construction errors.
//!
//! Every variant here is raised only at schema construction -- never at
//! runtime -- which is why this crate's error type is kept separate from
//! `mistfall-runtime`'s (which covers failures that can surface from a live
//! write or delete).

/// Errors raised while assembling a [`Schema`](crate::Schema).
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A table declared no primary-key column.
    #[error("table {table} has no primary key column")]
    MissingPrimaryKey {
        /// The offending table.
        table: String,
    },

    /// A table declared more than one primary-key column.
    #[error("table {table} has multiple primary key columns: {columns:?}")]
    MultiplePrimaryKeys {
        /// The offending table.
        table: String,
        /// The conflicting column names, in declaration order.
        columns: Vec<String>,
    },

    /// Two tables were declared under the same name.
    #[error("duplicate table name {name}")]
    DuplicateTable {
        /// The repeated table name.
        name: String,
    },

    /// Two columns of the same table were declared under the same name.
    #[error("duplicate column name {column} in table {table}")]
    DuplicateColumn {
        /// The table the duplicate occurred in.
        table: String,
        /// The repeated column name.
        column: String,
    },

    /// A column's `references(...)` descriptor named a table that does not
    /// exist in the schema.
    #[error("column {table}.{column} references unknown table {target_table}")]
    UnresolvedReferenceTable {
        /// The table declaring the reference.
        table: String,
        /// The column declaring the reference.
        column: String,
        /// The table name it pointed at.
        target_table: String,
    },

    /// A column's `references(...)` descriptor named a column that does not
    /// exist on its target table.
    #[error(
        "column {table}.{column} references unknown column {target_table}.{target_column}"
    )]
    UnresolvedReferenceColumn {
        /// The table declaring the reference.
        table: String,
        /// The column declaring the reference.
        column: String,
        /// The target table, which does exist.
        target_table: String,
        /// The column name that does not exist on it.
        target_column: String,
    },

    /// An index's `Columns` source named zero columns.
    #[error("index {index} on table {table} names no source columns")]
    EmptyIndexColumns {
        /// The table the index is declared on.
        table: String,
        /// The offending index.
        index: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SchemaError>;
