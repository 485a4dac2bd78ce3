//! The persistent backend's transaction session.
//!
//! Unlike the memory backend's session, this one actively enforces the
//! declared table list: every call checks `table` against `declared`
//! before touching the engine transaction, surfacing
//! [`RuntimeError::UndeclaredTable`] rather than silently scoping outside
//! what `session_scope` opened the transaction against.

use async_trait::async_trait;
use indexed_db_futures::transaction::Transaction;
use mistfall_core::{Predicate, QueryOptions, Row, Schema};
use mistfall_runtime::{Result, RuntimeError, Session};

use crate::ops::{do_delete, do_insert, do_select, do_update};

/// A scoped handle passed to a `transaction` callback, bound to one engine
/// transaction already opened by [`crate::IndexedDbBackend::transaction`].
pub struct IndexedDbSession<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) tx: &'a Transaction,
    pub(crate) declared: Vec<String>,
}

impl IndexedDbSession<'_> {
    /// The tables this session was opened against.
    pub fn declared_tables(&self) -> &[String] {
        &self.declared
    }

    fn check_declared(&self, table: &str) -> Result<()> {
        if self.declared.iter().any(|t| t == table) {
            Ok(())
        } else {
            Err(RuntimeError::UndeclaredTable { table: table.to_string() })
        }
    }
}

#[async_trait(?Send)]
impl Session for IndexedDbSession<'_> {
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.check_declared(table)?;
        do_insert(self.schema, self.tx, table, rows).await
    }

    async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>> {
        self.check_declared(table)?;
        do_select(self.schema, self.tx, table, options).await
    }

    async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize> {
        self.check_declared(table)?;
        do_update(self.schema, self.tx, table, predicate, patch).await
    }

    async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize> {
        self.check_declared(table)?;
        do_delete(self.schema, self.tx, table, predicate).await
    }
}
