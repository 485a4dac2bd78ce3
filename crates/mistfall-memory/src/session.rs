//! The memory backend's transaction session.
//!
//! Unlike the persistent backend, `tables` is informational here -- the
//! memory backend does not reject operations on undeclared tables, since
//! rollback is implemented by whole-state snapshot/restore rather than by
//! scoping an engine transaction to a specific store set.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mistfall_core::{Predicate, QueryOptions, Row, Schema};
use mistfall_runtime::{Result, Session};

use crate::ops::{do_delete, do_insert, do_select, do_update};
use crate::state::MemoryState;

/// A scoped handle passed to a `transaction` callback.
pub struct MemorySession {
    pub(crate) schema: Schema,
    pub(crate) state: Arc<Mutex<MemoryState>>,
    /// Declared table list, kept for parity with the persistent backend's
    /// session and for diagnostics; not enforced.
    pub(crate) declared: Vec<String>,
}

impl MemorySession {
    /// The tables this session was opened against.
    pub fn declared_tables(&self) -> &[String] {
        &self.declared
    }
}

#[async_trait(?Send)]
impl Session for MemorySession {
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        do_insert(&self.schema, &self.state, table, rows).await
    }

    async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>> {
        do_select(&self.schema, &self.state, table, options).await
    }

    async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize> {
        do_update(&self.schema, &self.state, table, predicate, patch).await
    }

    async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize> {
        do_delete(&self.schema, &self.state, table, predicate).await
    }
}
