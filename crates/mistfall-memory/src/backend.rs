//! [`MemoryBackend`] -- in-process implementation of the client contract
//! using ordered containers keyed by primary key.

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mistfall_core::{Predicate, QueryOptions, Row, Schema};
use mistfall_runtime::{Backend, Result, RuntimeError};
use tracing::{info, warn};

use crate::ops::{do_delete, do_insert, do_select, do_update};
use crate::session::MemorySession;
use crate::state::MemoryState;

/// In-process memory backend: the store engine contract implemented over
/// `IndexMap`s guarded by a single mutex, with copy-on-begin snapshots
/// standing in for the persistent backend's native transaction rollback.
pub struct MemoryBackend {
    schema: Schema,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Opens a fresh, empty memory backend for `schema`. There is no
    /// upgrade planner here -- an in-process store has no prior version to
    /// upgrade from and carries no schema-version bookkeeping.
    pub fn open(schema: Schema) -> Self {
        info!(schema = %schema.name, "opening memory backend");
        Self {
            schema,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Runs `f` with a [`MemorySession`] scoped (informationally) to
    /// `tables`. On success, the mutated state is kept; on error, the
    /// snapshot taken at entry is restored in full, including the
    /// sequence map, so an identity allocated inside a rolled-back
    /// transaction is reused by the next successful insert.
    pub async fn transaction<F, Fut, T>(&self, tables: &[&str], f: F) -> Result<T>
    where
        F: FnOnce(MemorySession) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if tables.is_empty() {
            return Err(RuntimeError::EmptyTransaction);
        }
        for table in tables {
            if self.schema.table(table).is_none() {
                return Err(RuntimeError::UnknownTable(table.to_string()));
            }
        }

        let snapshot = {
            let guard = self.state.lock().expect("memory state mutex poisoned");
            guard.snapshot()
        };

        let session = MemorySession {
            schema: self.schema.clone(),
            state: Arc::clone(&self.state),
            declared: tables.iter().map(|t| t.to_string()).collect(),
        };

        match f(session).await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "memory backend transaction rolled back");
                let mut guard = self.state.lock().expect("memory state mutex poisoned");
                guard.restore(snapshot);
                Err(err)
            }
        }
    }
}

#[async_trait(?Send)]
impl Backend for MemoryBackend {
    fn schema(&self) -> &Schema {
        &self.schema
    }

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

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
