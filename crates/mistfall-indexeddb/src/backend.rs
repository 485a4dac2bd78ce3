//! [`IndexedDbBackend`] -- the persistent implementation of the client
//! contract, backed by the browser's IndexedDB facility via
//! `indexed_db_futures`.

use async_trait::async_trait;
use indexed_db_futures::transaction::TransactionMode;
use mistfall_core::{Predicate, QueryOptions, Row, Schema};
use mistfall_runtime::{Backend, Result, RuntimeError};
use tracing::{info, warn};

use crate::error::{describe_js_error, IndexedDbError};
use crate::ops::{do_delete, do_insert, do_select, do_update};
use crate::scope::{operation_scope, session_scope, Operation};
use crate::session::IndexedDbSession;
use crate::upgrade;

/// Persistent backend: one open `indexed_db_futures::database::Database`
/// handle, with every public call building its own scoped engine
/// transaction.
pub struct IndexedDbBackend {
    schema: Schema,
    db: indexed_db_futures::database::Database,
}

impl IndexedDbBackend {
    /// Opens (running the upgrade planner if needed) the database backing
    /// `schema` under `db_name`.
    pub async fn open(schema: Schema, db_name: &str) -> Result<Self> {
        let (db, ran_upgrade) = upgrade::open(&schema, db_name)
            .await
            .map_err(|e| RuntimeError::Backend(e.to_string()))?;

        if ran_upgrade {
            upgrade::write_meta_record(&schema, &db)
                .await
                .map_err(|e| RuntimeError::Backend(e.to_string()))?;
        }

        info!(schema = %schema.name, db = db_name, "opened indexeddb backend");
        Ok(Self { schema, db })
    }

    /// Runs `f` with an [`IndexedDbSession`] bound to one read-write engine
    /// transaction scoped to `tables` and everything they reference.
    /// Commits on success; aborts and surfaces the original error on
    /// failure, matching the engine's native abort-on-error rollback.
    pub async fn transaction<F, Fut, T>(&self, tables: &[&str], f: F) -> Result<T>
    where
        F: FnOnce(IndexedDbSession<'_>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if tables.is_empty() {
            return Err(RuntimeError::EmptyTransaction);
        }
        for table in tables {
            if self.schema.table(table).is_none() {
                return Err(RuntimeError::UnknownTable(table.to_string()));
            }
        }

        let stores = session_scope(&self.schema, tables);
        let store_refs: Vec<&str> = stores.iter().map(String::as_str).collect();
        let tx = self
            .db
            .transaction(store_refs.as_slice())
            .with_mode(TransactionMode::Readwrite)
            .build()
            .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))?;

        let session = IndexedDbSession {
            schema: &self.schema,
            tx: &tx,
            declared: tables.iter().map(|t| t.to_string()).collect(),
        };

        match f(session).await {
            Ok(value) => {
                tx.commit().await.map_err(|e| {
                    RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
                })?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "indexeddb transaction rolled back");
                let _ = tx.abort().await;
                Err(err)
            }
        }
    }

    /// Opens one engine transaction scoped to `table`'s per-operation store
    /// set, in the given mode.
    fn open_scoped_tx(
        &self,
        table: &str,
        op: Operation,
    ) -> Result<indexed_db_futures::transaction::Transaction> {
        let stores = operation_scope(&self.schema, table, op);
        let store_refs: Vec<&str> = stores.iter().map(String::as_str).collect();
        let mode = if op == Operation::Read {
            TransactionMode::Readonly
        } else {
            TransactionMode::Readwrite
        };

        self.db
            .transaction(store_refs.as_slice())
            .with_mode(mode)
            .build()
            .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))
    }

}

#[async_trait(?Send)]
impl Backend for IndexedDbBackend {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let tx = self.open_scoped_tx(table, Operation::Write)?;
        let result = do_insert(&self.schema, &tx, table, rows).await;
        match result {
            Ok(inserted) => {
                tx.commit().await.map_err(|e| {
                    RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
                })?;
                Ok(inserted)
            }
            Err(err) => {
                let _ = tx.abort().await;
                Err(err)
            }
        }
    }

    async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>> {
        let tx = self.open_scoped_tx(table, Operation::Read)?;
        let result = do_select(&self.schema, &tx, table, options).await;
        tx.commit().await.ok();
        result
    }

    async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize> {
        let tx = self.open_scoped_tx(table, Operation::Write)?;
        let result = do_update(&self.schema, &tx, table, predicate, patch).await;
        match result {
            Ok(count) => {
                tx.commit().await.map_err(|e| {
                    RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
                })?;
                Ok(count)
            }
            Err(err) => {
                let _ = tx.abort().await;
                Err(err)
            }
        }
    }

    async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize> {
        let tx = self.open_scoped_tx(table, Operation::Delete)?;
        let result = do_delete(&self.schema, &tx, table, predicate).await;
        match result {
            Ok(count) => {
                tx.commit().await.map_err(|e| {
                    RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
                })?;
                Ok(count)
            }
            Err(err) => {
                let _ = tx.abort().await;
                Err(err)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.db.close();
        Ok(())
    }
}
