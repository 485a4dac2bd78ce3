//! The persistent backend's [`NormalizationContext`]: identity allocation
//! through the `__seq` store, and foreign-key
//! existence checked by a `get` against the target table's store -- both
//! performed inside the same engine transaction as the write they serve,
//! so either both land or neither does.

use async_trait::async_trait;
use indexed_db_futures::transaction::Transaction;
use mistfall_core::{Row, Schema, Value};
use mistfall_runtime::{NormalizationContext, Result, RuntimeError};
use serde::{Deserialize, Serialize};

use crate::error::{describe_js_error, IndexedDbError};
use crate::scope::SEQ_STORE;

#[derive(Serialize, Deserialize)]
struct SeqRecord {
    table: String,
    value: i64,
}

/// Borrows the transaction a single `insert`/`update` call (or a
/// `transaction` session) already opened; never opens a transaction of its
/// own.
pub struct IndexedDbContext<'a> {
    pub schema: &'a Schema,
    pub tx: &'a Transaction,
}

#[async_trait(?Send)]
impl NormalizationContext for IndexedDbContext<'_> {
    async fn allocate_identity(&self, table: &str) -> Result<Value> {
        let store = self.tx.object_store(SEQ_STORE).map_err(|e| {
            RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
        })?;

        let current: Option<SeqRecord> = store.get(table).await.map_err(|e| {
            RuntimeError::from(IndexedDbError::Request {
                store: SEQ_STORE.into(),
                message: describe_js_error(&e),
            })
        })?;

        let next = current.map(|r| r.value).unwrap_or(0) + 1;
        store
            .put(&SeqRecord { table: table.to_string(), value: next })
            .await
            .map_err(|e| {
                RuntimeError::from(IndexedDbError::Request {
                    store: SEQ_STORE.into(),
                    message: describe_js_error(&e),
                })
            })?;

        Ok(serde_json::json!(next))
    }

    async fn ensure_foreign_key(
        &self,
        source_table: &str,
        source_column: &str,
        target_table: &str,
        target_column: &str,
        value: &Value,
    ) -> Result<()> {
        let storage_name = self.schema.storage_name(target_table);
        let store = self.tx.object_store(&storage_name).map_err(|e| {
            RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string())
        })?;

        let found: Option<Row> = store.get(value).await.map_err(|e| {
            RuntimeError::from(IndexedDbError::Request {
                store: storage_name.clone(),
                message: describe_js_error(&e),
            })
        })?;

        if found.is_some() {
            Ok(())
        } else {
            Err(RuntimeError::ForeignKeyViolation {
                table: source_table.to_string(),
                column: source_column.to_string(),
                target_table: target_table.to_string(),
                target_column: target_column.to_string(),
                value: value.to_string(),
            })
        }
    }
}
