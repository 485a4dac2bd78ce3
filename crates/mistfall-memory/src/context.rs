//! The memory backend's [`NormalizationContext`]: identity allocation by
//! incrementing the in-memory sequence counter, and foreign-key existence
//! checked by membership in the target store.

use std::sync::Mutex;

use async_trait::async_trait;
use mistfall_core::{Schema, Value};
use mistfall_runtime::{NormalizationContext, Result, RuntimeError};
use serde_json::json;

use crate::state::{MemoryState, PkKey};

pub struct MemoryContext<'a> {
    pub schema: &'a Schema,
    pub state: &'a Mutex<MemoryState>,
}

#[async_trait(?Send)]
impl NormalizationContext for MemoryContext<'_> {
    async fn allocate_identity(&self, table: &str) -> Result<Value> {
        let storage_name = self.schema.storage_name(table);
        let mut state = self.state.lock().expect("memory state mutex poisoned");
        let seq = state.sequences.entry(storage_name).or_insert(0);
        *seq += 1;
        Ok(json!(*seq))
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
        let key = PkKey::from_value(value).ok_or_else(|| {
            RuntimeError::Backend(format!(
                "{source_table}.{source_column}: foreign key value {value} is not a valid key"
            ))
        })?;

        let state = self.state.lock().expect("memory state mutex poisoned");
        let exists = state
            .stores
            .get(&storage_name)
            .map(|store| store.contains_key(&key))
            .unwrap_or(false);

        if exists {
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
