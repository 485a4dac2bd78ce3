//! Shared CRUD logic used by both [`crate::MemoryBackend`] (implicit,
//! non-transactional calls) and [`crate::MemorySession`] (calls made inside
//! a `transaction` body). Kept free of `self` so neither caller duplicates
//! the normalization/restrict-check plumbing.

use std::sync::Mutex;

use mistfall_core::{Predicate, QueryOptions, Row, Schema, clone_row, evaluate};
use mistfall_runtime::{NormalizationContext, Result, RuntimeError, normalize_insert, normalize_update};
use tracing::debug;

use crate::context::MemoryContext;
use crate::state::{MemoryState, PkKey};

fn require_table<'a>(schema: &'a Schema, table: &str) -> Result<&'a mistfall_core::Table> {
    schema
        .table(table)
        .ok_or_else(|| RuntimeError::UnknownTable(table.to_string()))
}

pub async fn do_insert(
    schema: &Schema,
    state: &Mutex<MemoryState>,
    table: &str,
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let pk_name = t.primary_key().name.clone();
    let ctx = MemoryContext { schema, state };

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let normalized = normalize_insert(t, row, &ctx).await?;
        let key = PkKey::from_value(&normalized[&pk_name]).ok_or_else(|| {
            RuntimeError::Backend(format!("{table}.{pk_name} did not resolve to a valid key"))
        })?;

        let mut guard = state.lock().expect("memory state mutex poisoned");
        let store = guard.stores.entry(storage_name.clone()).or_default();
        if store.contains_key(&key) {
            return Err(RuntimeError::PrimaryKeyViolation {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        store.insert(key, normalized.clone());
        drop(guard);

        results.push(clone_row(&normalized));
    }

    debug!(table, inserted = results.len(), "memory backend insert");
    Ok(results)
}

pub async fn do_select(
    schema: &Schema,
    state: &Mutex<MemoryState>,
    table: &str,
    options: QueryOptions,
) -> Result<Vec<Row>> {
    require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let rows: Vec<Row> = {
        let guard = state.lock().expect("memory state mutex poisoned");
        guard
            .stores
            .get(&storage_name)
            .map(|store| store.values().cloned().collect())
            .unwrap_or_default()
    };
    Ok(evaluate(&rows, &options))
}

pub async fn do_update(
    schema: &Schema,
    state: &Mutex<MemoryState>,
    table: &str,
    predicate: Predicate,
    patch: Row,
) -> Result<usize> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let ctx = MemoryContext { schema, state };

    let matching_keys: Vec<PkKey> = {
        let guard = state.lock().expect("memory state mutex poisoned");
        match guard.stores.get(&storage_name) {
            Some(store) => store
                .iter()
                .filter(|(_, row)| predicate(row))
                .map(|(key, _)| key.clone())
                .collect(),
            None => Vec::new(),
        }
    };

    let mut updated = 0;
    for key in matching_keys {
        let existing = {
            let guard = state.lock().expect("memory state mutex poisoned");
            guard.stores.get(&storage_name).and_then(|s| s.get(&key)).cloned()
        };
        let Some(existing) = existing else { continue };

        let normalized = normalize_update(t, &existing, patch.clone(), &ctx).await?;

        let mut guard = state.lock().expect("memory state mutex poisoned");
        if let Some(store) = guard.stores.get_mut(&storage_name) {
            store.insert(key, normalized);
        }
        updated += 1;
    }

    debug!(table, updated, "memory backend update");
    Ok(updated)
}

pub async fn do_delete(
    schema: &Schema,
    state: &Mutex<MemoryState>,
    table: &str,
    predicate: Predicate,
) -> Result<usize> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let pk_name = t.primary_key().name.clone();

    let candidates: Vec<(PkKey, mistfall_core::Value)> = {
        let guard = state.lock().expect("memory state mutex poisoned");
        match guard.stores.get(&storage_name) {
            Some(store) => store
                .iter()
                .filter(|(_, row)| predicate(row))
                .map(|(key, row)| (key.clone(), row[&pk_name].clone()))
                .collect(),
            None => Vec::new(),
        }
    };

    // Restrict-on-delete: check every candidate before removing any, so a
    // blocked delete leaves the store untouched rather than partially
    // applied.
    for (_, pk_value) in &candidates {
        for (dependent_table, dependent_column) in schema.reverse_dependencies(table) {
            let dependent_storage = schema.storage_name(dependent_table);
            let referenced = {
                let guard = state.lock().expect("memory state mutex poisoned");
                guard
                    .stores
                    .get(&dependent_storage)
                    .map(|store| {
                        store
                            .values()
                            .any(|row| row.get(dependent_column) == Some(pk_value))
                    })
                    .unwrap_or(false)
            };
            if referenced {
                return Err(RuntimeError::RestrictDeletionViolation {
                    table: table.to_string(),
                    dependent_table: dependent_table.clone(),
                    dependent_column: dependent_column.clone(),
                });
            }
        }
    }

    let mut guard = state.lock().expect("memory state mutex poisoned");
    let store = guard.stores.entry(storage_name).or_default();
    for (key, _) in &candidates {
        store.shift_remove(key);
    }
    drop(guard);

    debug!(table, deleted = candidates.len(), "memory backend delete");
    Ok(candidates.len())
}
