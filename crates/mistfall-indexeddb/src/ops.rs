//! Shared CRUD logic used by both [`crate::IndexedDbBackend`] (implicit,
//! per-operation transactions) and [`crate::IndexedDbSession`] (calls made
//! inside a `transaction` body) -- the IndexedDB-backed mirror of
//! `mistfall-memory::ops`, operating against one already-open engine
//! transaction's object stores instead of an in-process mutex map.

use indexed_db_futures::transaction::Transaction;
use mistfall_core::{Predicate, QueryOptions, Row, Schema, Table, evaluate};
use mistfall_runtime::{NormalizationContext, Result, RuntimeError, normalize_insert, normalize_update};
use tracing::debug;

use crate::context::IndexedDbContext;
use crate::error::{describe_js_error, IndexedDbError};

fn require_table<'a>(schema: &'a Schema, table: &str) -> Result<&'a Table> {
    schema
        .table(table)
        .ok_or_else(|| RuntimeError::UnknownTable(table.to_string()))
}

fn store_err(store: &str, e: wasm_bindgen::JsValue) -> RuntimeError {
    RuntimeError::from(IndexedDbError::Request { store: store.to_string(), message: describe_js_error(&e) })
}

async fn all_rows(tx: &Transaction, storage_name: &str) -> Result<Vec<Row>> {
    let store = tx
        .object_store(storage_name)
        .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))?;
    store.get_all().await.map_err(|e| store_err(storage_name, e))
}

pub async fn do_insert(
    schema: &Schema,
    tx: &Transaction,
    table: &str,
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let ctx = IndexedDbContext { schema, tx };

    let store = tx
        .object_store(&storage_name)
        .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let normalized = normalize_insert(t, row, &ctx).await?;

        // `add` (as opposed to `put`) rejects a colliding primary key with
        // a `ConstraintError`, giving us the primary-key-violation case
        // without a separate existence check.
        store.add(&normalized).await.map_err(|e| {
            let message = describe_js_error(&e);
            if message.to_lowercase().contains("constraint") {
                RuntimeError::PrimaryKeyViolation { table: table.to_string(), key: message }
            } else {
                store_err(&storage_name, e)
            }
        })?;

        results.push(normalized);
    }

    debug!(table, inserted = results.len(), "indexeddb backend insert");
    Ok(results)
}

pub async fn do_select(
    schema: &Schema,
    tx: &Transaction,
    table: &str,
    options: QueryOptions,
) -> Result<Vec<Row>> {
    require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let rows = all_rows(tx, &storage_name).await?;
    Ok(evaluate(&rows, &options))
}

pub async fn do_update(
    schema: &Schema,
    tx: &Transaction,
    table: &str,
    predicate: Predicate,
    patch: Row,
) -> Result<usize> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let ctx = IndexedDbContext { schema, tx };

    let store = tx
        .object_store(&storage_name)
        .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))?;

    let matching: Vec<Row> = all_rows(tx, &storage_name)
        .await?
        .into_iter()
        .filter(|row| predicate(row))
        .collect();

    let mut updated = 0;
    for existing in matching {
        let normalized = normalize_update(t, &existing, patch.clone(), &ctx).await?;
        store.put(&normalized).await.map_err(|e| store_err(&storage_name, e))?;
        updated += 1;
    }

    debug!(table, updated, "indexeddb backend update");
    Ok(updated)
}

pub async fn do_delete(
    schema: &Schema,
    tx: &Transaction,
    table: &str,
    predicate: Predicate,
) -> Result<usize> {
    let t = require_table(schema, table)?;
    let storage_name = schema.storage_name(table);
    let pk_name = t.primary_key().name.clone();

    let candidates: Vec<Row> = all_rows(tx, &storage_name)
        .await?
        .into_iter()
        .filter(|row| predicate(row))
        .collect();

    // Restrict-on-delete: check every candidate against every dependent
    // store before removing any, so a blocked delete leaves the store
    // untouched.
    for candidate in &candidates {
        let pk_value = &candidate[&pk_name];
        for (dependent_table, dependent_column) in schema.reverse_dependencies(table) {
            let dependent_storage = schema.storage_name(dependent_table);
            let dependent_rows = all_rows(tx, &dependent_storage).await?;
            let referenced = dependent_rows
                .iter()
                .any(|row| row.get(dependent_column) == Some(pk_value));
            if referenced {
                return Err(RuntimeError::RestrictDeletionViolation {
                    table: table.to_string(),
                    dependent_table: dependent_table.clone(),
                    dependent_column: dependent_column.clone(),
                });
            }
        }
    }

    let store = tx
        .object_store(&storage_name)
        .map_err(|e| RuntimeError::Backend(IndexedDbError::Transaction(describe_js_error(&e)).to_string()))?;
    for candidate in &candidates {
        store
            .delete(&candidate[&pk_name])
            .await
            .map_err(|e| store_err(&storage_name, e))?;
    }

    debug!(table, deleted = candidates.len(), "indexeddb backend delete");
    Ok(candidates.len())
}
