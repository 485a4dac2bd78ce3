//! The upgrade planner: opens the database at the schema's version
//! and, when the engine reports the stored version is older (or the
//! database is new), creates the reserved `__meta`/`__seq` stores, every
//! table's store, and every declared index, then records a schema
//! signature + timestamp into `__meta`.
//!
//! Mirrors how `beads-storage::sqlite::store` drives its own
//! `init_schema`/`run_migrations_on_conn` pair on open (version check,
//! idempotent DDL, then a metadata write) -- translated from SQL DDL
//! statements to IndexedDB's `createObjectStore`/`createIndex` calls,
//! which can only run inside the engine's own `upgradeneeded` transaction.

use std::cell::Cell;
use std::rc::Rc;

use indexed_db_futures::database::Database;
use indexed_db_futures::error::OpenDbError;
use indexed_db_futures::prelude::*;
use indexed_db_futures::transaction::TransactionMode;
use mistfall_core::{IndexSource, Schema};
use tracing::{debug, info};

use crate::error::{describe_js_error, IndexedDbError, Result};
use crate::scope::{META_STORE, SEQ_STORE};

/// Opens (and, if needed, upgrades) the IndexedDB database backing
/// `schema`. Returns the open handle; the caller is responsible for
/// writing the `__meta` "schema" record when `run()` reports an upgrade
/// ran, since that write happens in an ordinary post-open transaction
/// rather than inside the browser's version-change transaction (see
/// DESIGN.md for why).
pub async fn open(schema: &Schema, db_name: &str) -> Result<(Database, bool)> {
    let ran_upgrade = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran_upgrade);
    let plan_schema = schema.clone();

    info!(db = db_name, version = schema.version, "opening indexeddb database");

    let db = Database::open(db_name)
        .with_version(schema.version)
        .with_on_upgrade_needed(move |event, db| {
            flag.set(true);
            debug!(
                old_version = event.old_version(),
                new_version = event.new_version(),
                "running upgrade planner"
            );
            plan(&plan_schema, db)
        })
        .await
        .map_err(describe_open_error)?;

    Ok((db, ran_upgrade.get()))
}

fn describe_open_error(err: OpenDbError) -> IndexedDbError {
    IndexedDbError::Open(err.to_string())
}

/// Creates every store and index the schema declares, skipping anything
/// the database already has (so a re-run on an already-upgraded database,
/// or a version bump that only adds new tables, is a no-op for existing
/// ones).
fn plan(schema: &Schema, db: &Database) -> std::result::Result<(), wasm_bindgen::JsValue> {
    let existing: std::collections::HashSet<String> = db.object_store_names().collect();

    if !existing.contains(META_STORE) {
        db.create_object_store(META_STORE).with_key_path("key").build()?;
    }
    if !existing.contains(SEQ_STORE) {
        db.create_object_store(SEQ_STORE).with_key_path("table").build()?;
    }

    for table in &schema.tables {
        let storage_name = schema.storage_name(&table.name);
        let pk = table.primary_key().name.clone();

        let store = if existing.contains(&storage_name) {
            db.object_store(&storage_name)
                .map_err(|e| wasm_bindgen::JsValue::from_str(&describe_js_error(&e.into())))?
        } else {
            db.create_object_store(&storage_name)
                .with_key_path(pk.as_str())
                .build()?
        };

        let existing_indexes: std::collections::HashSet<String> =
            store.index_names().collect();

        for index in &table.indexes {
            if existing_indexes.contains(&index.name) {
                continue;
            }
            let key_path = match &index.source {
                IndexSource::Columns(cols) => match cols.first() {
                    Some(first) => first.clone(),
                    None => {
                        return Err(wasm_bindgen::JsValue::from_str(&format!(
                            "index {} on table {} names no source columns",
                            index.name, table.name
                        )))
                    }
                },
                IndexSource::Computed { field, .. } => field.clone(),
            };
            store
                .create_index(&index.name, key_path.as_str())
                .with_unique(index.unique)
                .build()?;
        }
    }

    Ok(())
}

/// Writes `{key: 'schema', version, signature, upgradedAt}` into `__meta`.
/// Run once, right after `open()` reports the upgrade planner actually
/// ran.
pub async fn write_meta_record(schema: &Schema, db: &Database) -> Result<()> {
    let tx = db
        .transaction(META_STORE)
        .with_mode(TransactionMode::Readwrite)
        .build()
        .map_err(|e| IndexedDbError::Transaction(describe_js_error(&e)))?;

    let store = tx
        .object_store(META_STORE)
        .map_err(|e| IndexedDbError::Transaction(describe_js_error(&e)))?;

    let record = serde_json::json!({
        "key": "schema",
        "version": schema.version,
        "signature": schema.signature(),
        "upgradedAt": chrono::Utc::now().to_rfc3339(),
    });

    store
        .put(&record)
        .await
        .map_err(|e| IndexedDbError::Request { store: META_STORE.into(), message: describe_js_error(&e) })?;

    tx.commit()
        .await
        .map_err(|e| IndexedDbError::Transaction(describe_js_error(&e)))?;

    info!(version = schema.version, signature = schema.signature(), "recorded schema upgrade");
    Ok(())
}
