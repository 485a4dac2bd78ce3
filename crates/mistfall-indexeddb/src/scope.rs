//! Store-set computation: both the per-operation transaction a
//! public write opens and the per-session transaction a `transaction(...)`
//! call opens are scoped to the smallest set of object stores that could
//! possibly be touched, rather than to every store in the database -- so
//! that identity allocation and foreign-key checks happen atomically with
//! the mutation without taking out a lock on unrelated tables.

use std::collections::BTreeSet;

use mistfall_core::Schema;

/// Reserved store holding the `{key: 'schema', version, signature,
/// upgradedAt}` record written by the upgrade planner.
pub const META_STORE: &str = "__meta";
/// Reserved store holding `{table, value}` identity-sequence records.
pub const SEQ_STORE: &str = "__seq";

/// What a call is about to do, for the purpose of deciding which stores it
/// touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A read-only `select`.
    Read,
    /// An `insert` or `update`.
    Write,
    /// A `delete`, which additionally needs every store that references
    /// the target table (to run the restrict-on-delete check).
    Delete,
}

/// The store set a single public `insert`/`select`/`update`/`delete` call
/// opens its transaction against.
pub fn operation_scope(schema: &Schema, table: &str, op: Operation) -> Vec<String> {
    if op == Operation::Read {
        return vec![schema.storage_name(table)];
    }

    let mut stores = BTreeSet::new();
    stores.insert(schema.storage_name(table));
    stores.insert(SEQ_STORE.to_string());

    if let Some(t) = schema.table(table) {
        for column in &t.columns {
            if let Some(fk) = &column.foreign_key {
                stores.insert(schema.storage_name(&fk.target_table));
            }
        }
    }

    if op == Operation::Delete {
        for (dependent_table, _) in schema.reverse_dependencies(table) {
            stores.insert(schema.storage_name(dependent_table));
        }
    }

    stores.into_iter().collect()
}

/// The store set a `transaction(tables, fn)` session opens: `__seq`, each
/// declared table's store, every store a
/// declared table references via an outgoing foreign key, and every store
/// that references a declared table via an incoming one (for potential
/// deletes inside the session).
pub fn session_scope(schema: &Schema, tables: &[&str]) -> Vec<String> {
    let mut stores = BTreeSet::new();
    stores.insert(SEQ_STORE.to_string());

    for &table in tables {
        stores.insert(schema.storage_name(table));

        if let Some(t) = schema.table(table) {
            for column in &t.columns {
                if let Some(fk) = &column.foreign_key {
                    stores.insert(schema.storage_name(&fk.target_table));
                }
            }
        }

        for (dependent_table, _) in schema.reverse_dependencies(table) {
            stores.insert(schema.storage_name(dependent_table));
        }
    }

    stores.into_iter().collect()
}
