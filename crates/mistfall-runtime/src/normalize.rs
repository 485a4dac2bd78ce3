//! The normalization pipeline: the adapter-agnostic core every write
//! funnels through, parameterized over a backend-supplied
//! [`NormalizationContext`] so that identity allocation and foreign-key
//! lookups can be implemented differently by the memory and persistent
//! backends while the rule-checking logic itself is written once.

use async_trait::async_trait;
use mistfall_core::{Column, IndexSource, Row, Table, Value};
use tracing::trace;

use crate::error::{Result, RuntimeError};

/// Backend-supplied identity allocation and foreign-key existence lookup.
///
/// Implemented once per backend (`mistfall-memory`, `mistfall-indexeddb`);
/// the normalization functions below are generic over `&dyn
/// NormalizationContext` and contain no backend-specific code. Declared
/// `?Send` for the same reason as [`crate::Backend`]/[`crate::Session`]:
/// the persistent backend's context wraps non-`Send` JS handles.
#[async_trait(?Send)]
pub trait NormalizationContext {
    /// Allocates the next identity value for `table`.
    async fn allocate_identity(&self, table: &str) -> Result<Value>;

    /// Confirms a row exists in `target_table` with primary key `value`.
    /// A no-op when `value` is absent or null -- only a *present*
    /// reference is checked for existence.
    async fn ensure_foreign_key(
        &self,
        source_table: &str,
        source_column: &str,
        target_table: &str,
        target_column: &str,
        value: &Value,
    ) -> Result<()>;
}

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn apply_computed_indexes(table: &Table, row: &mut Row) {
    for index in &table.indexes {
        if let IndexSource::Computed { field, expression } = &index.source {
            let key = expression(row);
            row.insert(field.clone(), key);
        }
    }
}

async fn check_foreign_keys(
    table: &Table,
    row: &Row,
    ctx: &dyn NormalizationContext,
) -> Result<()> {
    for column in &table.columns {
        let Some(fk) = &column.foreign_key else {
            continue;
        };
        let value = row.get(&column.name);
        if is_absent(value) {
            continue;
        }
        ctx.ensure_foreign_key(
            &table.name,
            &column.name,
            &fk.target_table,
            &fk.target_column,
            value.unwrap(),
        )
        .await?;
    }
    Ok(())
}

fn check_not_null(table: &Table, row: &Row, column: &Column) -> Result<()> {
    if column.not_null && is_absent(row.get(&column.name)) {
        return Err(RuntimeError::NotNullViolation {
            table: table.name.clone(),
            column: column.name.clone(),
        });
    }
    Ok(())
}

/// Insert normalization: applies defaults, identity allocation,
/// not-null enforcement, foreign-key checks, and computed indexes to a
/// caller-supplied row.
pub async fn normalize_insert(
    table: &Table,
    row: Row,
    ctx: &dyn NormalizationContext,
) -> Result<Row> {
    let mut row = row;

    for column in &table.columns {
        if !row.contains_key(&column.name) {
            if column.identity {
                let id = ctx.allocate_identity(&table.name).await?;
                row.insert(column.name.clone(), id);
            } else if let Some(default_fn) = &column.default_fn {
                row.insert(column.name.clone(), default_fn());
            } else if let Some(default_value) = &column.default_value {
                row.insert(column.name.clone(), default_value.clone());
            }
        }
        check_not_null(table, &row, column)?;
    }

    check_foreign_keys(table, &row, ctx).await?;
    apply_computed_indexes(table, &mut row);

    trace!(table = %table.name, "normalized insert row");
    Ok(row)
}

/// Update normalization: merges a patch onto an existing row,
/// applies `onUpdate` hooks for columns the patch did not explicitly set,
/// then re-runs the not-null, foreign-key, and computed-index checks.
///
/// `patch` is passed as a [`Row`] -- its key *presence* (not its value) is
/// what determines whether a column was "explicitly set", so an explicit
/// `null` still counts as set and suppresses the `onUpdate` hook.
pub async fn normalize_update(
    table: &Table,
    existing: &Row,
    patch: Row,
    ctx: &dyn NormalizationContext,
) -> Result<Row> {
    let mut merged = existing.clone();
    for (key, value) in patch.iter() {
        merged.insert(key.clone(), value.clone());
    }

    for column in &table.columns {
        if !patch.contains_key(&column.name) {
            if let Some(on_update) = &column.on_update_fn {
                let previous = existing.get(&column.name).cloned().unwrap_or(Value::Null);
                merged.insert(column.name.clone(), on_update(&previous));
            }
        }
        check_not_null(table, &merged, column)?;
    }

    check_foreign_keys(table, &merged, ctx).await?;
    apply_computed_indexes(table, &mut merged);

    trace!(table = %table.name, "normalized update row");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mistfall_core::{ColumnKind, OnDelete, Schema, SchemaOptions};
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct TestCtx {
        next_id: AtomicI64,
        existing_keys: Vec<i64>,
    }

    #[async_trait(?Send)]
    impl NormalizationContext for TestCtx {
        async fn allocate_identity(&self, _table: &str) -> Result<Value> {
            Ok(json!(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        }

        async fn ensure_foreign_key(
            &self,
            table: &str,
            column: &str,
            target_table: &str,
            target_column: &str,
            value: &Value,
        ) -> Result<()> {
            let key = value.as_i64().unwrap_or(-1);
            if self.existing_keys.contains(&key) {
                Ok(())
            } else {
                Err(RuntimeError::ForeignKeyViolation {
                    table: table.to_string(),
                    column: column.to_string(),
                    target_table: target_table.to_string(),
                    target_column: target_column.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }

    fn todos_schema() -> Schema {
        let users = mistfall_core::Table::new("users")
            .column(mistfall_core::Column::new("id", ColumnKind::Integer).primary_key().identity());
        let todos = mistfall_core::Table::new("todos")
            .column(mistfall_core::Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(mistfall_core::Column::new("title", ColumnKind::UnboundedString).not_null())
            .column(
                mistfall_core::Column::new("owner_id", ColumnKind::Integer)
                    .not_null()
                    .references("users", "id", OnDelete::Restrict),
            )
            .column(
                mistfall_core::Column::new("updated_at", ColumnKind::Integer)
                    .default_fn(|| json!(100))
                    .on_update(|prev| json!(prev.as_i64().unwrap_or(0) + 1)),
            );
        Schema::build(SchemaOptions::new("app"), vec![users, todos]).unwrap()
    }

    fn ctx(existing_keys: Vec<i64>) -> TestCtx {
        TestCtx {
            next_id: AtomicI64::new(0),
            existing_keys,
        }
    }

    #[tokio::test]
    async fn insert_allocates_identity_and_default() {
        let schema = todos_schema();
        let todos = schema.table("todos").unwrap();
        let mut row = Row::new();
        row.insert("title".into(), json!("t"));
        row.insert("owner_id".into(), json!(1));

        let ctx = ctx(vec![1]);
        let result = normalize_insert(todos, row, &ctx).await.unwrap();
        assert_eq!(result["id"], json!(1));
        assert_eq!(result["updated_at"], json!(100));
    }

    #[tokio::test]
    async fn insert_rejects_missing_foreign_key() {
        let schema = todos_schema();
        let todos = schema.table("todos").unwrap();
        let mut row = Row::new();
        row.insert("title".into(), json!("t"));
        row.insert("owner_id".into(), json!(99));

        let ctx = ctx(vec![1]);
        let err = normalize_insert(todos, row, &ctx).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn insert_rejects_missing_not_null() {
        let schema = todos_schema();
        let todos = schema.table("todos").unwrap();
        let mut row = Row::new();
        row.insert("owner_id".into(), json!(1));
        // title omitted, and has no default.

        let ctx = ctx(vec![1]);
        let err = normalize_insert(todos, row, &ctx).await.unwrap_err();
        assert!(matches!(err, RuntimeError::NotNullViolation { column, .. } if column == "title"));
    }

    #[tokio::test]
    async fn update_runs_on_update_hook_unless_explicit() {
        let schema = todos_schema();
        let todos = schema.table("todos").unwrap();
        let mut existing = Row::new();
        existing.insert("id".into(), json!(1));
        existing.insert("title".into(), json!("t"));
        existing.insert("owner_id".into(), json!(1));
        existing.insert("updated_at".into(), json!(100));

        let mut patch = Row::new();
        patch.insert("title".into(), json!("q"));

        let ctx = ctx(vec![1]);
        let result = normalize_update(todos, &existing, patch, &ctx).await.unwrap();
        assert_eq!(result["updated_at"], json!(101));

        let mut explicit_patch = Row::new();
        explicit_patch.insert("updated_at".into(), json!(555));
        let result2 = normalize_update(todos, &existing, explicit_patch, &ctx).await.unwrap();
        assert_eq!(result2["updated_at"], json!(555));
    }

    #[tokio::test]
    async fn update_does_not_reallocate_identity() {
        let schema = todos_schema();
        let todos = schema.table("todos").unwrap();
        let mut existing = Row::new();
        existing.insert("id".into(), json!(7));
        existing.insert("title".into(), json!("t"));
        existing.insert("owner_id".into(), json!(1));

        let ctx = ctx(vec![1]);
        let result = normalize_update(todos, &existing, Row::new(), &ctx).await.unwrap();
        assert_eq!(result["id"], json!(7));
    }
}
