//! The memory backend: an in-process implementation of the client
//! contract, used for server-side rendering and tests so that application
//! code behaves identically whether or not a real store engine is present.

pub mod backend;
pub mod context;
pub mod ops;
pub mod session;
pub mod state;

pub use backend::MemoryBackend;
pub use context::MemoryContext;
pub use session::MemorySession;
pub use state::{MemoryState, PkKey};

#[cfg(test)]
mod tests {
    use super::*;
    use mistfall_core::{Column, ColumnKind, OnDelete, Order, Predicate, QueryOptions, Row, Schema, SchemaOptions, Table, predicate};
    use mistfall_runtime::{Backend, RuntimeError, Session};
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        let mut r = Row::new();
        for (k, v) in pairs {
            r.insert((*k).to_string(), v.clone());
        }
        r
    }

    fn users_todos_schema() -> Schema {
        let users = Table::new("users")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("name", ColumnKind::UnboundedString).not_null())
            .column(
                Column::new("role", ColumnKind::EnumString {
                    variants: vec!["a".into(), "b".into()],
                })
                .default_value(json!("a")),
            );
        let todos = Table::new("todos")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("title", ColumnKind::UnboundedString).not_null())
            .column(
                Column::new("owner_id", ColumnKind::Integer)
                    .not_null()
                    .references("users", "id", OnDelete::Restrict),
            );
        Schema::build(SchemaOptions::new("app"), vec![users, todos]).unwrap()
    }

    fn eq_id(id: i64) -> Predicate {
        predicate::eq("id", json!(id))
    }

    // -- Scenario 1: identity + default --------------------------------------

    #[tokio::test]
    async fn scenario_identity_and_default() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);

        backend.insert("users", vec![row(&[("name", json!("x"))])]).await.unwrap();
        backend.insert("users", vec![row(&[("name", json!("y"))])]).await.unwrap();

        let rows = backend
            .select("users", QueryOptions::all().order_by("id"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("x"));
        assert_eq!(rows[0]["role"], json!("a"));
        assert_eq!(rows[1]["id"], json!(2));
        assert_eq!(rows[1]["name"], json!("y"));
    }

    // -- Scenario 2: foreign-key enforcement ----------------------------------

    #[tokio::test]
    async fn scenario_foreign_key_enforcement() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);

        let inserted = backend
            .insert("users", vec![row(&[("name", json!("alice"))])])
            .await
            .unwrap();
        assert_eq!(inserted[0]["id"], json!(1));

        backend
            .insert(
                "todos",
                vec![row(&[("title", json!("t")), ("owner_id", json!(1))])],
            )
            .await
            .unwrap();

        let err = backend
            .insert(
                "todos",
                vec![row(&[("title", json!("t2")), ("owner_id", json!(2))])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ForeignKeyViolation { .. }));
    }

    // -- Scenario 3: restrict delete -------------------------------------------

    #[tokio::test]
    async fn scenario_restrict_delete() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);

        backend.insert("users", vec![row(&[("name", json!("alice"))])]).await.unwrap();
        backend
            .insert("todos", vec![row(&[("title", json!("t")), ("owner_id", json!(1))])])
            .await
            .unwrap();

        let err = backend.delete("users", eq_id(1)).await.unwrap_err();
        assert!(matches!(err, RuntimeError::RestrictDeletionViolation { .. }));

        let users = backend.select("users", QueryOptions::all()).await.unwrap();
        let todos = backend.select("todos", QueryOptions::all()).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(todos.len(), 1);
    }

    // -- Scenario 4: transaction rollback ---------------------------------------

    #[tokio::test]
    async fn scenario_transaction_rollback() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);

        let result: Result<(), RuntimeError> = backend
            .transaction(&["users", "todos"], |session| async move {
                session.insert("users", vec![row(&[("name", json!("alice"))])]).await?;
                session
                    .insert("todos", vec![row(&[("title", json!("t")), ("owner_id", json!(1))])])
                    .await?;
                Err(RuntimeError::Backend("forced failure".into()))
            })
            .await;
        assert!(result.is_err());

        let users = backend.select("users", QueryOptions::all()).await.unwrap();
        let todos = backend.select("todos", QueryOptions::all()).await.unwrap();
        assert!(users.is_empty());
        assert!(todos.is_empty());

        // Identity counter was rolled back too.
        let inserted = backend.insert("users", vec![row(&[("name", json!("bob"))])]).await.unwrap();
        assert_eq!(inserted[0]["id"], json!(1));
    }

    // -- Scenario 5: onUpdate hook ------------------------------------------------

    #[tokio::test]
    async fn scenario_on_update_hook() {
        let table = Table::new("items")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("name", ColumnKind::UnboundedString).not_null())
            .column(
                Column::new("updated_at", ColumnKind::Integer)
                    .default_fn(|| json!(100))
                    .on_update(|prev| json!(prev.as_i64().unwrap_or(0) + 1)),
            );
        let schema = Schema::build(SchemaOptions::new("app"), vec![table]).unwrap();
        let backend = MemoryBackend::open(schema);

        let inserted = backend.insert("items", vec![row(&[("name", json!("a"))])]).await.unwrap();
        assert_eq!(inserted[0]["updated_at"], json!(100));

        backend
            .update("items", eq_id(1), row(&[("name", json!("q"))]))
            .await
            .unwrap();
        let rows = backend.select("items", QueryOptions::all()).await.unwrap();
        assert_eq!(rows[0]["updated_at"], json!(101));

        backend
            .update("items", eq_id(1), row(&[("updated_at", json!(555))]))
            .await
            .unwrap();
        let rows = backend.select("items", QueryOptions::all()).await.unwrap();
        assert_eq!(rows[0]["updated_at"], json!(555));
    }

    // -- Scenario 6: query options ------------------------------------------------

    #[tokio::test]
    async fn scenario_query_options() {
        let table = Table::new("items")
            .column(Column::new("id", ColumnKind::Integer).primary_key())
            .column(Column::new("v", ColumnKind::Integer).not_null());
        let schema = Schema::build(SchemaOptions::new("app"), vec![table]).unwrap();
        let backend = MemoryBackend::open(schema);

        for id in 1..=5 {
            backend
                .insert("items", vec![row(&[("id", json!(id)), ("v", json!(id % 3))])])
                .await
                .unwrap();
        }

        let rows = backend
            .select(
                "items",
                QueryOptions::all()
                    .r#where(predicate::eq("v", json!(1)))
                    .order_by("id")
                    .order(Order::Desc)
                    .offset(1)
                    .limit(1),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
    }

    // -- Invariant: identities strictly increase across inserts --------------

    #[tokio::test]
    async fn identities_strictly_increase() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);
        let mut last = 0;
        for i in 0..10 {
            let inserted = backend
                .insert("users", vec![row(&[("name", json!(format!("u{i}")))])])
                .await
                .unwrap();
            let id = inserted[0]["id"].as_i64().unwrap();
            assert!(id > last);
            last = id;
        }
    }

    // -- Invariant: primary key collisions are rejected -----------------------

    #[tokio::test]
    async fn primary_key_collision_rejected() {
        let table = Table::new("items").column(Column::new("id", ColumnKind::Integer).primary_key());
        let schema = Schema::build(SchemaOptions::new("app"), vec![table]).unwrap();
        let backend = MemoryBackend::open(schema);

        backend.insert("items", vec![row(&[("id", json!(1))])]).await.unwrap();
        let err = backend.insert("items", vec![row(&[("id", json!(1))])]).await.unwrap_err();
        assert!(matches!(err, RuntimeError::PrimaryKeyViolation { .. }));
    }

    #[tokio::test]
    async fn empty_transaction_is_rejected() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);
        let result: Result<(), RuntimeError> = backend
            .transaction(&[], |_session| async move { Ok(()) })
            .await;
        assert!(matches!(result, Err(RuntimeError::EmptyTransaction)));
    }

    #[tokio::test]
    async fn transaction_commit_keeps_state() {
        let schema = users_todos_schema();
        let backend = MemoryBackend::open(schema);
        backend
            .transaction(&["users"], |session| async move {
                session.insert("users", vec![row(&[("name", json!("alice"))])]).await?;
                Ok::<_, RuntimeError>(())
            })
            .await
            .unwrap();

        let users = backend.select("users", QueryOptions::all()).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
