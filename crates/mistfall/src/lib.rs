//! The client facade: `connect()`, backend selection, and the
//! `insert`/`select`/`update`/
//! `delete`/`transaction`/`close` surface that every application built on
//! this runtime depends on directly.
//!
//! Everything here is thin routing. The hard engineering -- normalization,
//! constraint enforcement, transaction scoping -- lives in
//! `mistfall-runtime` and the two backend crates; this crate only picks
//! which backend a [`Client`] talks to and forwards calls to it, wrapping
//! up the non-session and session CRUD surfaces behind one matching enum
//! so callers never see which backend they are on.

use std::fmt;

use mistfall_runtime::{Backend, Session};
use tracing::info;

pub use mistfall_core::{
    Column, ColumnKind, ForeignKey, Index, IndexSource, OnDelete, Order, OrderBy, Predicate,
    QueryOptions, Row, Schema, SchemaOptions, Table, UnresolvedReference, Value, clone_row,
    predicate,
};
pub use mistfall_runtime::{Result, RuntimeError};

/// Which adapter a [`connect`] call selected, or should select.
///
/// The client contract only exposes `'auto'` and `'memory'` at the
/// options surface -- there is no way to *ask* for the persistent backend
/// explicitly, since whether one is available is a property of the host,
/// not a caller decision. `'auto'` uses it when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adapter {
    /// Use the persistent backend when the host exposes one, else memory.
    #[default]
    Auto,
    /// Always use the in-process memory adapter.
    Memory,
}

/// Options accepted by [`connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Database name; defaults to the schema's own name.
    pub db_name: Option<String>,
    /// Adapter selection; defaults to [`Adapter::Auto`].
    pub adapter: Adapter,
}

impl ConnectOptions {
    /// Default options: auto-selected adapter, schema name as db name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the database name.
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Overrides the adapter selection.
    pub fn adapter(mut self, adapter: Adapter) -> Self {
        self.adapter = adapter;
        self
    }
}

/// Which backend a connected [`Client`] ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// The browser-native IndexedDB facility.
    Persistent,
    /// The in-process memory adapter.
    Memory,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Persistent => f.write_str("persistent"),
            ClientKind::Memory => f.write_str("memory"),
        }
    }
}

enum BackendHandle {
    Memory(mistfall_memory::MemoryBackend),
    #[cfg(target_arch = "wasm32")]
    Persistent(mistfall_indexeddb::IndexedDbBackend),
}

/// A scoped handle passed to a [`Client::transaction`] callback.
///
/// Wraps whichever backend's native session type `connect` selected behind
/// one CRUD surface, so callers write one `async move { ... }` body
/// regardless of adapter. Off a `wasm32` target the persistent variant
/// does not exist, so the lifetime parameter is carried by a private,
/// never-constructed marker instead -- kept so the public signature does
/// not change shape across targets.
#[cfg(target_arch = "wasm32")]
pub enum SessionHandle<'a> {
    /// See [`mistfall_memory::MemorySession`].
    Memory(mistfall_memory::MemorySession),
    /// See [`mistfall_indexeddb::IndexedDbSession`].
    Persistent(mistfall_indexeddb::IndexedDbSession<'a>),
}

/// See the `wasm32` definition above; this target has no persistent
/// backend to wrap.
#[cfg(not(target_arch = "wasm32"))]
pub enum SessionHandle<'a> {
    /// See [`mistfall_memory::MemorySession`].
    Memory(mistfall_memory::MemorySession),
    #[doc(hidden)]
    _Marker(std::marker::PhantomData<&'a ()>),
}

impl SessionHandle<'_> {
    /// Inserts rows, normalizing each and returning the normalized, cloned
    /// copies.
    pub async fn insert(&self, table: &str, rows: impl IntoRows) -> Result<Vec<Row>> {
        match self {
            SessionHandle::Memory(s) => s.insert(table, rows.into_rows()).await,
            #[cfg(target_arch = "wasm32")]
            SessionHandle::Persistent(s) => s.insert(table, rows.into_rows()).await,
            #[cfg(not(target_arch = "wasm32"))]
            SessionHandle::_Marker(_) => unreachable!("never constructed off wasm32"),
        }
    }

    /// Evaluates a query over a table's full row set.
    pub async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>> {
        match self {
            SessionHandle::Memory(s) => s.select(table, options).await,
            #[cfg(target_arch = "wasm32")]
            SessionHandle::Persistent(s) => s.select(table, options).await,
            #[cfg(not(target_arch = "wasm32"))]
            SessionHandle::_Marker(_) => unreachable!("never constructed off wasm32"),
        }
    }

    /// Applies `patch` to every row matching `predicate`, returning the
    /// count updated.
    pub async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize> {
        match self {
            SessionHandle::Memory(s) => s.update(table, predicate, patch).await,
            #[cfg(target_arch = "wasm32")]
            SessionHandle::Persistent(s) => s.update(table, predicate, patch).await,
            #[cfg(not(target_arch = "wasm32"))]
            SessionHandle::_Marker(_) => unreachable!("never constructed off wasm32"),
        }
    }

    /// Deletes every row matching `predicate` after a restrict-on-delete
    /// check, returning the count removed.
    pub async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize> {
        match self {
            SessionHandle::Memory(s) => s.delete(table, predicate).await,
            #[cfg(target_arch = "wasm32")]
            SessionHandle::Persistent(s) => s.delete(table, predicate).await,
            #[cfg(not(target_arch = "wasm32"))]
            SessionHandle::_Marker(_) => unreachable!("never constructed off wasm32"),
        }
    }
}

/// Accepts either a single row or a row array at an `insert` call site;
/// a single object still returns an array of length 1.
pub trait IntoRows {
    /// Normalizes the call-site argument into a row vector.
    fn into_rows(self) -> Vec<Row>;
}

impl IntoRows for Row {
    fn into_rows(self) -> Vec<Row> {
        vec![self]
    }
}

impl IntoRows for Vec<Row> {
    fn into_rows(self) -> Vec<Row> {
        self
    }
}

/// A connected client: the single public entry point applications depend
/// on for CRUD and transactions against a resolved [`Schema`].
pub struct Client {
    schema: Schema,
    backend: BackendHandle,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("kind", &self.kind())
            .field("schema", &self.schema.name)
            .finish()
    }
}

impl Client {
    /// Which backend this client is talking to.
    pub fn kind(&self) -> ClientKind {
        match &self.backend {
            BackendHandle::Memory(_) => ClientKind::Memory,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(_) => ClientKind::Persistent,
        }
    }

    /// The resolved schema this client was opened against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Inserts one row or an array of rows, returning the normalized,
    /// cloned copies. Implicitly transactional: each row funnels through
    /// the normalization pipeline individually, but no snapshot/rollback
    /// beyond the pipeline's own checks is promised outside an explicit
    /// [`Client::transaction`].
    pub async fn insert(&self, table: &str, rows: impl IntoRows) -> Result<Vec<Row>> {
        match &self.backend {
            BackendHandle::Memory(b) => b.insert(table, rows.into_rows()).await,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => b.insert(table, rows.into_rows()).await,
        }
    }

    /// Evaluates `{where, orderBy, order, limit, offset}` against a
    /// table's full row set.
    pub async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>> {
        match &self.backend {
            BackendHandle::Memory(b) => b.select(table, options).await,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => b.select(table, options).await,
        }
    }

    /// Applies `patch` to every row matching `predicate`.
    pub async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize> {
        match &self.backend {
            BackendHandle::Memory(b) => b.update(table, predicate, patch).await,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => b.update(table, predicate, patch).await,
        }
    }

    /// Deletes every row matching `predicate`, after the restrict-on-delete
    /// check.
    pub async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize> {
        match &self.backend {
            BackendHandle::Memory(b) => b.delete(table, predicate).await,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => b.delete(table, predicate).await,
        }
    }

    /// Runs `session_fn` against a transaction scoped to `tables`. On any
    /// error returned from `session_fn`, the backend rolls
    /// back (memory: whole-state snapshot restore; persistent: native
    /// engine transaction abort) and the original error propagates.
    /// Fails immediately with [`RuntimeError::EmptyTransaction`] if
    /// `tables` is empty.
    pub async fn transaction<F, Fut, T>(&self, tables: &[&str], session_fn: F) -> Result<T>
    where
        F: FnOnce(SessionHandle<'_>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match &self.backend {
            BackendHandle::Memory(b) => {
                b.transaction(tables, |session| session_fn(SessionHandle::Memory(session))).await
            }
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => {
                b.transaction(tables, |session| session_fn(SessionHandle::Persistent(session))).await
            }
        }
    }

    /// Releases any resources the backend holds (the persistent backend's
    /// engine database handle; a no-op for the memory backend).
    pub async fn close(&self) -> Result<()> {
        match &self.backend {
            BackendHandle::Memory(b) => b.close().await,
            #[cfg(target_arch = "wasm32")]
            BackendHandle::Persistent(b) => b.close().await,
        }
    }
}

/// Connects a [`Client`] to `schema`.
///
/// `options.adapter`'s `Auto` selects the persistent backend on a
/// `wasm32` target (opening it, which may run the upgrade planner), and
/// falls back to the memory adapter everywhere else or when
/// `Adapter::Memory` is requested explicitly.
pub async fn connect(schema: Schema, options: ConnectOptions) -> Result<Client> {
    let db_name = options.db_name.clone().unwrap_or_else(|| schema.name.clone());

    #[cfg(target_arch = "wasm32")]
    {
        if !matches!(options.adapter, Adapter::Memory) {
            info!(db = %db_name, "connecting via the persistent (IndexedDB) backend");
            let backend = mistfall_indexeddb::IndexedDbBackend::open(schema.clone(), &db_name)
                .await
                .map_err(|e| RuntimeError::Backend(e.to_string()))?;
            return Ok(Client { schema, backend: BackendHandle::Persistent(backend) });
        }
    }

    info!(db = %db_name, "connecting via the in-process memory backend");
    let backend = mistfall_memory::MemoryBackend::open(schema.clone());
    Ok(Client { schema, backend: BackendHandle::Memory(backend) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mistfall_core::{ColumnKind, Order, Schema, SchemaOptions, Table, predicate};
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        let mut r = Row::new();
        for (k, v) in pairs {
            r.insert((*k).to_string(), v.clone());
        }
        r
    }

    fn users_schema() -> Schema {
        let users = Table::new("users")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("name", ColumnKind::UnboundedString).not_null());
        Schema::build(SchemaOptions::new("app"), vec![users]).unwrap()
    }

    #[tokio::test]
    async fn connect_defaults_to_memory_off_wasm() {
        let client = connect(users_schema(), ConnectOptions::new()).await.unwrap();
        assert_eq!(client.kind(), ClientKind::Memory);
    }

    #[tokio::test]
    async fn insert_accepts_single_row_and_array() {
        let client = connect(users_schema(), ConnectOptions::new()).await.unwrap();

        let single = client.insert("users", row(&[("name", json!("a"))])).await.unwrap();
        assert_eq!(single.len(), 1);

        let many = client
            .insert("users", vec![row(&[("name", json!("b"))]), row(&[("name", json!("c"))])])
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
    }

    #[tokio::test]
    async fn select_update_delete_round_trip() {
        let client = connect(users_schema(), ConnectOptions::new()).await.unwrap();
        client.insert("users", row(&[("name", json!("a"))])).await.unwrap();
        client.insert("users", row(&[("name", json!("b"))])).await.unwrap();

        let rows = client
            .select("users", QueryOptions::all().order_by("id").order(Order::Desc))
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], json!("b"));

        let updated = client
            .update("users", predicate::eq("id", json!(1)), row(&[("name", json!("z"))]))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let deleted = client.delete("users", predicate::eq("id", json!(2))).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = client.select("users", QueryOptions::all()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["name"], json!("z"));
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_session_error() {
        let client = connect(users_schema(), ConnectOptions::new()).await.unwrap();

        let result: Result<()> = client
            .transaction(&["users"], |session| async move {
                session.insert("users", row(&[("name", json!("a"))])).await?;
                Err(RuntimeError::Backend("forced failure".into()))
            })
            .await;
        assert!(result.is_err());

        let rows = client.select("users", QueryOptions::all()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_no_op_on_memory() {
        let client = connect(users_schema(), ConnectOptions::new()).await.unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
    }
}
