//! The `Backend`/`Session` seam: the CRUD surface every adapter implements
//! identically, so that `mistfall-memory` and `mistfall-indexeddb` are
//! interchangeable from the caller's point of view.
//!
//! `Backend` is kept dyn-compatible -- no generics, no associated types --
//! so the facade crate can hold a `Box<dyn Backend>` for the non-session
//! CRUD surface and so shared scenario tests can run against either
//! concrete backend through one trait object. `Session` is the scoped
//! handle a `transaction` callback receives; each backend's session type is
//! concrete (the persistent backend's session is bound to one open engine
//! transaction, the memory backend's to one snapshot), so it is expressed
//! as a second, equally narrow trait rather than folded into `Backend`.
//!
//! Neither trait requires `Send`/`Sync`. Scheduling is single-threaded and
//! cooperative, with no thread-level parallelism, and the persistent
//! backend's handles (`web-sys` JS object wrappers) are not `Send` -- so
//! the seam both adapters share is declared with `#[async_trait(?Send)]`
//! (see DESIGN.md).

use async_trait::async_trait;
use mistfall_core::{Predicate, QueryOptions, Row, Schema};

use crate::error::Result;

/// The CRUD surface exposed outside an explicit transaction.
#[async_trait(?Send)]
pub trait Backend {
    /// The resolved schema this backend was opened against.
    fn schema(&self) -> &Schema;

    /// Inserts rows, normalizing each and returning the normalized,
    /// cloned copies.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;

    /// Evaluates a query over a table's full row set.
    async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>>;

    /// Applies a patch to every row matching `predicate`, returning the
    /// count updated.
    async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize>;

    /// Deletes every row matching `predicate` after a restrict-on-delete
    /// check, returning the count removed.
    async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize>;

    /// Releases any resources the backend holds (the persistent backend's
    /// engine database handle; a no-op for the memory backend).
    async fn close(&self) -> Result<()>;
}

/// The CRUD surface scoped to an open transaction.
///
/// Identical signatures to [`Backend`]'s, minus `close` -- a session never
/// owns backend lifecycle, only the transaction it was handed.
#[async_trait(?Send)]
pub trait Session {
    /// See [`Backend::insert`].
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;
    /// See [`Backend::select`].
    async fn select(&self, table: &str, options: QueryOptions) -> Result<Vec<Row>>;
    /// See [`Backend::update`].
    async fn update(&self, table: &str, predicate: Predicate, patch: Row) -> Result<usize>;
    /// See [`Backend::delete`].
    async fn delete(&self, table: &str, predicate: Predicate) -> Result<usize>;
}
