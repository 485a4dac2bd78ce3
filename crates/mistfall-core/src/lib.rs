//! Schema model, reference resolution, and query evaluation for Mistfall.
//!
//! This crate holds everything that is pure data and pure computation: the
//! table/column/index descriptors a schema is built from, the pass that
//! resolves deferred foreign-key references into concrete metadata, and the
//! in-memory predicate/order/paginate evaluator shared by both backends. It
//! performs no I/O and knows nothing about either storage adapter.

pub mod error;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod value;

pub use error::{Result, SchemaError};
pub use predicate::Predicate;
pub use query::{Order, OrderBy, QueryOptions, evaluate};
pub use schema::{
    Column, ColumnKind, ForeignKey, Index, IndexSource, OnDelete, Schema, SchemaOptions, Table,
    UnresolvedReference,
};
pub use value::{Row, Value, clone_row};
