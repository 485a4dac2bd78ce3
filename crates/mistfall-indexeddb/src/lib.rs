//! The persistent backend: an implementation of the client contract on the
//! browser's IndexedDB facility, including the upgrade planner (additive,
//! version-driven schema evolution) and per-operation / per-session engine
//! transaction scoping.
//!
//! Compiles only for `wasm32` targets in practice -- `web-sys`'s DOM
//! bindings and `indexed_db_futures`'s `Database` handle are not available
//! off a browser-hosted wasm runtime -- but carries no `#[cfg(...)]` gates
//! of its own; the facade crate (`mistfall`) is what decides, at the
//! workspace level, whether this crate is even pulled in for a given
//! target.

pub mod backend;
pub mod context;
pub mod error;
pub mod ops;
pub mod scope;
pub mod session;
pub mod upgrade;

pub use backend::IndexedDbBackend;
pub use context::IndexedDbContext;
pub use error::IndexedDbError;
pub use session::IndexedDbSession;
