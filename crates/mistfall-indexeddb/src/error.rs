//! Errors specific to the IndexedDB adapter: everything upstream of
//! `mistfall-runtime`'s own "backend error" variant -- failures to open
//! the database, build a transaction, or decode a stored JS value.
//!
//! `JsValue` is not `Send`/`Sync`, which is fine here: the persistent
//! backend only ever runs on a single-threaded wasm target, and the
//! `Backend`/`Session`/`NormalizationContext` seam this crate implements
//! was declared `?Send` for exactly this reason.

use wasm_bindgen::{JsCast, JsValue};

/// Errors raised by the IndexedDB adapter before a failure is folded into
/// [`mistfall_runtime::RuntimeError`].
#[derive(Debug, thiserror::Error)]
pub enum IndexedDbError {
    /// Opening the database, or running its upgrade transaction, failed.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Building or committing an engine transaction failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A get/put/delete/cursor request against an object store failed.
    #[error("request error on store {store}: {message}")]
    Request {
        /// The object store the request targeted.
        store: String,
        /// The engine-reported failure.
        message: String,
    },

    /// A stored JS value did not decode into a [`mistfall_core::Row`].
    #[error("failed to decode row from store {store}: {message}")]
    Decode {
        /// The object store the value came from.
        store: String,
        /// The decode failure.
        message: String,
    },

    /// A row did not encode into a JS value cleanly (should not happen for
    /// well-formed `serde_json::Value` rows, but the conversion is
    /// fallible so it is surfaced rather than unwrapped).
    #[error("failed to encode row for store {store}: {message}")]
    Encode {
        /// The object store the value was destined for.
        store: String,
        /// The encode failure.
        message: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Renders a `JsValue` thrown by a DOM/IndexedDB API into a readable
/// string, preferring a `DOMException`'s name/message over the opaque
/// `Debug` formatting of an arbitrary JS value.
pub fn describe_js_error(value: &JsValue) -> String {
    if let Some(exception) = value.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    if let Some(s) = value.as_string() {
        return s;
    }
    format!("{value:?}")
}

impl From<IndexedDbError> for mistfall_runtime::RuntimeError {
    fn from(err: IndexedDbError) -> Self {
        mistfall_runtime::RuntimeError::Backend(err.to_string())
    }
}
