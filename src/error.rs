//! Error types for the synchronization layer.
//!
//! Every variant carries a human-readable message through `Display`, which is
//! what ends up in the store's `last_error`.

use thiserror::Error;

/// A request to the remote collection failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
  /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
  #[error("request to {collection} failed: {message}")]
  Transport {
    collection: &'static str,
    message: String,
  },

  /// The backend answered with an error status.
  #[error("{message}")]
  Rejected {
    status: u16,
    code: Option<String>,
    message: String,
  },

  #[error("{collection} record {id} not found")]
  NotFound { collection: &'static str, id: String },

  /// A compare-and-swap write found a different `updated_at` (or no row).
  #[error("{collection} record {id} was changed or removed since it was loaded")]
  Conflict { collection: &'static str, id: String },

  /// The response did not have the expected shape.
  #[error("unexpected response from {collection}: {message}")]
  Decode {
    collection: &'static str,
    message: String,
  },
}

/// A caller-side precondition failed; no request was issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("{0} is required")]
  Required(&'static str),

  #[error("{collection} record {id} is not loaded")]
  UnknownId { collection: &'static str, id: String },
}

/// Anything a store operation can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Remote(#[from] RemoteError),
}
