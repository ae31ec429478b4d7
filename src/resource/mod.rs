//! Generic CRUD synchronization against a remote collection.
//!
//! This module is collection-agnostic. It provides:
//! - [`Resource`], the compile-time schema of a remote record type
//! - [`ResourceClient`], which issues one request per operation and normalizes errors
//! - [`ResourceStore`], which keeps an ordered local mirror of the records it has seen
//! - [`StatusTracker`], the busy/last-error state shared by one store's operations

mod client;
mod status;
mod store;

pub use client::{DeletePolicy, ResourceClient};
pub use status::{Status, StatusTracker};
pub use store::{ResourceStore, StoreState};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ValidationError;

/// A record type stored in a remote collection.
///
/// Identifiers and timestamps are owned by the remote side: clients read them,
/// never set them.
pub trait Resource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Fields accepted when creating a record.
  type Draft: Serialize + Validate + Send + Sync;

  /// Fields accepted when updating a record. Absent fields must not be serialized.
  type Patch: FieldPatch;

  /// Name of the remote collection (table) holding these records.
  const COLLECTION: &'static str;

  fn id(&self) -> &str;

  fn created_at(&self) -> DateTime<Utc>;

  fn updated_at(&self) -> DateTime<Utc>;
}

/// Caller-side precondition check run before any request is issued.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError>;
}

/// A partial update: only the fields that are set get written.
pub trait FieldPatch: Serialize + Validate + Send + Sync {
  /// No field is set, so applying the patch changes nothing.
  fn is_empty(&self) -> bool;
}

/// Sort order requested from the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
  pub column: &'static str,
  pub descending: bool,
}

impl Order {
  /// Newest records first.
  pub const NEWEST_FIRST: Order = Order {
    column: "created_at",
    descending: true,
  };
}
