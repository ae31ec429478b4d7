//! Transports for remote collections.
//!
//! [`RemoteCollection`] is the narrow request/response contract the
//! synchronization layer relies on. Each method is exactly one round trip.

mod api_types;
mod memory;
mod rest;

pub use memory::{MemoryCollection, MemoryRecord};
pub use rest::RestCollection;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RemoteError;
use crate::resource::{Order, Resource};

/// A remote collection of `T` records.
#[async_trait]
pub trait RemoteCollection<T: Resource>: Send + Sync {
  /// Fetch every record in the given order.
  async fn select(&self, order: Order) -> Result<Vec<T>, RemoteError>;

  /// Create a record and return it with its server-assigned fields.
  async fn insert(&self, draft: &T::Draft) -> Result<T, RemoteError>;

  /// Merge `patch` into the record `id` and return the result.
  ///
  /// With `expected_updated_at`, the write only applies if the stored record
  /// still carries that timestamp; otherwise [`RemoteError::Conflict`].
  async fn update(
    &self,
    id: &str,
    patch: &T::Patch,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<T, RemoteError>;

  /// Delete the record `id`, returning how many rows were removed.
  async fn delete(
    &self,
    id: &str,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<usize, RemoteError>;
}
