//! Typed CRUD client over a remote collection.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::marker::PhantomData;
use tracing::{debug, instrument, warn};

use crate::error::RemoteError;
use crate::remote::RemoteCollection;

use super::{Order, Resource};

/// What deleting an id that no longer exists means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
  /// Deleting a missing record succeeds.
  #[default]
  Idempotent,
  /// Deleting a missing record is a [`RemoteError::NotFound`].
  NotFound,
}

/// Issues CRUD operations for `T` against a remote collection.
///
/// Every call is exactly one request, never retried.
pub struct ResourceClient<T, R> {
  remote: R,
  delete_policy: DeletePolicy,
  _resource: PhantomData<fn() -> T>,
}

impl<T, R> ResourceClient<T, R>
where
  T: Resource,
  R: RemoteCollection<T>,
{
  pub fn new(remote: R) -> Self {
    Self {
      remote,
      delete_policy: DeletePolicy::default(),
      _resource: PhantomData,
    }
  }

  pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
    self.delete_policy = policy;
    self
  }

  /// The underlying transport.
  pub fn remote(&self) -> &R {
    &self.remote
  }

  /// All records, newest first.
  #[instrument(skip(self), fields(collection = T::COLLECTION))]
  pub async fn list(&self) -> Result<Vec<T>, RemoteError> {
    let mut records = self
      .remote
      .select(Order::NEWEST_FIRST)
      .await
      .inspect_err(|e| warn!("list failed: {}", e))?;

    // Stable, so records sharing a timestamp keep the backend's order.
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    debug!(count = records.len(), "listed");
    Ok(records)
  }

  /// Create a record. The draft is expected to be validated by the caller.
  #[instrument(skip_all, fields(collection = T::COLLECTION))]
  pub async fn create(&self, draft: &T::Draft) -> Result<T, RemoteError> {
    let record = self
      .remote
      .insert(draft)
      .await
      .inspect_err(|e| warn!("create failed: {}", e))?;

    debug!(id = record.id(), "created");
    Ok(record)
  }

  /// Merge `patch` into record `id`, whatever its current version.
  #[instrument(skip(self, patch), fields(collection = T::COLLECTION))]
  pub async fn update(&self, id: &str, patch: &T::Patch) -> Result<T, RemoteError> {
    self.write(id, patch, None).await
  }

  /// Merge `patch` into record `id` only if it is still at `expected_updated_at`.
  #[instrument(skip(self, patch), fields(collection = T::COLLECTION))]
  pub async fn update_if_unchanged(
    &self,
    id: &str,
    patch: &T::Patch,
    expected_updated_at: DateTime<Utc>,
  ) -> Result<T, RemoteError> {
    self.write(id, patch, Some(expected_updated_at)).await
  }

  async fn write(
    &self,
    id: &str,
    patch: &T::Patch,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<T, RemoteError> {
    let record = self
      .remote
      .update(id, patch, expected_updated_at)
      .await
      .inspect_err(|e| warn!("update failed: {}", e))?;

    debug!(updated_at = %record.updated_at(), "updated");
    Ok(record)
  }

  /// Delete record `id`. Returns `true` once the record is gone.
  #[instrument(skip(self), fields(collection = T::COLLECTION))]
  pub async fn delete(&self, id: &str) -> Result<bool, RemoteError> {
    self.remove(id, None).await
  }

  /// Delete record `id` only if it is still at `expected_updated_at`.
  #[instrument(skip(self), fields(collection = T::COLLECTION))]
  pub async fn delete_if_unchanged(
    &self,
    id: &str,
    expected_updated_at: DateTime<Utc>,
  ) -> Result<bool, RemoteError> {
    self.remove(id, Some(expected_updated_at)).await
  }

  async fn remove(
    &self,
    id: &str,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<bool, RemoteError> {
    let removed = self
      .remote
      .delete(id, expected_updated_at)
      .await
      .inspect_err(|e| warn!("delete failed: {}", e))?;

    if removed == 0 {
      match self.delete_policy {
        DeletePolicy::Idempotent => debug!("already absent"),
        DeletePolicy::NotFound => {
          return Err(RemoteError::NotFound {
            collection: T::COLLECTION,
            id: id.to_string(),
          })
        }
      }
    }

    Ok(true)
  }
}
