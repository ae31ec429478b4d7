//! In-process remote collection.
//!
//! Behaves like the hosted backend (server-assigned ids and timestamps,
//! compare-and-swap on `updated_at`) without any I/O. Used for tests and the
//! `--memory` mode of the command line.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::RemoteError;
use crate::resource::{FieldPatch, Order, Resource};

use super::RemoteCollection;

/// Records the in-process collection knows how to build and modify.
///
/// This is the server side of the schema: only a backend may assign ids and
/// timestamps.
pub trait MemoryRecord: Resource {
  fn from_draft(id: String, draft: &Self::Draft, now: DateTime<Utc>) -> Self;

  fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);
}

struct MemoryState<T> {
  rows: Vec<T>,
  next_id: u64,
  last_write: Option<DateTime<Utc>>,
  failures: VecDeque<RemoteError>,
}

impl<T> MemoryState<T> {
  /// Write timestamp, strictly later than any previous one.
  fn tick(&mut self) -> DateTime<Utc> {
    let now = Utc::now();
    let now = match self.last_write {
      Some(last) if now <= last => last + chrono::Duration::microseconds(1),
      _ => now,
    };
    self.last_write = Some(now);
    now
  }
}

/// A remote collection held in memory.
pub struct MemoryCollection<T> {
  state: Mutex<MemoryState<T>>,
  latency: Option<Duration>,
}

impl<T: MemoryRecord> MemoryCollection<T> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(MemoryState {
        rows: Vec::new(),
        next_id: 1,
        last_write: None,
        failures: VecDeque::new(),
      }),
      latency: None,
    }
  }

  /// Delay every request by `latency`.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Make the next request fail with `error`. Queued failures are consumed in order.
  pub fn fail_next(&self, error: RemoteError) {
    self.state().failures.push_back(error);
  }

  pub fn len(&self) -> usize {
    self.state().rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn state(&self) -> MutexGuard<'_, MemoryState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Suspend like a network call would, then surface any injected failure.
  async fn round_trip(&self) -> Result<(), RemoteError> {
    match self.latency {
      Some(latency) => tokio::time::sleep(latency).await,
      None => tokio::task::yield_now().await,
    }
    match self.state().failures.pop_front() {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  fn not_found(id: &str) -> RemoteError {
    RemoteError::NotFound {
      collection: T::COLLECTION,
      id: id.to_string(),
    }
  }

  fn conflict(id: &str) -> RemoteError {
    RemoteError::Conflict {
      collection: T::COLLECTION,
      id: id.to_string(),
    }
  }
}

impl<T: MemoryRecord> Default for MemoryCollection<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl<T: MemoryRecord> RemoteCollection<T> for MemoryCollection<T> {
  async fn select(&self, order: Order) -> Result<Vec<T>, RemoteError> {
    self.round_trip().await?;

    let mut rows = self.state().rows.clone();
    match order.column {
      "created_at" => rows.sort_by_key(|row| row.created_at()),
      "updated_at" => rows.sort_by_key(|row| row.updated_at()),
      _ => {}
    }
    if order.descending {
      rows.reverse();
    }
    Ok(rows)
  }

  async fn insert(&self, draft: &T::Draft) -> Result<T, RemoteError> {
    self.round_trip().await?;

    let mut state = self.state();
    let id = format!("n{}", state.next_id);
    state.next_id += 1;
    let now = state.tick();

    let row = T::from_draft(id, draft, now);
    state.rows.push(row.clone());
    Ok(row)
  }

  async fn update(
    &self,
    id: &str,
    patch: &T::Patch,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<T, RemoteError> {
    self.round_trip().await?;

    let mut state = self.state();
    let index = match state.rows.iter().position(|row| row.id() == id) {
      Some(index) => index,
      None if expected_updated_at.is_some() => return Err(Self::conflict(id)),
      None => return Err(Self::not_found(id)),
    };

    if let Some(expected) = expected_updated_at {
      if state.rows[index].updated_at() != expected {
        return Err(Self::conflict(id));
      }
    }

    // Nothing to write: the row and its version stay as they are.
    if patch.is_empty() {
      return Ok(state.rows[index].clone());
    }

    let now = state.tick();
    let row = &mut state.rows[index];
    row.apply_patch(patch, now);
    Ok(row.clone())
  }

  async fn delete(
    &self,
    id: &str,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<usize, RemoteError> {
    self.round_trip().await?;

    let mut state = self.state();
    let position = state.rows.iter().position(|row| {
      row.id() == id && expected_updated_at.map_or(true, |expected| row.updated_at() == expected)
    });

    match position {
      Some(index) => {
        state.rows.remove(index);
        Ok(1)
      }
      None if expected_updated_at.is_some() => Err(Self::conflict(id)),
      None => Ok(0),
    }
  }
}
