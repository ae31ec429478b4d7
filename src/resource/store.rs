//! Ordered local mirror of a remote collection.

use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{RemoteError, StoreError, ValidationError};
use crate::remote::RemoteCollection;

use super::client::ResourceClient;
use super::status::{Status, StatusTracker};
use super::{Resource, Validate};

/// Everything a view needs to render: the cached records and the status.
#[derive(Debug)]
pub struct StoreState<T> {
  items: Vec<T>,
  tracker: StatusTracker,
}

impl<T> StoreState<T> {
  /// Cached records, newest first.
  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn status(&self) -> Status {
    self.tracker.status()
  }

  pub fn tracker(&self) -> &StatusTracker {
    &self.tracker
  }
}

impl<T> Default for StoreState<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      tracker: StatusTracker::new(),
    }
  }
}

/// An operation in flight. Leaves the tracker's flight count when dropped
/// without being settled, e.g. when the caller stops awaiting it.
struct PendingCall<'a, T> {
  state: &'a watch::Sender<StoreState<T>>,
  settled: bool,
}

impl<'a, T> PendingCall<'a, T> {
  fn begin(state: &'a watch::Sender<StoreState<T>>) -> Self {
    state.send_modify(|s| s.tracker.begin());
    Self {
      state,
      settled: false,
    }
  }

  fn succeed(mut self, apply: impl FnOnce(&mut Vec<T>)) {
    self.settled = true;
    self.state.send_modify(|s| {
      apply(&mut s.items);
      s.tracker.succeed();
    });
  }

  fn fail(mut self, error: &RemoteError) {
    self.settled = true;
    self.state.send_modify(|s| s.tracker.fail(error.to_string()));
  }
}

impl<T> Drop for PendingCall<'_, T> {
  fn drop(&mut self) {
    if !self.settled {
      self.state.send_modify(|s| s.tracker.abandon());
    }
  }
}

/// Keeps an ordered list of `T` in step with the outcomes of the calls it issues.
///
/// The list is filled by [`list`](Self::list) and then maintained incrementally:
/// creates are prepended, updates replace in place, deletes remove. Failed calls
/// leave the list untouched. All operations take `&self`, so several may be in
/// flight at once; their results are applied in completion order.
///
/// The `try_*` operations report errors to the caller; the plain ones return
/// `None`/`false` and leave the message in [`status`](Self::status).
pub struct ResourceStore<T, R> {
  client: ResourceClient<T, R>,
  state: watch::Sender<StoreState<T>>,
}

impl<T, R> ResourceStore<T, R>
where
  T: Resource,
  R: RemoteCollection<T>,
{
  pub fn new(client: ResourceClient<T, R>) -> Self {
    let (state, _) = watch::channel(StoreState::default());
    Self { client, state }
  }

  pub fn from_remote(remote: R) -> Self {
    Self::new(ResourceClient::new(remote))
  }

  pub fn client(&self) -> &ResourceClient<T, R> {
    &self.client
  }

  /// Snapshot of the cached records, newest first.
  pub fn items(&self) -> Vec<T> {
    self.state.borrow().items.clone()
  }

  /// Cached record `id`, if loaded.
  pub fn get(&self, id: &str) -> Option<T> {
    self
      .state
      .borrow()
      .items
      .iter()
      .find(|item| item.id() == id)
      .cloned()
  }

  pub fn status(&self) -> Status {
    self.state.borrow().status()
  }

  /// Watch the store; the receiver is notified on every change.
  pub fn subscribe(&self) -> watch::Receiver<StoreState<T>> {
    self.state.subscribe()
  }

  pub async fn list(&self) -> Option<Vec<T>> {
    self.try_list().await.ok()
  }

  pub async fn create(&self, draft: T::Draft) -> Option<T> {
    self.try_create(draft).await.ok()
  }

  pub async fn update(&self, id: &str, patch: T::Patch) -> Option<T> {
    self.try_update(id, patch).await.ok()
  }

  pub async fn delete(&self, id: &str) -> bool {
    self.try_delete(id).await.unwrap_or(false)
  }

  pub async fn update_checked(&self, id: &str, patch: T::Patch) -> Option<T> {
    self.try_update_checked(id, patch).await.ok()
  }

  pub async fn delete_checked(&self, id: &str) -> bool {
    self.try_delete_checked(id).await.unwrap_or(false)
  }

  /// Reload every record, replacing the cached list.
  pub async fn try_list(&self) -> Result<Vec<T>, StoreError> {
    self
      .settle(self.client.list(), |items, records: &Vec<T>| {
        *items = records.clone();
      })
      .await
  }

  /// Create a record and put it at the front of the cached list.
  pub async fn try_create(&self, draft: T::Draft) -> Result<T, StoreError> {
    self.validate(&draft)?;
    self
      .settle(self.client.create(&draft), |items, record: &T| {
        // A list that landed first may already hold the new record.
        match position(items, record.id()) {
          Some(index) => items[index] = record.clone(),
          None => items.insert(0, record.clone()),
        }
      })
      .await
  }

  /// Merge `patch` into record `id`, regardless of its current version.
  pub async fn try_update(&self, id: &str, patch: T::Patch) -> Result<T, StoreError> {
    self.validate(&patch)?;
    self
      .settle(self.client.update(id, &patch), replace_in_place)
      .await
  }

  /// Merge `patch` into record `id` only if nobody changed it since it was cached.
  pub async fn try_update_checked(&self, id: &str, patch: T::Patch) -> Result<T, StoreError> {
    self.validate(&patch)?;
    let version = self.cached_version(id)?;
    self
      .settle(
        self.client.update_if_unchanged(id, &patch, version),
        replace_in_place,
      )
      .await
  }

  /// Delete record `id` and drop it from the cached list.
  pub async fn try_delete(&self, id: &str) -> Result<bool, StoreError> {
    self
      .settle(self.client.delete(id), |items, _: &bool| remove(items, id))
      .await
  }

  /// Delete record `id` only if nobody changed it since it was cached.
  pub async fn try_delete_checked(&self, id: &str) -> Result<bool, StoreError> {
    let version = self.cached_version(id)?;
    self
      .settle(self.client.delete_if_unchanged(id, version), |items, _: &bool| {
        remove(items, id)
      })
      .await
  }

  /// Run one request, applying `apply` to the cached list only on success.
  async fn settle<V, F>(
    &self,
    request: F,
    apply: impl FnOnce(&mut Vec<T>, &V),
  ) -> Result<V, StoreError>
  where
    F: Future<Output = Result<V, RemoteError>>,
  {
    let call = PendingCall::begin(&self.state);
    match request.await {
      Ok(value) => {
        call.succeed(|items| apply(items, &value));
        Ok(value)
      }
      Err(error) => {
        call.fail(&error);
        Err(error.into())
      }
    }
  }

  fn validate(&self, input: &impl Validate) -> Result<(), StoreError> {
    input.validate().map_err(|error| self.reject(error))
  }

  fn cached_version(&self, id: &str) -> Result<DateTime<Utc>, StoreError> {
    self.get(id).map(|item| item.updated_at()).ok_or_else(|| {
      self.reject(ValidationError::UnknownId {
        collection: T::COLLECTION,
        id: id.to_string(),
      })
    })
  }

  fn reject(&self, error: ValidationError) -> StoreError {
    debug!(collection = T::COLLECTION, %error, "rejected before request");
    self.state.send_modify(|s| s.tracker.reject(error.to_string()));
    error.into()
  }
}

fn position<T: Resource>(items: &[T], id: &str) -> Option<usize> {
  items.iter().position(|item| item.id() == id)
}

fn replace_in_place<T: Resource>(items: &mut Vec<T>, record: &T) {
  match position(items, record.id()) {
    Some(index) => items[index] = record.clone(),
    None => debug!(
      collection = T::COLLECTION,
      id = record.id(),
      "updated record not cached, skipping"
    ),
  }
}

fn remove<T: Resource>(items: &mut Vec<T>, id: &str) {
  items.retain(|item| item.id() != id);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::notes::{Note, NoteDraft, NotePatch, NoteStore};
  use crate::remote::MemoryCollection;
  use std::time::Duration;

  fn store() -> NoteStore<MemoryCollection<Note>> {
    ResourceStore::from_remote(MemoryCollection::new())
  }

  fn draft(title: &str) -> NoteDraft {
    NoteDraft::new(title, None)
  }

  fn titles(store: &NoteStore<MemoryCollection<Note>>) -> Vec<String> {
    store.items().into_iter().map(|note| note.title).collect()
  }

  #[tokio::test]
  async fn test_list_replaces_cache() {
    let store = store();
    store.client().create(&draft("a")).await.unwrap();
    store.client().create(&draft("b")).await.unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(titles(&store), vec!["b", "a"]);
    assert_eq!(store.status(), Status::default());
  }

  #[tokio::test]
  async fn test_create_prepends() {
    let store = store();
    store.create(draft("a")).await.unwrap();
    store.create(draft("b")).await.unwrap();
    assert_eq!(titles(&store), vec!["b", "a"]);
  }

  #[tokio::test]
  async fn test_create_failure_leaves_cache_untouched() {
    let store = store();
    store.create(draft("kept")).await.unwrap();
    store.client().remote().fail_next(RemoteError::Rejected {
      status: 403,
      code: Some("42501".to_string()),
      message: "new row violates row-level security policy".to_string(),
    });

    assert!(store.create(draft("lost")).await.is_none());
    assert_eq!(titles(&store), vec!["kept"]);

    let status = store.status();
    assert!(!status.busy);
    assert_eq!(
      status.last_error.as_deref(),
      Some("new row violates row-level security policy")
    );
  }

  #[tokio::test]
  async fn test_validation_error_issues_no_request() {
    let store = store();
    let err = store.try_create(draft("  ")).await.unwrap_err();
    assert_eq!(err, StoreError::Validation(ValidationError::Required("Title")));
    assert!(store.client().remote().is_empty());

    let status = store.status();
    assert!(!status.busy);
    assert_eq!(status.last_error.as_deref(), Some("Title is required"));
  }

  #[tokio::test]
  async fn test_next_call_clears_error() {
    let store = store();
    assert!(store.create(draft("")).await.is_none());
    assert!(store.status().last_error.is_some());

    store.list().await.unwrap();
    assert_eq!(store.status().last_error, None);
  }

  #[tokio::test]
  async fn test_update_replaces_in_place() {
    let store = store();
    let a = store.create(draft("a")).await.unwrap();
    store.create(draft("b")).await.unwrap();
    store.create(draft("c")).await.unwrap();

    let updated = store.update(&a.id, NotePatch::title("A")).await.unwrap();
    assert_eq!(updated.title, "A");
    assert!(updated.updated_at > a.updated_at);
    assert_eq!(titles(&store), vec!["c", "b", "A"]);
  }

  #[tokio::test]
  async fn test_update_of_uncached_record_skips_cache() {
    let store = store();
    store.create(draft("cached")).await.unwrap();
    let hidden = store.client().create(&draft("hidden")).await.unwrap();

    let updated = store.update(&hidden.id, NotePatch::content("x")).await;
    assert!(updated.is_some());
    assert_eq!(titles(&store), vec!["cached"]);
  }

  #[tokio::test]
  async fn test_update_failure_keeps_cached_record() {
    let store = store();
    let note = store.create(draft("a")).await.unwrap();
    store.client().remote().fail_next(RemoteError::Transport {
      collection: "notes",
      message: "connection reset".to_string(),
    });

    assert!(store.update(&note.id, NotePatch::title("b")).await.is_none());
    assert_eq!(store.get(&note.id), Some(note));
    assert_eq!(
      store.status().last_error.as_deref(),
      Some("request to notes failed: connection reset")
    );
  }

  #[tokio::test]
  async fn test_delete_removes_and_is_idempotent() {
    let store = store();
    let a = store.create(draft("a")).await.unwrap();
    store.create(draft("b")).await.unwrap();

    assert!(store.delete(&a.id).await);
    assert_eq!(titles(&store), vec!["b"]);

    assert!(store.delete(&a.id).await);
    assert_eq!(store.status().last_error, None);
  }

  #[tokio::test]
  async fn test_delete_failure_returns_false() {
    let store = store();
    let a = store.create(draft("a")).await.unwrap();
    store.client().remote().fail_next(RemoteError::Rejected {
      status: 503,
      code: None,
      message: "503 Service Unavailable".to_string(),
    });

    assert!(!store.delete(&a.id).await);
    assert_eq!(titles(&store), vec!["a"]);
    assert!(store.status().last_error.is_some());
  }

  #[tokio::test]
  async fn test_checked_update_conflict() {
    let store = store();
    let note = store.create(draft("mine")).await.unwrap();

    // Out-of-band edit the cache never sees.
    store
      .client()
      .update(&note.id, &NotePatch::title("theirs"))
      .await
      .unwrap();

    let err = store
      .try_update_checked(&note.id, NotePatch::content("x"))
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Remote(RemoteError::Conflict { .. })));
    assert_eq!(store.get(&note.id), Some(note.clone()));

    // After a reload the write goes through.
    store.list().await.unwrap();
    let updated = store
      .update_checked(&note.id, NotePatch::content("x"))
      .await
      .unwrap();
    assert_eq!(updated.title, "theirs");
    assert_eq!(updated.content.as_deref(), Some("x"));
  }

  #[tokio::test]
  async fn test_checked_delete() {
    let store = store();
    let note = store.create(draft("a")).await.unwrap();
    assert!(store.delete_checked(&note.id).await);
    assert!(store.items().is_empty());
    assert!(store.client().remote().is_empty());
  }

  #[tokio::test]
  async fn test_checked_operations_need_cached_record() {
    let store = store();
    let err = store.try_delete_checked("n7").await.unwrap_err();
    assert_eq!(
      err,
      StoreError::Validation(ValidationError::UnknownId {
        collection: "notes",
        id: "n7".to_string(),
      })
    );
    assert_eq!(
      store.status().last_error.as_deref(),
      Some("notes record n7 is not loaded")
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_busy_while_any_call_in_flight() {
    let store: NoteStore<_> =
      ResourceStore::from_remote(MemoryCollection::new().with_latency(Duration::from_millis(50)));

    let observe = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      let rx = store.subscribe();
      let state = rx.borrow();
      (state.status().busy, state.tracker().in_flight())
    };

    let (created, listed, during) = tokio::join!(store.create(draft("a")), store.list(), observe);
    assert!(created.is_some());
    assert!(listed.is_some());
    assert_eq!(during, (true, 2));
    assert!(!store.status().busy);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_call_leaves_flight() {
    let store: NoteStore<_> =
      ResourceStore::from_remote(MemoryCollection::new().with_latency(Duration::from_millis(200)));

    let timed_out = tokio::time::timeout(Duration::from_millis(10), store.list()).await;
    assert!(timed_out.is_err());
    assert_eq!(store.status(), Status::default());
  }

  #[tokio::test]
  async fn test_subscribers_see_changes() {
    let store = store();
    let mut rx = store.subscribe();

    store.create(draft("a")).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().items().len(), 1);
    assert!(!rx.has_changed().unwrap());
  }
}
