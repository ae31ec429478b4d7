//! The `notes` collection.

mod types;

pub use types::{Note, NoteDraft, NotePatch};

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::remote::MemoryRecord;
use crate::resource::{FieldPatch, Resource, ResourceStore, Validate};

/// Store of notes over any transport.
pub type NoteStore<R> = ResourceStore<Note, R>;

impl Resource for Note {
  type Draft = NoteDraft;
  type Patch = NotePatch;

  const COLLECTION: &'static str = "notes";

  fn id(&self) -> &str {
    &self.id
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

impl MemoryRecord for Note {
  fn from_draft(id: String, draft: &NoteDraft, now: DateTime<Utc>) -> Self {
    Note {
      id,
      title: draft.title.clone(),
      content: draft.content.clone(),
      created_at: now,
      updated_at: now,
    }
  }

  fn apply_patch(&mut self, patch: &NotePatch, now: DateTime<Utc>) {
    if let Some(title) = &patch.title {
      self.title = title.clone();
    }
    if let Some(content) = &patch.content {
      self.content = Some(content.clone());
    }
    self.updated_at = now;
  }
}

fn require_title(title: &str) -> Result<(), ValidationError> {
  if title.trim().is_empty() {
    return Err(ValidationError::Required("Title"));
  }
  Ok(())
}

impl Validate for NoteDraft {
  fn validate(&self) -> Result<(), ValidationError> {
    require_title(&self.title)
  }
}

impl FieldPatch for NotePatch {
  fn is_empty(&self) -> bool {
    self.title.is_none() && self.content.is_none()
  }
}

impl Validate for NotePatch {
  fn validate(&self) -> Result<(), ValidationError> {
    match &self.title {
      Some(title) => require_title(title),
      None => Ok(()),
    }
  }
}
