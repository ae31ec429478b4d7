use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A note as stored in the remote `notes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub id: String,
  pub title: String,
  pub content: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Fields for creating a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteDraft {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
}

impl NoteDraft {
  pub fn new(title: impl Into<String>, content: Option<String>) -> Self {
    Self {
      title: title.into(),
      content,
    }
  }
}

/// Fields to merge into an existing note. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
}

impl NotePatch {
  pub fn title(title: impl Into<String>) -> Self {
    Self {
      title: Some(title.into()),
      content: None,
    }
  }

  pub fn content(content: impl Into<String>) -> Self {
    Self {
      title: None,
      content: Some(content.into()),
    }
  }
}
