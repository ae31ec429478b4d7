//! Serde types matching PostgREST responses.

use serde::Deserialize;

/// Error body returned by PostgREST on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
  pub message: String,
  pub code: Option<String>,
  pub details: Option<String>,
}

impl ApiError {
  /// Message with details appended when the backend provided them.
  pub fn into_message(self) -> String {
    match self.details {
      Some(details) if !details.is_empty() => format!("{} ({})", self.message, details),
      _ => self.message,
    }
  }
}
