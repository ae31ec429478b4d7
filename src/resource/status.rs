//! Busy/error bookkeeping shared by the operations of one store.

/// Point-in-time view of a [`StatusTracker`], suitable for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
  pub busy: bool,
  pub last_error: Option<String>,
}

/// Tracks in-flight operations and the most recent failure.
///
/// Busy is derived from a counter, so overlapping calls only report idle once
/// the last of them has completed.
#[derive(Debug, Default)]
pub struct StatusTracker {
  in_flight: usize,
  last_error: Option<String>,
}

impl StatusTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// An operation has been issued. Clears the previous error.
  pub fn begin(&mut self) {
    self.in_flight += 1;
    self.last_error = None;
  }

  /// An in-flight operation completed successfully.
  pub fn succeed(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
  }

  /// An in-flight operation failed.
  pub fn fail(&mut self, message: impl Into<String>) {
    self.in_flight = self.in_flight.saturating_sub(1);
    self.last_error = Some(message.into());
  }

  /// An operation was refused before being issued (validation).
  pub fn reject(&mut self, message: impl Into<String>) {
    self.last_error = Some(message.into());
  }

  /// An in-flight operation was dropped before it completed.
  pub fn abandon(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
  }

  pub fn busy(&self) -> bool {
    self.in_flight > 0
  }

  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn status(&self) -> Status {
    Status {
      busy: self.busy(),
      last_error: self.last_error.clone(),
    }
  }
}
