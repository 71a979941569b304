use std::fmt;

/// Where the execution controller is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
  Initializing,
  /// The wizard shows the item at this index.
  Active(usize),
  Finalizing,
  Confirming,
  Done,
  /// Initialization failed; the message is user-facing.
  Failed(String),
}

impl ControllerState {
  pub fn name(&self) -> &'static str {
    match self {
      ControllerState::Initializing => "initializing",
      ControllerState::Active(_) => "active",
      ControllerState::Finalizing => "finalizing",
      ControllerState::Confirming => "confirming",
      ControllerState::Done => "done",
      ControllerState::Failed(_) => "failed",
    }
  }

  /// Whether the elapsed-time display is live in this state.
  pub fn is_timed(&self) -> bool {
    matches!(
      self,
      ControllerState::Active(_) | ControllerState::Finalizing | ControllerState::Confirming
    )
  }
}

impl fmt::Display for ControllerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ControllerState::Active(index) => write!(f, "active({})", index),
      ControllerState::Failed(reason) => write!(f, "failed: {}", reason),
      other => f.write_str(other.name()),
    }
  }
}
