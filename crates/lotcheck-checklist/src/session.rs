use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution session record.
///
/// Status only moves forward: `draft < running < completed < approved | rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Draft,
  Running,
  Completed,
  Approved,
  Rejected,
}

impl ExecutionStatus {
  fn rank(self) -> u8 {
    match self {
      ExecutionStatus::Draft => 0,
      ExecutionStatus::Running => 1,
      ExecutionStatus::Completed => 2,
      ExecutionStatus::Approved | ExecutionStatus::Rejected => 3,
    }
  }

  /// Whether a record in this status may be moved to `next`.
  ///
  /// Re-writing the current status is allowed. Approved and rejected are
  /// final and exclude each other.
  pub fn can_advance_to(self, next: ExecutionStatus) -> bool {
    if self == next {
      return true;
    }
    next.rank() > self.rank()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ExecutionStatus::Draft => "draft",
      ExecutionStatus::Running => "running",
      ExecutionStatus::Completed => "completed",
      ExecutionStatus::Approved => "approved",
      ExecutionStatus::Rejected => "rejected",
    }
  }
}

impl fmt::Display for ExecutionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ExecutionStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "draft" => Ok(ExecutionStatus::Draft),
      "running" => Ok(ExecutionStatus::Running),
      "completed" => Ok(ExecutionStatus::Completed),
      "approved" => Ok(ExecutionStatus::Approved),
      "rejected" => Ok(ExecutionStatus::Rejected),
      other => Err(format!("unknown execution status: {}", other)),
    }
  }
}
