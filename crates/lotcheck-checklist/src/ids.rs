//! Record identifiers.
//!
//! All identifiers are assigned by the record store. They are wrapped in
//! distinct types so a checklist-item id can never be passed where an
//! item-result id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! record_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      /// The raw numeric identifier.
      pub fn get(self) -> i64 {
        self.0
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(id: i64) -> Self {
        Self(id)
      }
    }
  };
}

record_id!(
  /// Identifies a process sheet (the lot being inspected).
  ProcessId
);
record_id!(
  /// Identifies a checklist definition.
  ChecklistId
);
record_id!(
  /// Identifies one item within a checklist.
  ChecklistItemId
);
record_id!(
  /// Identifies an execution session.
  SessionId
);
record_id!(
  /// Server-assigned identifier of a persisted item result.
  ItemResultId
);
