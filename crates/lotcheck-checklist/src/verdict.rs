//! Session-level verdict.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::status::ItemStatus;

/// Overall outcome of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
  Pass,
  Fail,
  Warn,
}

impl Verdict {
  /// Reduce item statuses to a verdict.
  ///
  /// Any `NG` gives `fail`; otherwise any `SKIP` gives `warn`; otherwise
  /// `pass`. An empty set of statuses gives `pass`.
  pub fn from_statuses<I>(statuses: I) -> Self
  where
    I: IntoIterator<Item = ItemStatus>,
  {
    StatusTally::from_statuses(statuses).verdict()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Verdict::Pass => "pass",
      Verdict::Fail => "fail",
      Verdict::Warn => "warn",
    }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Verdict {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pass" => Ok(Verdict::Pass),
      "fail" => Ok(Verdict::Fail),
      "warn" => Ok(Verdict::Warn),
      other => Err(format!("unknown verdict: {}", other)),
    }
  }
}

/// Count of item statuses in a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
  pub ok: usize,
  pub ng: usize,
  pub skip: usize,
}

impl StatusTally {
  pub fn from_statuses<I>(statuses: I) -> Self
  where
    I: IntoIterator<Item = ItemStatus>,
  {
    let mut tally = Self::default();
    for status in statuses {
      tally.add(status);
    }
    tally
  }

  pub fn add(&mut self, status: ItemStatus) {
    match status {
      ItemStatus::Ok => self.ok += 1,
      ItemStatus::Ng => self.ng += 1,
      ItemStatus::Skip => self.skip += 1,
    }
  }

  pub fn total(&self) -> usize {
    self.ok + self.ng + self.skip
  }

  pub fn verdict(&self) -> Verdict {
    if self.ng > 0 {
      Verdict::Fail
    } else if self.skip > 0 {
      Verdict::Warn
    } else {
      Verdict::Pass
    }
  }
}
