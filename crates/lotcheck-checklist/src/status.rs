//! Per-item status inference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::{CapturedValue, EnumeratedChoice};

/// Outcome of a single inspection item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
  /// Acceptable.
  #[serde(rename = "OK")]
  Ok,
  /// Unacceptable.
  #[serde(rename = "NG")]
  Ng,
  /// Not answered.
  #[serde(rename = "SKIP")]
  Skip,
}

impl ItemStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      ItemStatus::Ok => "OK",
      ItemStatus::Ng => "NG",
      ItemStatus::Skip => "SKIP",
    }
  }
}

impl fmt::Display for ItemStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ItemStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "OK" => Ok(ItemStatus::Ok),
      "NG" => Ok(ItemStatus::Ng),
      "SKIP" => Ok(ItemStatus::Skip),
      other => Err(format!("unknown item status: {}", other)),
    }
  }
}

/// Infer the status of an item from its captured value.
///
/// - no value, or an empty one: `SKIP`
/// - enumerated `pass`: `OK`, enumerated `fail`: `NG`
/// - enumerated `caution`: `OK` (caution does not downgrade the item)
/// - any numeric or text value: `OK`; configured bounds are not checked here
pub fn infer_status(value: Option<&CapturedValue>) -> ItemStatus {
  let Some(value) = value else {
    return ItemStatus::Skip;
  };
  if value.is_empty() {
    return ItemStatus::Skip;
  }
  match value {
    CapturedValue::Enumerated(EnumeratedChoice::Fail) => ItemStatus::Ng,
    CapturedValue::Enumerated(EnumeratedChoice::Pass | EnumeratedChoice::Caution) => ItemStatus::Ok,
    CapturedValue::Numeric(_) | CapturedValue::Text(_) => ItemStatus::Ok,
  }
}
