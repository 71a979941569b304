//! Kind-tagged captured values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::ItemKind;

/// Errors raised while capturing a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
  /// The text is not a finite decimal number.
  #[error("not a number: '{raw}'")]
  InvalidNumber { raw: String },

  /// The text is not one of the enumerated choice literals.
  #[error("unknown choice '{raw}' (expected pass, caution or fail)")]
  UnknownChoice { raw: String },
}

/// A numeric reading, kept exactly as it was entered.
///
/// The text is validated as a finite number on construction but never
/// reformatted, so `"10.50"` stays `"10.50"` when written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NumericValue(String);

impl NumericValue {
  /// Validate and wrap a numeric reading.
  pub fn new(raw: impl Into<String>) -> Result<Self, ValueError> {
    let raw = raw.into();
    match raw.trim().parse::<f64>() {
      Ok(v) if v.is_finite() => Ok(Self(raw)),
      _ => Err(ValueError::InvalidNumber { raw }),
    }
  }

  /// The reading as entered.
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The reading as a floating point number.
  pub fn to_f64(&self) -> f64 {
    // Validated in `new`.
    self.0.trim().parse().unwrap_or(f64::NAN)
  }
}

impl TryFrom<String> for NumericValue {
  type Error = ValueError;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    Self::new(raw)
  }
}

impl From<NumericValue> for String {
  fn from(value: NumericValue) -> Self {
    value.0
  }
}

/// The three choices offered for enumerated items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumeratedChoice {
  Pass,
  Caution,
  Fail,
}

impl EnumeratedChoice {
  pub const ALL: [EnumeratedChoice; 3] = [
    EnumeratedChoice::Pass,
    EnumeratedChoice::Caution,
    EnumeratedChoice::Fail,
  ];

  /// The literal stored for this choice.
  pub fn literal(self) -> &'static str {
    match self {
      EnumeratedChoice::Pass => "pass",
      EnumeratedChoice::Caution => "caution",
      EnumeratedChoice::Fail => "fail",
    }
  }
}

impl fmt::Display for EnumeratedChoice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.literal())
  }
}

impl FromStr for EnumeratedChoice {
  type Err = ValueError;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|c| c.literal() == raw)
      .ok_or_else(|| ValueError::UnknownChoice {
        raw: raw.to_string(),
      })
  }
}

/// A value captured for one inspection item.
///
/// The tag is fixed at capture time and must match the item's [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapturedValue {
  Numeric(NumericValue),
  Text(String),
  Enumerated(EnumeratedChoice),
}

impl CapturedValue {
  /// Build a value of the given kind from raw text.
  ///
  /// Empty text means "no value" and yields `Ok(None)`.
  pub fn parse(kind: ItemKind, raw: &str) -> Result<Option<Self>, ValueError> {
    if raw.is_empty() {
      return Ok(None);
    }
    let value = match kind {
      ItemKind::Numeric => CapturedValue::Numeric(NumericValue::new(raw)?),
      ItemKind::FreeText => CapturedValue::Text(raw.to_string()),
      ItemKind::Enumerated => CapturedValue::Enumerated(raw.parse()?),
    };
    Ok(Some(value))
  }

  /// The item kind this value belongs to.
  pub fn kind(&self) -> ItemKind {
    match self {
      CapturedValue::Numeric(_) => ItemKind::Numeric,
      CapturedValue::Text(_) => ItemKind::FreeText,
      CapturedValue::Enumerated(_) => ItemKind::Enumerated,
    }
  }

  /// Whether the value carries no content.
  pub fn is_empty(&self) -> bool {
    match self {
      CapturedValue::Numeric(n) => n.as_str().is_empty(),
      CapturedValue::Text(t) => t.is_empty(),
      CapturedValue::Enumerated(_) => false,
    }
  }
}

impl fmt::Display for CapturedValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CapturedValue::Numeric(n) => f.write_str(n.as_str()),
      CapturedValue::Text(t) => f.write_str(t),
      CapturedValue::Enumerated(c) => f.write_str(c.literal()),
    }
  }
}
