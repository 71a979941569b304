//! Answer and fixture files read by the command-line front end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use lotcheck_checklist::ChecklistItemId;
use lotcheck_store::{ChecklistRecord, ProcessRecord};

/// Answers for one wizard run, keyed by checklist item.
#[derive(Debug, Deserialize)]
pub struct AnswersFile {
  pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
  pub item: ChecklistItemId,
  #[serde(default)]
  pub value: String,
  #[serde(default)]
  pub comment: String,
  /// Photo paths, relative to the answers file.
  #[serde(default)]
  pub photos: Vec<PathBuf>,
}

impl AnswersFile {
  pub fn parse(content: &str) -> Result<Self> {
    serde_json::from_str(content).context("failed to parse answers")
  }

  /// Index answers by item. Later entries for the same item win.
  pub fn by_item(self) -> HashMap<ChecklistItemId, Answer> {
    self.answers.into_iter().map(|a| (a.item, a)).collect()
  }
}

/// Master data loaded by `seed`.
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
  #[serde(default)]
  pub checklists: Vec<ChecklistRecord>,
  #[serde(default)]
  pub processes: Vec<ProcessRecord>,
}

impl Fixture {
  pub fn parse(content: &str) -> Result<Self> {
    serde_json::from_str(content).context("failed to parse fixture")
  }
}

/// MIME type of a photo, from its file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);
  match extension.as_deref() {
    Some("png") => "image/png",
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("gif") => "image/gif",
    Some("webp") => "image/webp",
    _ => "application/octet-stream",
  }
}

/// Resolve a photo path against the directory of the answers file.
pub fn resolve_photo(answers_file: &Path, photo: &Path) -> PathBuf {
  if photo.is_absolute() {
    return photo.to_path_buf();
  }
  answers_file
    .parent()
    .map(|dir| dir.join(photo))
    .unwrap_or_else(|| photo.to_path_buf())
}
