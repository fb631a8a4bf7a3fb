// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-image tagging state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Tagging status of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Untagged,
    Tagged,
    DontKnow,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Untagged => "untagged",
            Status::Tagged => "tagged",
            Status::DontKnow => "don't know",
        };
        f.write_str(label)
    }
}

/// One tracked image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Identity key; the path the image had when first discovered
    pub original_path: PathBuf,
    pub current_path: PathBuf,
    pub status: Status,
    /// Description of the catalogue entry, only while `Tagged`
    pub assigned_entry: Option<String>,
    /// Previous `current_path` values, most recent last
    pub rename_history: Vec<PathBuf>,
    /// Listed in the snapshot but not found on disk at resume
    pub missing: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// A freshly discovered, untouched image
    pub fn discovered(path: PathBuf) -> Self {
        Self {
            current_path: path.clone(),
            original_path: path,
            status: Status::Untagged,
            assigned_entry: None,
            rename_history: Vec::new(),
            missing: false,
            updated_at: None,
        }
    }

    pub fn is_renamed(&self) -> bool {
        !self.rename_history.is_empty()
    }

    /// The record as it will look once moved to `destination`
    pub(crate) fn moved_to(&self, destination: &Path) -> Self {
        let mut next = self.clone();
        next.rename_history.push(self.current_path.clone());
        next.current_path = destination.to_path_buf();
        next
    }

    /// The record as it will look once its last rename is reverted
    pub(crate) fn reverted(&self) -> Option<Self> {
        let mut next = self.clone();
        let previous = next.rename_history.pop()?;
        next.current_path = previous;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Status::DontKnow).unwrap(), "\"dont_know\"");
        let parsed: Status = serde_json::from_str("\"tagged\"").unwrap();
        assert_eq!(parsed, Status::Tagged);
    }

    #[test]
    fn test_moved_then_reverted_restores_path() {
        let record = ImageRecord::discovered(PathBuf::from("Images/IMG001.jpg"));
        let moved = record.moved_to(Path::new("A/A Pot.jpg"));
        assert!(moved.is_renamed());
        assert_eq!(moved.current_path, PathBuf::from("A/A Pot.jpg"));

        let back = moved.reverted().unwrap();
        assert_eq!(back.current_path, record.current_path);
        assert!(!back.is_renamed());
        assert!(record.reverted().is_none());
    }

    #[test]
    fn test_history_keeps_repeated_paths() {
        let record = ImageRecord::discovered(PathBuf::from("a.jpg"));
        let twice = record
            .moved_to(Path::new("b.jpg"))
            .moved_to(Path::new("a.jpg"))
            .moved_to(Path::new("b.jpg"));
        assert_eq!(
            twice.rename_history,
            vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg"), PathBuf::from("a.jpg")]
        );
    }
}
