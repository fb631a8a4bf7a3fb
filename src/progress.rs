// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Durable session progress
//!
//! The snapshot is a JSON object keyed by each image's original path. Every
//! write replaces the whole file through a staging file and a rename, so a
//! crash mid-write leaves the previous snapshot intact. Unknown fields are
//! ignored on read; fields added later must be optional.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::record::{ImageRecord, Status};
use crate::{Result, TaggerError};

/// Persisted projection of one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedImage {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_entry_description: Option<String>,
    pub current_path: PathBuf,
    pub rename_history: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
    /// Intended post-move state, written before a move starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_move: Option<PendingMove>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Write-ahead record of a move in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMove {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_entry_description: Option<String>,
    pub current_path: PathBuf,
    pub rename_history: Vec<PathBuf>,
}

impl PersistedImage {
    pub fn from_record(record: &ImageRecord) -> Self {
        Self {
            status: record.status,
            assigned_entry_description: record.assigned_entry.clone(),
            current_path: record.current_path.clone(),
            rename_history: record.rename_history.clone(),
            missing: record.missing,
            pending_move: None,
            updated_at: record.updated_at,
        }
    }

    pub fn into_record(self, original_path: PathBuf) -> ImageRecord {
        ImageRecord {
            original_path,
            current_path: self.current_path,
            status: self.status,
            assigned_entry: self.assigned_entry_description,
            rename_history: self.rename_history,
            missing: self.missing,
            updated_at: self.updated_at,
        }
    }
}

impl PendingMove {
    pub fn from_record(record: &ImageRecord) -> Self {
        Self {
            status: record.status,
            assigned_entry_description: record.assigned_entry.clone(),
            current_path: record.current_path.clone(),
            rename_history: record.rename_history.clone(),
        }
    }
}

/// Complete persisted state of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressSnapshot {
    images: BTreeMap<PathBuf, PersistedImage>,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original_path: PathBuf, image: PersistedImage) {
        self.images.insert(original_path, image);
    }

    pub fn get(&self, original_path: &Path) -> Option<&PersistedImage> {
        self.images.get(original_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &PersistedImage)> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Parse and check a snapshot
    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(content)
            .map_err(|e| TaggerError::CorruptState(e.to_string()))?;
        snapshot.check()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check(&self) -> Result<()> {
        for (original, image) in &self.images {
            if original.as_os_str().is_empty() || image.current_path.as_os_str().is_empty() {
                return Err(TaggerError::CorruptState(format!("empty path in record {:?}", original)));
            }
            let tagged = image.status == Status::Tagged;
            if tagged != image.assigned_entry_description.is_some() {
                return Err(TaggerError::CorruptState(format!(
                    "record {:?} is {} but assigned entry is {:?}",
                    original, image.status, image.assigned_entry_description
                )));
            }
        }
        Ok(())
    }
}

/// Persistence of snapshots
pub trait ProgressStore: Send + Sync {
    /// Read the last saved snapshot; absent state is an empty snapshot
    fn load(&self) -> Result<ProgressSnapshot>;

    /// Replace the saved snapshot
    fn save(&self, snapshot: &ProgressSnapshot) -> Result<()>;
}

/// Snapshot kept in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unreadable snapshot aside so a fresh session cannot overwrite it
    pub fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{}", stamp));
        let aside = self.path.with_file_name(name);
        fs::rename(&self.path, &aside)?;
        warn!("Moved unreadable progress file to {:?}", aside);
        Ok(Some(aside))
    }

    fn staging_path(&self) -> PathBuf {
        let name = self.path.file_name().and_then(|n| n.to_str()).unwrap_or("progress");
        self.path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self) -> Result<ProgressSnapshot> {
        if !self.path.exists() {
            debug!("No progress file at {:?}, starting fresh", self.path);
            return Ok(ProgressSnapshot::new());
        }
        let content = fs::read_to_string(&self.path)?;
        ProgressSnapshot::from_json(&content)
    }

    fn save(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = snapshot.to_json()?;
        let staging = self.staging_path();
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&staging)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&staging, &self.path)
        })();

        if let Err(e) = written {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    warn!("Could not remove staging file {:?}: {}", staging, cleanup);
                }
            }
            return Err(e.into());
        }
        debug!("Saved progress ({} images) to {:?}", snapshot.len(), self.path);
        Ok(())
    }
}
