// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! A tagging session: the catalogue and every tracked image
//!
//! Sessions are plain values owned by the caller and handed to the engine,
//! so several can exist side by side.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::progress::{PendingMove, PersistedImage, ProgressSnapshot};
use crate::record::{ImageRecord, Status};
use crate::resolver::path_exists;

/// Counts for a progress display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub untagged: usize,
    pub tagged: usize,
    pub dont_know: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    catalog: CatalogStore,
    records: BTreeMap<PathBuf, ImageRecord>,
}

impl Session {
    /// A session with no saved progress
    pub fn fresh(catalog: CatalogStore, images: Vec<PathBuf>) -> Self {
        let records = images
            .into_iter()
            .map(|path| (path.clone(), ImageRecord::discovered(path)))
            .collect();
        Self { catalog, records }
    }

    /// Merge saved progress with the images found on disk now
    pub fn resume(catalog: CatalogStore, images: Vec<PathBuf>, snapshot: ProgressSnapshot) -> Self {
        let mut records = BTreeMap::new();

        for (original, persisted) in snapshot.iter() {
            let mut persisted = persisted.clone();
            let pending = persisted.pending_move.take();
            let mut record = persisted.into_record(original.clone());
            if let Some(pending) = pending {
                settle_pending(&mut record, pending);
            }

            record.missing = !path_exists(&record.current_path);
            if record.missing {
                warn!("Tracked image is missing on disk: {:?}", record.current_path);
            }
            if let Some(description) = &record.assigned_entry {
                if catalog.get(description).is_none() {
                    warn!("{:?} is tagged with '{}', which is not in the catalogue", original, description);
                }
            }
            records.insert(original.clone(), record);
        }

        let known: HashSet<PathBuf> = records
            .values()
            .flat_map(|r| [r.original_path.clone(), r.current_path.clone()])
            .collect();
        let mut added = 0;
        for path in images {
            if known.contains(&path) || records.contains_key(&path) {
                continue;
            }
            records.insert(path.clone(), ImageRecord::discovered(path));
            added += 1;
        }
        info!("Resumed session: {} images ({} new)", records.len(), added);

        Self { catalog, records }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn records(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identity key for an image named by original or current path
    pub fn key_for(&self, path: &Path) -> Option<PathBuf> {
        if self.records.contains_key(path) {
            return Some(path.to_path_buf());
        }
        self.records
            .values()
            .find(|r| r.current_path == path)
            .map(|r| r.original_path.clone())
    }

    pub fn record(&self, path: &Path) -> Option<&ImageRecord> {
        let key = self.key_for(path)?;
        self.records.get(&key)
    }

    pub(crate) fn replace(&mut self, record: ImageRecord) {
        self.records.insert(record.original_path.clone(), record);
    }

    /// The tagged image currently holding `description`
    pub fn holder_of(&self, description: &str) -> Option<&ImageRecord> {
        self.records
            .values()
            .find(|r| r.status == Status::Tagged && r.assigned_entry.as_deref() == Some(description))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot::new();
        for record in self.records.values() {
            snapshot.insert(record.original_path.clone(), PersistedImage::from_record(record));
        }
        snapshot
    }

    /// Snapshot with `record` substituted, optionally carrying a move intent
    pub(crate) fn snapshot_with(&self, record: &ImageRecord, intent: Option<&ImageRecord>) -> ProgressSnapshot {
        let mut snapshot = self.snapshot();
        let mut persisted = PersistedImage::from_record(record);
        persisted.pending_move = intent.map(PendingMove::from_record);
        snapshot.insert(record.original_path.clone(), persisted);
        snapshot
    }

    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary { total: self.records.len(), ..Default::default() };
        for record in self.records.values() {
            match record.status {
                Status::Untagged => summary.untagged += 1,
                Status::Tagged => summary.tagged += 1,
                Status::DontKnow => summary.dont_know += 1,
            }
            if record.missing {
                summary.missing += 1;
            }
        }
        summary
    }

    /// Images still to be tagged: untagged first, don't-know ones at the end
    pub fn queue(&self) -> Vec<&ImageRecord> {
        let pending = |status: Status| {
            self.records
                .values()
                .filter(move |r| r.status == status && !r.missing)
        };
        pending(Status::Untagged).chain(pending(Status::DontKnow)).collect()
    }

    /// Catalogue descriptions not yet assigned to a tagged image
    pub fn available_descriptions(&self) -> Vec<&str> {
        let used: HashSet<&str> = self
            .records
            .values()
            .filter(|r| r.status == Status::Tagged)
            .filter_map(|r| r.assigned_entry.as_deref())
            .collect();
        self.catalog
            .entries()
            .map(|e| e.description())
            .filter(|d| !used.contains(d))
            .collect()
    }
}

/// Decide whether an interrupted move completed
fn settle_pending(record: &mut ImageRecord, pending: PendingMove) {
    let landed = pending.current_path != record.current_path
        && path_exists(&pending.current_path)
        && !path_exists(&record.current_path);

    if landed {
        info!(
            "Completing interrupted move of {:?} to {:?}",
            record.original_path, pending.current_path
        );
        record.status = pending.status;
        record.assigned_entry = pending.assigned_entry_description;
        record.current_path = pending.current_path;
        record.rename_history = pending.rename_history;
    } else {
        info!("Discarding unfinished move of {:?}", record.original_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawRow;
    use std::fs;

    fn catalog(descriptions: &[&str]) -> CatalogStore {
        CatalogStore::load(
            descriptions
                .iter()
                .map(|d| RawRow { description: Some(d.to_string()), ..RawRow::default() })
                .collect(),
        )
        .store
    }

    fn untagged(path: &Path) -> PersistedImage {
        PersistedImage::from_record(&ImageRecord::discovered(path.to_path_buf()))
    }

    #[test]
    fn test_resume_adds_new_and_flags_missing() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.jpg");
        let gone = dir.path().join("b.jpg");
        let new = dir.path().join("c.jpg");
        fs::write(&kept, b"a").unwrap();
        fs::write(&new, b"c").unwrap();

        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(kept.clone(), untagged(&kept));
        snapshot.insert(gone.clone(), untagged(&gone));

        let session = Session::resume(catalog(&[]), vec![kept.clone(), new.clone()], snapshot);
        assert_eq!(session.len(), 3);
        assert!(session.record(&gone).unwrap().missing);
        assert!(!session.record(&kept).unwrap().missing);
        assert_eq!(session.record(&new).unwrap().status, Status::Untagged);
        assert_eq!(session.summary().missing, 1);
    }

    #[test]
    fn test_resume_does_not_double_track_renamed_files() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("IMG001.jpg");
        let renamed = dir.path().join("untagged_IMG001.jpg");
        fs::write(&renamed, b"x").unwrap();

        let mut record = ImageRecord::discovered(original.clone());
        record = record.moved_to(&renamed);
        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(original.clone(), PersistedImage::from_record(&record));

        let session = Session::resume(catalog(&[]), vec![renamed.clone()], snapshot);
        assert_eq!(session.len(), 1);
        assert_eq!(session.key_for(&renamed), Some(original));
    }

    #[test]
    fn test_pending_move_adopted_when_file_landed() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("IMG001.jpg");
        let dest = dir.path().join("X").join("X Pot.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"x").unwrap();

        let before = ImageRecord::discovered(original.clone());
        let mut intent = before.moved_to(&dest);
        intent.status = Status::Tagged;
        intent.assigned_entry = Some("Pot".to_string());

        let mut persisted = PersistedImage::from_record(&before);
        persisted.pending_move = Some(PendingMove::from_record(&intent));
        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(original.clone(), persisted);

        let session = Session::resume(catalog(&["Pot"]), vec![], snapshot);
        let record = session.record(&original).unwrap();
        assert_eq!(record.status, Status::Tagged);
        assert_eq!(record.current_path, dest);
        assert_eq!(record.rename_history, vec![original]);
        assert!(!record.missing);
    }

    #[test]
    fn test_pending_move_discarded_when_file_stayed() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("IMG001.jpg");
        fs::write(&original, b"x").unwrap();

        let before = ImageRecord::discovered(original.clone());
        let intent = before.moved_to(&dir.path().join("elsewhere.jpg"));
        let mut persisted = PersistedImage::from_record(&before);
        persisted.pending_move = Some(PendingMove::from_record(&intent));
        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(original.clone(), persisted);

        let session = Session::resume(catalog(&[]), vec![original.clone()], snapshot);
        assert_eq!(session.record(&original).unwrap(), &before);
        assert!(session.snapshot().get(&original).unwrap().pending_move.is_none());
    }

    #[test]
    fn test_queue_sends_dont_know_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["a.jpg", "b.jpg", "c.jpg"].iter().map(|n| dir.path().join(n)).collect();
        let mut session = Session::fresh(catalog(&["Pot", "Jug"]), paths.clone());

        let mut a = session.record(&paths[0]).unwrap().clone();
        a.status = Status::DontKnow;
        session.replace(a);
        let mut b = session.record(&paths[1]).unwrap().clone();
        b.status = Status::Tagged;
        b.assigned_entry = Some("Pot".to_string());
        session.replace(b);

        let queue: Vec<&Path> = session.queue().iter().map(|r| r.original_path.as_path()).collect();
        assert_eq!(queue, vec![paths[2].as_path(), paths[0].as_path()]);
        assert_eq!(session.available_descriptions(), vec!["Jug"]);
        assert_eq!(session.holder_of("Pot").unwrap().original_path, paths[1]);
    }
}
