// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The tagging state machine
//!
//! ```text
//!   Untagged --tag--> Tagged --undo_tag--> Untagged
//!   DontKnow --tag--> Tagged
//!   Untagged|Tagged --mark_unknown--> DontKnow --mark_unknown|unmark--> Untagged
//! ```
//!
//! Each operation runs under one lock from resolution to persistence. A move
//! is bracketed by two saves: the first records the intended result as a
//! pending move, the second records the result itself. If the second save
//! fails the move is reverted, so memory, disk and the progress file never
//! disagree once the call returns.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogueEntry;
use crate::executor::{Filesystem, LocalFs, RenameExecutor};
use crate::progress::{ProgressSnapshot, ProgressStore};
use crate::record::{ImageRecord, Status};
use crate::resolver::PathResolver;
use crate::session::{ProgressSummary, Session};
use crate::{Result, TaggerError};

/// Filesystem effect of a transition
enum Motion {
    Stay,
    MoveTo(PathBuf),
    Revert,
}

pub struct TaggingEngine<S, F = LocalFs> {
    session: Mutex<Session>,
    store: S,
    resolver: PathResolver,
    executor: RenameExecutor<F>,
}

impl<S: ProgressStore> TaggingEngine<S, LocalFs> {
    pub fn new(session: Session, store: S, resolver: PathResolver) -> Self {
        Self::with_executor(session, store, resolver, RenameExecutor::new())
    }
}

impl<S: ProgressStore, F: Filesystem> TaggingEngine<S, F> {
    pub fn with_executor(
        session: Session,
        store: S,
        resolver: PathResolver,
        executor: RenameExecutor<F>,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            store,
            resolver,
            executor,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session.lock().map_err(|_| TaggerError::LockPoisoned)
    }

    /// Give the session back to the caller
    pub fn into_session(self) -> Result<Session> {
        self.session.into_inner().map_err(|_| TaggerError::LockPoisoned)
    }

    /// Tag an untagged or don't-know image with a catalogue entry
    pub fn tag(&self, image: &Path, description: &str) -> Result<ImageRecord> {
        let mut session = self.lock()?;
        let before = lookup(&session, image)?;

        if before.status == Status::Tagged {
            return Err(TaggerError::InvalidTransition {
                action: "tag",
                status: before.status.to_string(),
            });
        }
        let entry: CatalogueEntry = session
            .catalog()
            .get(description)
            .cloned()
            .ok_or_else(|| TaggerError::UnknownEntry(description.to_string()))?;
        if let Some(holder) = session.holder_of(entry.description()) {
            return Err(TaggerError::DuplicateEntry {
                description: entry.description().to_string(),
                holder: holder.current_path.clone(),
            });
        }

        let resolution = self
            .resolver
            .resolve(Some(&entry), &before.current_path, &before.original_path)?;

        let mut after = before.clone();
        after.status = Status::Tagged;
        after.assigned_entry = Some(entry.description().to_string());
        let motion = if resolution.no_op {
            debug!("{:?} already named for '{}'", before.current_path, entry.description());
            Motion::Stay
        } else {
            Motion::MoveTo(resolution.path)
        };

        let record = self.commit(&mut session, &before, after, motion)?;
        info!("Tagged {:?} as '{}'", record.original_path, entry.description());
        Ok(record)
    }

    /// Rename an image to its `untagged_` name without assigning an entry
    pub fn skip(&self, image: &Path) -> Result<ImageRecord> {
        let mut session = self.lock()?;
        let before = lookup(&session, image)?;

        if before.status == Status::Tagged {
            return Err(TaggerError::InvalidTransition {
                action: "skip",
                status: before.status.to_string(),
            });
        }
        let resolution = self
            .resolver
            .resolve(None, &before.current_path, &before.original_path)?;

        let mut after = before.clone();
        after.status = Status::Untagged;
        let motion = if resolution.no_op {
            Motion::Stay
        } else {
            Motion::MoveTo(resolution.path)
        };
        self.commit(&mut session, &before, after, motion)
    }

    /// Flag an image as unidentified; on a flagged image this clears the flag
    pub fn mark_unknown(&self, image: &Path) -> Result<ImageRecord> {
        let mut session = self.lock()?;
        let before = lookup(&session, image)?;

        let mut after = before.clone();
        match before.status {
            Status::Untagged | Status::Tagged => {
                after.status = Status::DontKnow;
                after.assigned_entry = None;
            }
            Status::DontKnow => after.status = Status::Untagged,
        }
        let record = self.commit(&mut session, &before, after, Motion::Stay)?;
        info!("{:?} is now {}", record.original_path, record.status);
        Ok(record)
    }

    /// Clear the don't-know flag
    pub fn unmark(&self, image: &Path) -> Result<ImageRecord> {
        let mut session = self.lock()?;
        let before = lookup(&session, image)?;

        if before.status != Status::DontKnow {
            return Err(TaggerError::InvalidTransition {
                action: "unmark",
                status: before.status.to_string(),
            });
        }
        let mut after = before.clone();
        after.status = Status::Untagged;
        self.commit(&mut session, &before, after, Motion::Stay)
    }

    /// Revert the most recent rename; the image ends up untagged
    pub fn undo_tag(&self, image: &Path) -> Result<ImageRecord> {
        let mut session = self.lock()?;
        let before = lookup(&session, image)?;

        self.executor.undo_target(&before)?;

        let mut after = before.clone();
        after.status = Status::Untagged;
        after.assigned_entry = None;
        let record = self.commit(&mut session, &before, after, Motion::Revert)?;
        info!("Undid rename of {:?}, back at {:?}", record.original_path, record.current_path);
        Ok(record)
    }

    pub fn current_status(&self, image: &Path) -> Result<Status> {
        let session = self.lock()?;
        Ok(lookup(&session, image)?.status)
    }

    pub fn record(&self, image: &Path) -> Result<ImageRecord> {
        let session = self.lock()?;
        lookup(&session, image)
    }

    pub fn records(&self) -> Result<Vec<ImageRecord>> {
        Ok(self.lock()?.records().cloned().collect())
    }

    pub fn snapshot(&self) -> Result<ProgressSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    pub fn summary(&self) -> Result<ProgressSummary> {
        Ok(self.lock()?.summary())
    }

    pub fn queue(&self) -> Result<Vec<ImageRecord>> {
        Ok(self.lock()?.queue().into_iter().cloned().collect())
    }

    pub fn available_descriptions(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .available_descriptions()
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Write the current session without changing it
    pub fn persist(&self) -> Result<()> {
        let session = self.lock()?;
        self.store.save(&session.snapshot())
    }

    /// Apply a transition: move if needed, persist, then publish in memory
    fn commit(
        &self,
        session: &mut Session,
        before: &ImageRecord,
        mut after: ImageRecord,
        motion: Motion,
    ) -> Result<ImageRecord> {
        after.updated_at = Some(Utc::now());

        let intent = match &motion {
            Motion::Stay => None,
            Motion::MoveTo(destination) => Some(after.moved_to(destination)),
            Motion::Revert => Some(
                after
                    .reverted()
                    .ok_or_else(|| TaggerError::NoHistory(before.original_path.clone()))?,
            ),
        };
        if let Some(intent) = &intent {
            self.store.save(&session.snapshot_with(before, Some(intent)))?;
        }

        let moved = match &motion {
            Motion::Stay => Ok(()),
            Motion::MoveTo(destination) => self.executor.execute(&mut after, destination).map(drop),
            Motion::Revert => self.executor.undo(&mut after).map(drop),
        };
        if let Err(e) = moved {
            warn!("Move of {:?} failed: {}", before.original_path, e);
            if let Err(clear) = self.store.save(&session.snapshot()) {
                warn!("Could not clear pending move for {:?}: {}", before.original_path, clear);
            }
            return Err(e);
        }

        if let Err(e) = self.store.save(&session.snapshot_with(&after, None)) {
            error!("Saving progress failed after moving {:?}: {}", before.original_path, e);
            if intent.is_some() {
                self.roll_back(&after, before);
            }
            return Err(e);
        }

        session.replace(after.clone());
        Ok(after)
    }

    /// Put the file back where `before` says it is
    fn roll_back(&self, after: &ImageRecord, before: &ImageRecord) {
        let mut restored = after.clone();
        let reverted = if after.rename_history.len() > before.rename_history.len() {
            self.executor.undo(&mut restored)
        } else {
            self.executor.execute(&mut restored, &before.current_path)
        };
        match reverted {
            Ok(path) => info!("Restored {:?} to {:?}", before.original_path, path),
            Err(e) => error!(
                "Could not restore {:?} to {:?}: {}",
                after.current_path, before.current_path, e
            ),
        }
    }
}

fn lookup(session: &Session, image: &Path) -> Result<ImageRecord> {
    session
        .record(image)
        .cloned()
        .ok_or_else(|| TaggerError::UnknownImage(image.to_path_buf()))
}

/// Engine handle for async front ends; each call runs whole on a blocking thread
pub struct SharedEngine<S, F = LocalFs> {
    inner: Arc<TaggingEngine<S, F>>,
}

impl<S, F> Clone for SharedEngine<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, F> SharedEngine<S, F>
where
    S: ProgressStore + 'static,
    F: Filesystem + 'static,
{
    pub fn new(engine: TaggingEngine<S, F>) -> Self {
        Self {
            inner: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &TaggingEngine<S, F> {
        &self.inner
    }

    pub async fn tag(&self, image: PathBuf, description: String) -> Result<ImageRecord> {
        let engine = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || engine.tag(&image, &description)).await?
    }

    pub async fn skip(&self, image: PathBuf) -> Result<ImageRecord> {
        let engine = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || engine.skip(&image)).await?
    }

    pub async fn mark_unknown(&self, image: PathBuf) -> Result<ImageRecord> {
        let engine = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || engine.mark_unknown(&image)).await?
    }

    pub async fn unmark(&self, image: PathBuf) -> Result<ImageRecord> {
        let engine = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || engine.unmark(&image)).await?
    }

    pub async fn undo_tag(&self, image: PathBuf) -> Result<ImageRecord> {
        let engine = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || engine.undo_tag(&image)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogStore, RawRow};
    use crate::config::NamingConfig;
    use crate::progress::JsonProgressStore;
    use std::fs;

    fn engine(dir: &Path, names: &[&str]) -> (TaggingEngine<JsonProgressStore>, Vec<PathBuf>) {
        let images = dir.join("Images");
        fs::create_dir_all(&images).unwrap();
        let paths: Vec<PathBuf> = names
            .iter()
            .map(|n| {
                let p = images.join(n);
                fs::write(&p, n.as_bytes()).unwrap();
                p
            })
            .collect();
        let catalog = CatalogStore::load(vec![
            RawRow {
                description: Some("Blue Teapot".into()),
                object_number: Some("SSESM.2019.45".into()),
                ..RawRow::default()
            },
            RawRow {
                description: Some("Clock".into()),
                location: Some("Room A/Shelf 2".into()),
                ..RawRow::default()
            },
        ])
        .store;
        let session = Session::fresh(catalog, paths.clone());
        let store = JsonProgressStore::new(dir.join("progress.json"));
        let resolver = PathResolver::new(dir.to_path_buf(), NamingConfig::default());
        (TaggingEngine::new(session, store, resolver), paths)
    }

    #[test]
    fn test_tag_renames_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);

        let record = engine.tag(&paths[0], "Blue Teapot").unwrap();
        let expected = dir.path().join("SSESM.2019.45").join("SSESM.2019.45 Blue Teapot.jpg");
        assert_eq!(record.current_path, expected);
        assert!(expected.exists());
        assert_eq!(engine.current_status(&paths[0]).unwrap(), Status::Tagged);

        let saved = JsonProgressStore::new(dir.path().join("progress.json")).load().unwrap();
        let persisted = saved.get(&paths[0]).unwrap();
        assert_eq!(persisted.current_path, expected);
        assert_eq!(persisted.assigned_entry_description.as_deref(), Some("Blue Teapot"));
        assert!(persisted.pending_move.is_none());
    }

    #[test]
    fn test_tag_with_held_entry_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg", "IMG002.jpg"]);
        engine.tag(&paths[0], "Blue Teapot").unwrap();

        let err = engine.tag(&paths[1], "Blue Teapot").unwrap_err();
        assert!(matches!(err, TaggerError::DuplicateEntry { .. }));
        assert_eq!(engine.current_status(&paths[1]).unwrap(), Status::Untagged);
        assert!(paths[1].exists());
    }

    #[test]
    fn test_tag_twice_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);
        engine.tag(&paths[0], "Blue Teapot").unwrap();
        assert!(matches!(
            engine.tag(&paths[0], "Clock"),
            Err(TaggerError::InvalidTransition { action: "tag", .. })
        ));
    }

    #[test]
    fn test_unknown_entry_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);
        assert!(matches!(engine.tag(&paths[0], "Nope"), Err(TaggerError::UnknownEntry(_))));
        assert!(matches!(
            engine.tag(Path::new("ghost.jpg"), "Clock"),
            Err(TaggerError::UnknownImage(_))
        ));
    }

    #[test]
    fn test_mark_unknown_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);

        assert_eq!(engine.mark_unknown(&paths[0]).unwrap().status, Status::DontKnow);
        assert_eq!(engine.mark_unknown(&paths[0]).unwrap().status, Status::Untagged);
        assert!(matches!(
            engine.unmark(&paths[0]),
            Err(TaggerError::InvalidTransition { action: "unmark", .. })
        ));
        engine.mark_unknown(&paths[0]).unwrap();
        assert_eq!(engine.unmark(&paths[0]).unwrap().status, Status::Untagged);
        assert!(paths[0].exists());
    }

    #[test]
    fn test_mark_unknown_releases_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg", "IMG002.jpg"]);
        engine.tag(&paths[0], "Blue Teapot").unwrap();

        let flagged = engine.mark_unknown(&paths[0]).unwrap();
        assert_eq!(flagged.assigned_entry, None);
        assert!(flagged.current_path.exists());
        assert!(engine.available_descriptions().unwrap().contains(&"Blue Teapot".to_string()));

        let second = engine.tag(&paths[1], "Blue Teapot").unwrap();
        assert!(second.current_path.to_string_lossy().ends_with("Blue Teapot_1.jpg"));
    }

    #[test]
    fn test_undo_tag_restores_path() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);
        engine.tag(&paths[0], "Clock").unwrap();

        let record = engine.undo_tag(&paths[0]).unwrap();
        assert_eq!(record.current_path, paths[0]);
        assert!(record.rename_history.is_empty());
        assert_eq!(record.status, Status::Untagged);
        assert_eq!(record.assigned_entry, None);
        assert!(paths[0].exists());
    }

    #[test]
    fn test_undo_without_history_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);
        engine.mark_unknown(&paths[0]).unwrap();
        let before = engine.record(&paths[0]).unwrap();

        assert!(matches!(engine.undo_tag(&paths[0]), Err(TaggerError::NoHistory(_))));
        assert_eq!(engine.record(&paths[0]).unwrap(), before);
    }

    #[test]
    fn test_skip_renames_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);

        let record = engine.skip(&paths[0]).unwrap();
        assert_eq!(record.current_path, dir.path().join("Images").join("untagged_IMG001.jpg"));
        assert_eq!(record.status, Status::Untagged);

        // Already there: no second rename, no second history frame.
        let again = engine.skip(&paths[0]).unwrap();
        assert_eq!(again.rename_history.len(), 1);
    }

    #[test]
    fn test_shared_engine_offloads() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, paths) = engine(dir.path(), &["IMG001.jpg"]);
        let shared = SharedEngine::new(engine);

        let handle = shared.clone();
        let record = tokio_test::block_on(handle.tag(paths[0].clone(), "Clock".to_string())).unwrap();
        assert_eq!(record.status, Status::Tagged);
        assert_eq!(shared.engine().summary().unwrap().tagged, 1);

        let flagged = tokio_test::block_on(shared.mark_unknown(paths[0].clone())).unwrap();
        assert_eq!(flagged.status, Status::DontKnow);
    }
}
