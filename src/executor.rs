// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Moving image files with an undo stack
//!
//! Moves are a plain rename when source and destination share a volume.
//! Across volumes the file is copied to a staging name next to the
//! destination, checked against the source, renamed into place, and only
//! then is the source removed. A failed move leaves the source untouched and
//! the record unchanged.

use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::record::ImageRecord;
use crate::resolver::{path_exists, same_file};
use crate::{Result, TaggerError};

/// Filesystem primitives used for moves
pub trait Filesystem: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// Performs and reverts moves for image records
#[derive(Debug, Clone, Default)]
pub struct RenameExecutor<F = LocalFs> {
    fs: F,
}

impl RenameExecutor<LocalFs> {
    pub fn new() -> Self {
        Self { fs: LocalFs }
    }
}

impl<F: Filesystem> RenameExecutor<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self { fs }
    }

    /// Move the image to `destination` and push its old path onto the history
    pub fn execute(&self, record: &mut ImageRecord, destination: &Path) -> Result<PathBuf> {
        let source = record.current_path.clone();
        if same_file(&source, destination) {
            debug!("{:?} already at destination", source);
            return Ok(source);
        }
        if path_exists(destination) {
            warn!("Refusing to overwrite {:?}", destination);
            return Err(TaggerError::Conflict(destination.to_path_buf()));
        }

        self.move_file(&source, destination)?;
        record.rename_history.push(source.clone());
        record.current_path = destination.to_path_buf();
        info!("Renamed {:?} -> {:?}", source, destination);
        Ok(record.current_path.clone())
    }

    /// Where `undo` would put the image, checking its preconditions
    pub fn undo_target(&self, record: &ImageRecord) -> Result<PathBuf> {
        let previous = record
            .rename_history
            .last()
            .ok_or_else(|| TaggerError::NoHistory(record.original_path.clone()))?;
        if !path_exists(&record.current_path) {
            return Err(TaggerError::TargetMissing(record.current_path.clone()));
        }
        if path_exists(previous) && !same_file(previous, &record.current_path) {
            return Err(TaggerError::Conflict(previous.clone()));
        }
        Ok(previous.clone())
    }

    /// Move the image back to its most recent previous path and pop it
    pub fn undo(&self, record: &mut ImageRecord) -> Result<PathBuf> {
        let previous = self.undo_target(record)?;
        let source = record.current_path.clone();

        self.move_file(&source, &previous)?;
        record.rename_history.pop();
        record.current_path = previous.clone();
        info!("Reverted {:?} -> {:?}", source, previous);
        Ok(previous)
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent)?;
        }

        match self.fs.rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                debug!("{:?} and {:?} are on different volumes, copying", from, to);
                self.copy_across(from, to)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn copy_across(&self, from: &Path, to: &Path) -> Result<()> {
        let staging = staging_path_for(to);

        let staged = self
            .fs
            .copy(from, &staging)
            .and_then(|_| verify_same_content(from, &staging))
            .and_then(|_| self.fs.rename(&staging, to));
        if let Err(e) = staged {
            if path_exists(&staging) {
                if let Err(cleanup) = self.fs.remove_file(&staging) {
                    warn!("Could not remove staging file {:?}: {}", staging, cleanup);
                }
            }
            return Err(e.into());
        }

        if let Err(e) = self.fs.remove_file(from) {
            // Keep exactly one copy: the source stays authoritative.
            if let Err(cleanup) = self.fs.remove_file(to) {
                warn!("Could not remove copied file {:?}: {}", to, cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

fn staging_path_for(target: &Path) -> PathBuf {
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".tagmove-{}", uuid::Uuid::new_v4()))
}

/// Compare length and BLAKE3 digest of both files
fn verify_same_content(source: &Path, copy: &Path) -> io::Result<()> {
    let (source_len, source_hash) = file_digest(source)?;
    let (copy_len, copy_hash) = file_digest(copy)?;

    if source_len != copy_len || source_hash != copy_hash {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("copy of {:?} does not match the original", source),
        ));
    }
    Ok(())
}

fn file_digest(path: &Path) -> io::Result<(u64, blake3::Hash)> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let len = io::copy(&mut file, &mut hasher)?;
    Ok((len, hasher.finalize()))
}
