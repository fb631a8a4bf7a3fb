// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Destination paths for tagged images
//!
//! Naming rules, in order:
//!
//! 1. An entry with an object number goes to
//!    `{root}/{object}/{object} {description}[ #{sticker}][ ({imported})]{ext}`.
//! 2. An entry with only a location goes to `{root}/{location}{ext}`, with
//!    path separators in the location turned into `.`.
//! 3. Anything else stays in its directory as `untagged_{original name}`.
//!
//! Rules 1 and 2 lower-case the extension; rule 3 keeps the original name
//! as it was. A taken destination gets `_1`, `_2`, ... before the
//! extension, or at the end of a name without one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogueEntry;
use crate::config::{AppConfig, NamingConfig};
use crate::{Result, TaggerError};

/// Prefix for images filed without a catalogue entry
pub const UNTAGGED_PREFIX: &str = "untagged_";

/// A computed destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// The image already lives at `path`; nothing should be moved
    pub no_op: bool,
}

/// Computes destination paths
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    naming: NamingConfig,
}

impl PathResolver {
    pub fn new(root: PathBuf, naming: NamingConfig) -> Self {
        Self { root, naming }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.destination_root.clone(), config.naming.clone())
    }

    /// Destination for the image at `current` (first discovered at `original`)
    pub fn resolve(
        &self,
        entry: Option<&CatalogueEntry>,
        current: &Path,
        original: &Path,
    ) -> Result<Resolution> {
        let target = self.target(entry, current, original)?;
        Ok(free_path(&target, current))
    }

    /// Destination before collision handling
    pub fn preferred(
        &self,
        entry: Option<&CatalogueEntry>,
        current: &Path,
        original: &Path,
    ) -> Result<PathBuf> {
        Ok(self.target(entry, current, original)?.path(None))
    }

    fn target(
        &self,
        entry: Option<&CatalogueEntry>,
        current: &Path,
        original: &Path,
    ) -> Result<Target> {
        let ext = current
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        if let Some(entry) = entry {
            if let Some(object) = entry.object_number() {
                let folder = clean_component(object)?;
                let stem = self.catalogued_stem(&folder, entry)?;
                return Ok(Target { dir: self.root.join(&folder), stem, ext });
            }
            if let Some(location) = entry.location() {
                let stem = clean_component(location)?;
                return Ok(Target { dir: self.root.clone(), stem, ext });
            }
        }

        let unusable = || TaggerError::Validation(format!("{:?} has no usable file name", original));
        let name = original.file_name().and_then(|n| n.to_str()).ok_or_else(unusable)?;
        let (stem, ext) = match original.extension().and_then(|e| e.to_str()) {
            Some(ext) => (&name[..name.len() - ext.len() - 1], format!(".{}", ext)),
            None => (name, String::new()),
        };
        Ok(Target {
            dir: current.parent().unwrap_or_else(|| Path::new("")).to_path_buf(),
            stem: format!("{}{}", UNTAGGED_PREFIX, stem),
            ext,
        })
    }

    fn catalogued_stem(&self, object: &str, entry: &CatalogueEntry) -> Result<String> {
        let mut stem = format!("{} {}", object, clean_component(entry.description())?);

        if self.naming.include_sticker {
            if let Some(sticker) = entry.sticker_number() {
                stem.push_str(&format!(" #{}", clean_component(sticker)?));
            }
        }
        if self.naming.include_imported_description {
            if let Some(imported) = entry.imported_description() {
                if imported != entry.description() {
                    stem.push_str(&format!(" ({})", clean_component(imported)?));
                }
            }
        }
        Ok(stem)
    }
}

/// Make catalogue text safe as a single path component
fn clean_component(text: &str) -> Result<String> {
    let clean: String = text
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' | ':' => Some('.'),
            '*' | '?' | '"' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let clean = clean.trim();

    if clean.chars().all(|c| c == '.') {
        return Err(TaggerError::Validation(format!(
            "'{}' does not make a usable file name",
            text
        )));
    }
    Ok(clean.to_string())
}

/// A destination split where collision suffixes go
struct Target {
    dir: PathBuf,
    stem: String,
    /// Empty, or starting with `.`
    ext: String,
}

impl Target {
    fn path(&self, suffix: Option<u64>) -> PathBuf {
        let name = match suffix {
            Some(n) => format!("{}_{}{}", self.stem, n, self.ext),
            None => format!("{}{}", self.stem, self.ext),
        };
        self.dir.join(name)
    }
}

/// First of `stem`, `stem_1`, `stem_2`, ... that is free or already holds
/// the image at `current`
fn free_path(target: &Target, current: &Path) -> Resolution {
    let mut candidate = target.path(None);
    let mut suffix: u64 = 0;

    loop {
        if same_file(&candidate, current) {
            return Resolution { path: candidate, no_op: true };
        }
        if !path_exists(&candidate) {
            return Resolution { path: candidate, no_op: false };
        }
        suffix += 1;
        candidate = target.path(Some(suffix));
    }
}

pub(crate) fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether two paths name the same file on disk
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::metadata(a), fs::metadata(b)) {
        #[cfg(unix)]
        (Ok(ma), Ok(mb)) => {
            use std::os::unix::fs::MetadataExt;
            ma.dev() == mb.dev() && ma.ino() == mb.ino()
        }
        #[cfg(not(unix))]
        (Ok(_), Ok(_)) => match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(ca), Ok(cb)) => ca == cb,
            _ => false,
        },
        _ => false,
    }
}
