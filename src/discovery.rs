// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Finding images to tag

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::Result;

/// Supported images directly inside `dir`, sorted by path
pub fn scan(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!("Created image directory: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && should_process(p) && has_extension(p, extensions))
        .collect();
    images.sort();

    debug!("Found {} images in {:?}", images.len(), dir);
    Ok(images)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Check if a file should be considered at all
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Hidden files, including our own staging files
    if filename.starts_with('.') {
        return false;
    }

    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store"];
    !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", ".hidden.jpg", "c.jpg.part", "Thumbs.db"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let extensions = vec!["jpg".to_string(), "png".to_string()];
        let found = scan(dir.path(), &extensions).unwrap();
        assert_eq!(found, vec![dir.path().join("a.png"), dir.path().join("b.JPG")]);
    }

    #[test]
    fn test_scan_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("Images");
        assert!(scan(&images, &["jpg".to_string()]).unwrap().is_empty());
        assert!(images.is_dir());
    }
}
