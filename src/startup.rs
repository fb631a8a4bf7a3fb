// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Assembling an engine from configuration

use tracing::{info, warn};

use crate::catalog::{CatalogLoad, CatalogStore};
use crate::config::AppConfig;
use crate::discovery;
use crate::engine::TaggingEngine;
use crate::progress::{JsonProgressStore, ProgressStore};
use crate::resolver::PathResolver;
use crate::session::Session;
use crate::{Result, TaggerError};

/// An opened engine plus everything the caller should be told about
pub struct Startup {
    pub engine: TaggingEngine<JsonProgressStore>,
    /// Catalogue rows that were skipped
    pub rejected_rows: Vec<TaggerError>,
    /// Set when saved progress was unreadable and the session started fresh
    pub recovered_from: Option<TaggerError>,
}

pub fn open(config: &AppConfig) -> Result<Startup> {
    let CatalogLoad { store: catalog, rejected } = if config.catalogue_file.exists() {
        CatalogStore::load_json(&config.catalogue_file)?
    } else {
        warn!("Catalogue file {:?} not found, no entries loaded", config.catalogue_file);
        CatalogStore::load(Vec::new())
    };
    info!("Loaded {} catalogue entries ({} rejected)", catalog.len(), rejected.len());

    let images = discovery::scan(&config.image_dir, &config.image_extensions)?;
    let store = JsonProgressStore::new(config.progress_file.clone());

    let (session, recovered_from) = match store.load() {
        Ok(snapshot) if snapshot.is_empty() => (Session::fresh(catalog, images), None),
        Ok(snapshot) => (Session::resume(catalog, images, snapshot), None),
        Err(e @ TaggerError::CorruptState(_)) => {
            warn!("{}; starting a fresh session", e);
            store.quarantine()?;
            (Session::fresh(catalog, images), Some(e))
        }
        Err(e) => return Err(e),
    };

    let engine = TaggingEngine::new(session, store, PathResolver::from_config(config));
    Ok(Startup {
        engine,
        rejected_rows: rejected,
        recovered_from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(root: &std::path::Path) -> AppConfig {
        AppConfig {
            image_dir: root.join("Images"),
            destination_root: root.to_path_buf(),
            catalogue_file: root.join("catalogue.json"),
            progress_file: root.join("progress.json"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_corrupt_progress_starts_fresh_and_warns() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.image_dir).unwrap();
        fs::write(config.image_dir.join("IMG001.jpg"), b"x").unwrap();
        fs::write(&config.progress_file, "{broken").unwrap();

        let startup = open(&config).unwrap();
        assert!(matches!(startup.recovered_from, Some(TaggerError::CorruptState(_))));
        assert_eq!(startup.engine.summary().unwrap().untagged, 1);
        assert!(!config.progress_file.exists());

        let aside = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("progress.json.corrupt-"));
        assert!(aside);
    }

    #[test]
    fn test_rejected_rows_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        fs::write(
            &config.catalogue_file,
            r#"[{"description": "Pot"}, {"description": ""}, {"description": "Pot"}]"#,
        )
        .unwrap();

        let startup = open(&config).unwrap();
        assert_eq!(startup.rejected_rows.len(), 2);
        assert_eq!(startup.engine.available_descriptions().unwrap(), vec!["Pot".to_string()]);
    }
}
