// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for the tagger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Folder holding the images to tag
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Root under which catalogued images are filed
    #[serde(default = "default_destination_root")]
    pub destination_root: PathBuf,

    /// JSON array of catalogue rows
    #[serde(default = "default_catalogue_file")]
    pub catalogue_file: PathBuf,

    /// Session progress snapshot
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Extensions picked up by discovery (case-insensitive, no dot)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Filename template switches
    #[serde(default)]
    pub naming: NamingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NamingConfig {
    /// Append ` #{sticker}` to catalogued filenames
    #[serde(default = "default_true")]
    pub include_sticker: bool,
    /// Append ` ({imported description})` when it differs from the description
    #[serde(default = "default_true")]
    pub include_imported_description: bool,
}

// Default value functions
fn default_image_dir() -> PathBuf { PathBuf::from("Images") }
fn default_destination_root() -> PathBuf { PathBuf::from(".") }
fn default_catalogue_file() -> PathBuf { PathBuf::from("catalogue.json") }
fn default_progress_file() -> PathBuf { PathBuf::from("progress.json") }
fn default_true() -> bool { true }

fn default_image_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png", "tif", "tiff", "heic"]
        .into_iter().map(String::from).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            destination_root: default_destination_root(),
            catalogue_file: default_catalogue_file(),
            progress_file: default_progress_file(),
            image_extensions: default_image_extensions(),
            naming: NamingConfig::default(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            include_sticker: true,
            include_imported_description: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::TaggerError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.image_extensions.is_empty() {
            return Err(crate::TaggerError::Config(
                "image_extensions must list at least one extension".to_string(),
            ));
        }
        if self.progress_file.as_os_str().is_empty() {
            return Err(crate::TaggerError::Config("progress_file is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.image_dir, PathBuf::from("Images"));
        assert!(config.naming.include_sticker);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"image_dir": "Photos", "naming": {"include_sticker": false}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.image_dir, PathBuf::from("Photos"));
        assert_eq!(config.progress_file, PathBuf::from("progress.json"));
        assert!(!config.naming.include_sticker);
        assert!(config.naming.include_imported_description);
    }

    #[test]
    fn test_empty_extension_list_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"image_extensions": []}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::TaggerError::Config(_))));
    }
}
