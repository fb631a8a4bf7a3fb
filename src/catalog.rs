// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalogue entries keyed by description
//!
//! Rows arrive already trimmed by whatever read the spreadsheet; the store
//! only drops rows without a description, rejects duplicates and overlong
//! imported descriptions, and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::{Result, TaggerError};

/// Longest imported description accepted from the catalogue
pub const MAX_IMPORTED_DESCRIPTION: usize = 50;

/// One row as delivered by the catalogue source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub object_number: Option<String>,
    #[serde(default)]
    pub sticker_number: Option<String>,
    #[serde(default)]
    pub imported_description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A validated catalogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueEntry {
    description: String,
    object_number: Option<String>,
    sticker_number: Option<String>,
    imported_description: Option<String>,
    location: Option<String>,
}

impl CatalogueEntry {
    /// Build an entry, applying the same checks as catalogue loading
    pub fn new(description: &str) -> Result<Self> {
        Self::try_from(RawRow {
            description: Some(description.to_string()),
            ..RawRow::default()
        })
    }

    pub fn with_object_number(mut self, value: &str) -> Self {
        self.object_number = non_empty(Some(value.to_string()));
        self
    }

    pub fn with_sticker_number(mut self, value: &str) -> Self {
        self.sticker_number = non_empty(Some(value.to_string()));
        self
    }

    pub fn with_location(mut self, value: &str) -> Self {
        self.location = non_empty(Some(value.to_string()));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn object_number(&self) -> Option<&str> {
        self.object_number.as_deref()
    }

    pub fn sticker_number(&self) -> Option<&str> {
        self.sticker_number.as_deref()
    }

    pub fn imported_description(&self) -> Option<&str> {
        self.imported_description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl TryFrom<RawRow> for CatalogueEntry {
    type Error = TaggerError;

    fn try_from(row: RawRow) -> Result<Self> {
        let description = non_empty(row.description)
            .ok_or_else(|| TaggerError::Validation("missing description".to_string()))?;

        let imported_description = non_empty(row.imported_description);
        if let Some(imported) = &imported_description {
            if imported.chars().count() > MAX_IMPORTED_DESCRIPTION {
                return Err(TaggerError::Validation(format!(
                    "imported description for '{}' is longer than {} characters",
                    description, MAX_IMPORTED_DESCRIPTION
                )));
            }
        }

        Ok(Self {
            description,
            object_number: non_empty(row.object_number),
            sticker_number: non_empty(row.sticker_number),
            imported_description,
            location: non_empty(row.location),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Result of loading rows: the usable store plus every rejected row
#[derive(Debug)]
pub struct CatalogLoad {
    pub store: CatalogStore,
    pub rejected: Vec<TaggerError>,
}

/// Read-only set of catalogue entries
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    entries: BTreeMap<String, CatalogueEntry>,
}

impl CatalogStore {
    /// Validate and deduplicate rows; the first row for a description wins
    pub fn load(rows: Vec<RawRow>) -> CatalogLoad {
        let mut entries = BTreeMap::new();
        let mut rejected = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            match CatalogueEntry::try_from(row) {
                Ok(entry) => {
                    if entries.contains_key(entry.description()) {
                        warn!("Duplicate catalogue description in row {}: {}", index + 1, entry.description());
                        rejected.push(TaggerError::Validation(format!(
                            "row {}: duplicate description '{}'",
                            index + 1,
                            entry.description()
                        )));
                        continue;
                    }
                    entries.insert(entry.description().to_string(), entry);
                }
                Err(TaggerError::Validation(reason)) => {
                    debug!("Skipping catalogue row {}: {}", index + 1, reason);
                    rejected.push(TaggerError::Validation(format!("row {}: {}", index + 1, reason)));
                }
                Err(other) => rejected.push(other),
            }
        }

        CatalogLoad {
            store: Self { entries },
            rejected,
        }
    }

    /// Read rows from a JSON array file
    pub fn load_json(path: &Path) -> Result<CatalogLoad> {
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<RawRow> = serde_json::from_str(&content)?;
        Ok(Self::load(rows))
    }

    pub fn get(&self, description: &str) -> Option<&CatalogueEntry> {
        self.entries.get(description.trim())
    }

    /// Entries in description order
    pub fn entries(&self) -> impl Iterator<Item = &CatalogueEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
