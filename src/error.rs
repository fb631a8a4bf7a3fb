// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for the tagger

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tagger operations
pub type Result<T> = std::result::Result<T, TaggerError>;

/// Tagger error types
#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid catalogue entry: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Destination already exists: {0:?}")]
    Conflict(PathBuf),

    #[error("Entry '{description}' is already assigned to {holder:?}")]
    DuplicateEntry { description: String, holder: PathBuf },

    #[error("No rename history for {0:?}")]
    NoHistory(PathBuf),

    #[error("Current file is missing: {0:?}")]
    TargetMissing(PathBuf),

    #[error("Progress file is corrupt: {0}")]
    CorruptState(String),

    #[error("Unknown image: {0:?}")]
    UnknownImage(PathBuf),

    #[error("Unknown catalogue entry: {0}")]
    UnknownEntry(String),

    #[error("Cannot {action} an image that is {status}")]
    InvalidTransition { action: &'static str, status: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session lock poisoned")]
    LockPoisoned,

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
