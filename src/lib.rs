// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalogue Tagger: files museum object photographs under their catalogue
//! numbers, with per-image undo and sessions that survive restarts.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod executor;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod session;
pub mod startup;

pub use config::AppConfig;
pub use engine::{SharedEngine, TaggingEngine};
pub use error::{Result, TaggerError};
pub use record::{ImageRecord, Status};
