// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalogue Tagger Undo Utility
//!
//! Walks every renamed image back to the name it was discovered under.

use clap::Parser;
use std::path::PathBuf;

use catalogue_tagger::config::AppConfig;
use catalogue_tagger::startup;
use catalogue_tagger::TaggerError;

#[derive(Parser, Debug)]
#[command(name = "catalogue-tagger-undo")]
#[command(version)]
#[command(about = "Revert Catalogue Tagger renames")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Number of images to revert, most recently changed first (0 for all)
    #[arg(short = 'n', long, default_value = "0")]
    count: usize,

    /// Dry run - show what would be reverted without doing it
    #[arg(long)]
    dry_run: bool,

    /// List renamed images and their history
    #[arg(long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_target(false)
        .init();

    let config = AppConfig::load(&args.config)?;
    let opened = startup::open(&config)?;
    if let Some(e) = opened.recovered_from {
        eprintln!("Progress file was unreadable ({}); nothing to undo.", e);
        return Ok(());
    }
    let engine = opened.engine;

    let mut renamed: Vec<_> = engine
        .records()?
        .into_iter()
        .filter(|r| r.is_renamed())
        .collect();
    renamed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if renamed.is_empty() {
        println!("No renames to undo.");
        return Ok(());
    }

    if args.list {
        println!("Renamed images ({}):", renamed.len());
        println!("{:-<80}", "");
        for (i, record) in renamed.iter().enumerate() {
            let when = record
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:3}. [{}] {}", i + 1, when, record.current_path.display());
            for previous in record.rename_history.iter().rev() {
                println!("       <- {}", previous.display());
            }
        }
        return Ok(());
    }

    let count = if args.count == 0 {
        renamed.len()
    } else {
        args.count.min(renamed.len())
    };

    println!(
        "{}Reverting {} image(s)...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        count
    );

    let mut reverted = 0;
    let mut failed = 0;

    for record in renamed.iter().take(count) {
        let first = record.rename_history.first().unwrap_or(&record.original_path);
        if args.dry_run {
            println!("  Would revert: {} -> {}", record.current_path.display(), first.display());
            continue;
        }

        let mut outcome = Ok(());
        for _ in 0..record.rename_history.len() {
            if let Err(e) = engine.undo_tag(&record.original_path) {
                outcome = Err(e);
                break;
            }
        }

        match outcome {
            Ok(()) => {
                println!("  Reverted: {} -> {}", record.current_path.display(), first.display());
                reverted += 1;
            }
            Err(TaggerError::TargetMissing(path)) => {
                eprintln!("  Skip: {} (file not found, may have been moved/deleted)", path.display());
                failed += 1;
            }
            Err(e) => {
                eprintln!("  Failed: {} ({})", record.current_path.display(), e);
                failed += 1;
            }
        }
    }

    println!();
    if args.dry_run {
        println!("Dry run complete. {} image(s) would be reverted.", count);
    } else {
        println!("Done. {} reverted, {} failed/skipped.", reverted, failed);
    }

    Ok(())
}
