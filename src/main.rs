// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalogue Tagger CLI
//!
//! Tags images in the configured folder with catalogue entries, one command
//! per action, resuming from the progress file every time.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use catalogue_tagger::config::AppConfig;
use catalogue_tagger::startup::{self, Startup};
use catalogue_tagger::{ImageRecord, Result, SharedEngine, Status, TaggerError};

/// Catalogue Tagger - file museum photographs under their catalogue entries
#[derive(Parser, Debug)]
#[command(name = "catalogue-tagger")]
#[command(version)]
#[command(about = "Catalogue-driven image tagger and renamer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show tagging progress
    Status,

    /// List tracked images
    List {
        /// Only images with this status
        #[arg(short, long, value_parser = ["untagged", "tagged", "dont_know"])]
        status: Option<String>,
    },

    /// Show the next images to work on
    Next {
        /// Number of images to show
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Tag an image with a catalogue description
    Tag {
        /// Image path, or file name inside the image folder
        image: PathBuf,

        /// Catalogue description
        description: String,
    },

    /// Rename an image to untagged_<name> without a catalogue entry
    Skip {
        image: PathBuf,
    },

    /// Mark an image as "don't know" (again to clear)
    Unknown {
        image: PathBuf,
    },

    /// Clear the "don't know" mark
    Unmark {
        image: PathBuf,
    },

    /// Undo the last rename of an image
    Undo {
        image: PathBuf,
    },

    /// List catalogue descriptions not yet used
    Descriptions,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Initialize a new tagging folder
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        Some(command) => run_session_command(&config, command, &cli.format).await,
        None => run_session_command(&config, Commands::Status, &cli.format).await,
    }
}

/// Commands that open the tagging session
async fn run_session_command(config: &AppConfig, command: Commands, format: &str) -> Result<()> {
    let Startup { engine, rejected_rows, recovered_from } = startup::open(config)?;

    for rejected in &rejected_rows {
        warn!("Catalogue row skipped: {}", rejected);
    }
    if let Some(e) = &recovered_from {
        eprintln!("Warning: {}. Previous progress was set aside; this is a fresh session.", e);
        engine.persist()?;
    }

    let engine = SharedEngine::new(engine);
    let image = |path: &Path| image_arg(config, path);

    match command {
        Commands::Status => {
            let summary = engine.engine().summary()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Images: {}", summary.total);
                println!("  Tagged:     {}", summary.tagged);
                println!("  Untagged:   {}", summary.untagged);
                println!("  Don't know: {}", summary.dont_know);
                if summary.missing > 0 {
                    println!("  Missing:    {}", summary.missing);
                }
            }
        }
        Commands::List { status } => {
            let records: Vec<ImageRecord> = engine
                .engine()
                .records()?
                .into_iter()
                .filter(|r| status.as_deref().map_or(true, |s| status_name(r.status) == s))
                .collect();
            print_records(&records, format)?;
        }
        Commands::Next { count } => {
            let queue: Vec<ImageRecord> = engine.engine().queue()?.into_iter().take(count).collect();
            if queue.is_empty() && format == "text" {
                println!("Nothing left to tag");
            } else {
                print_records(&queue, format)?;
            }
        }
        Commands::Tag { image: path, description } => {
            let record = engine.tag(image(&path), description).await?;
            print_outcome(&record, format)?;
        }
        Commands::Skip { image: path } => {
            let record = engine.skip(image(&path)).await?;
            print_outcome(&record, format)?;
        }
        Commands::Unknown { image: path } => {
            let record = engine.mark_unknown(image(&path)).await?;
            print_outcome(&record, format)?;
        }
        Commands::Unmark { image: path } => {
            let record = engine.unmark(image(&path)).await?;
            print_outcome(&record, format)?;
        }
        Commands::Undo { image: path } => {
            let record = engine.undo_tag(image(&path)).await?;
            print_outcome(&record, format)?;
        }
        Commands::Descriptions => {
            let descriptions = engine.engine().available_descriptions()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&descriptions)?);
            } else {
                for d in &descriptions {
                    println!("{}", d);
                }
            }
        }
        Commands::Config { .. } | Commands::Init { .. } => {
            return Err(TaggerError::Config("not a session command".to_string()));
        }
    }

    Ok(())
}

/// Bare file names refer to the image folder
fn image_arg(config: &AppConfig, path: &Path) -> PathBuf {
    let bare = path.parent().map_or(true, |p| p.as_os_str().is_empty());
    if bare && !path.exists() {
        config.image_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Untagged => "untagged",
        Status::Tagged => "tagged",
        Status::DontKnow => "dont_know",
    }
}

fn record_json(record: &ImageRecord) -> serde_json::Value {
    serde_json::json!({
        "originalPath": record.original_path.to_string_lossy(),
        "currentPath": record.current_path.to_string_lossy(),
        "status": status_name(record.status),
        "assignedEntryDescription": record.assigned_entry,
        "renames": record.rename_history.len(),
        "missing": record.missing,
    })
}

fn print_records(records: &[ImageRecord], format: &str) -> Result<()> {
    if format == "json" {
        let output: Vec<serde_json::Value> = records.iter().map(record_json).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    for record in records {
        let entry = record.assigned_entry.as_deref().unwrap_or("-");
        let missing = if record.missing { " [MISSING]" } else { "" };
        println!(
            "{:<10} {} ({}){}",
            record.status.to_string(),
            record.current_path.display(),
            entry,
            missing
        );
    }
    Ok(())
}

fn print_outcome(record: &ImageRecord, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&record_json(record))?);
    } else {
        println!("{}: {} -> {}", record.original_path.display(), record.status, record.current_path.display());
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Images: {:?}", config.image_dir);
            println!("  Catalogue: {:?}", config.catalogue_file);
            println!("  Progress: {:?}", config.progress_file);
        }
    }

    Ok(())
}

/// Initialize a new tagging folder
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(TaggerError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    let config = AppConfig::default();
    std::fs::create_dir_all(target.join(&config.image_dir))?;
    let catalogue = target.join(&config.catalogue_file);
    if !catalogue.exists() {
        std::fs::write(&catalogue, "[]\n")?;
    }
    config.save(&config_path)?;
    info!("Initialized {:?}", target);

    println!("Initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - {}/", config.image_dir.display());
    println!("  - {}", config.catalogue_file.display());
    println!("\nNext steps:");
    println!("  1. Put photographs in {}/", config.image_dir.display());
    println!("  2. Fill {} with catalogue rows", config.catalogue_file.display());
    println!("  3. Run: catalogue-tagger next");

    Ok(())
}
