//! `revkb init` command
//!
//! Initializes a new revkb repository.
//!
//! # Usage
//! ```bash
//! revkb init                    # Initialize in current directory
//! revkb init /path/to/project   # Initialize in specific path
//! revkb init --global           # Initialize global ~/.revkb
//! ```

use anyhow::{bail, Context as _, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use crate::config::{Config, REPO_DIR};
use crate::core::storage::Storage;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Initialize global repository (~/.revkb)
    #[arg(long)]
    pub global: bool,

    /// Force re-initialization (keeps existing data)
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let repo_dir = if args.global {
        Config::global_dir().context("Could not determine home directory")?
    } else {
        args.path
            .unwrap_or_else(|| PathBuf::from("."))
            .join(REPO_DIR)
    };

    if repo_dir.exists() && !args.force {
        bail!(
            "{} already exists. Use --force to reinitialize.",
            repo_dir.display()
        );
    }

    println!("🚀 Initializing revkb in: {}", repo_dir.display());

    fs::create_dir_all(&repo_dir)?;

    let config_path = repo_dir.join("config.toml");
    if !config_path.exists() {
        Config::default().save_to(&config_path)?;
    }

    let db_path = repo_dir.join("data.db");
    let _storage = Storage::open(&db_path)?;

    println!("\n✅ Initialized revkb repository");
    println!("   Config: {}", config_path.display());
    println!("   Database: {}", db_path.display());
    println!("\nNext steps:");
    println!("  revkb config user.name \"Your Name\"");
    println!("  revkb create --kind work -a \"Dune\" --apply");
    println!("  revkb search \"dune\"");

    Ok(())
}
