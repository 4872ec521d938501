//! CLI module - Command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

pub mod config;
pub mod create;
pub mod edit;
pub mod history;
pub mod init;
pub mod redirect;
pub mod relate;
pub mod search;
pub mod show;
pub mod stats;
pub mod submission;
pub mod update;
pub mod utils;

/// revkb - collaborative, versioned knowledge base
///
/// Entities change only through revisions; revisions are grouped in edits
/// and become current when their edit is applied.
#[derive(Parser, Debug)]
#[command(name = "revkb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "REVKB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Act as this user instead of `user.name` from the config
    #[arg(short, long, global = true, env = "REVKB_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new revkb repository
    Init(init::InitArgs),

    /// Create a new entity
    Create(create::CreateArgs),

    /// Submit changes to an entity
    Update(update::UpdateArgs),

    /// Show an entity
    Show(show::ShowArgs),

    /// List the revisions of an entity
    History(history::HistoryArgs),

    /// Relate two entities
    Relate(relate::RelateArgs),

    /// Redirect a duplicate entity to another one
    Redirect(redirect::RedirectArgs),

    /// Manage edits
    Edit(edit::EditArgs),

    /// Search entities by alias
    Search(search::SearchArgs),

    /// Show database statistics
    Stats(stats::StatsArgs),

    /// Get or set configuration
    Config(config::ConfigArgs),
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    /// `--user` override
    pub user: Option<String>,
}

impl Context {
    pub fn new(config: Config, user: Option<String>) -> Self {
        Self { config, user }
    }

    /// Name of the acting user
    pub fn user_name(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.config.user.name)
    }
}
