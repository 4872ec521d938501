//! Configuration module
//!
//! Lookup order: local `.revkb/config.toml` (walking up from the current
//! directory), then `~/.revkb/config.toml`, then defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::entity::EntityKind;

/// Name of the repository directory
pub const REPO_DIR: &str = ".revkb";

/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "REVKB_DATABASE";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserConfig {
    /// Editor name recorded on revisions, edits and notes
    #[serde(default = "default_user_name")]
    pub name: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
        }
    }
}

fn default_user_name() -> String {
    "editor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CoreConfig {
    /// Apply edits as soon as `create`/`update`/`relate` finish
    #[serde(default)]
    pub auto_apply: bool,

    /// Kind used by `create` when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_kind: Option<EntityKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    50
}

fn default_search_limit() -> usize {
    20
}

impl Config {
    /// Load config from default locations
    pub fn load() -> Result<Self> {
        if let Some(local) = Self::find_local_config() {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load from an explicit file if given, otherwise from default locations
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find the nearest `.revkb` directory walking up from the current directory
    pub fn find_repo_dir() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let repo = current.join(REPO_DIR);
            if repo.is_dir() {
                return Some(repo);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Find local .revkb/config.toml walking up directories
    pub fn find_local_config() -> Option<PathBuf> {
        Self::find_repo_dir()
            .map(|repo| repo.join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Global repository directory (~/.revkb)
    pub fn global_dir() -> Option<PathBuf> {
        directories::UserDirs::new().map(|u| u.home_dir().join(REPO_DIR))
    }

    /// Get global config path (~/.revkb/config.toml)
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|d| d.join("config.toml"))
    }

    /// Database path with priority:
    /// 1. REVKB_DATABASE env var
    /// 2. Local .revkb/data.db (walking up from CWD)
    /// 3. Global ~/.revkb/data.db
    /// 4. .revkb/data.db in the current directory
    pub fn data_path(&self) -> PathBuf {
        if let Ok(env_path) = std::env::var(DATABASE_ENV) {
            return PathBuf::from(env_path);
        }

        if let Some(repo) = Self::find_repo_dir() {
            return repo.join("data.db");
        }

        if let Some(global) = Self::global_dir() {
            return global.join("data.db");
        }

        PathBuf::from(REPO_DIR).join("data.db")
    }
}
