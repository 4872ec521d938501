//! `revkb config` command
//!
//! Get or set configuration values.
//!
//! # Usage
//! ```bash
//! revkb config                      # Show all config
//! revkb config user.name            # Get specific value
//! revkb config user.name "alice"    # Set value
//! revkb config core.auto_apply true
//! revkb config --global display.search_limit 50
//! revkb --config team.toml config user.name   # Explicit file (or REVKB_CONFIG)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{Config, REPO_DIR};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config key (e.g., user.name, core.default_kind)
    pub key: Option<String>,

    /// Value to set
    pub value: Option<String>,

    /// List all config values
    #[arg(long)]
    pub list: bool,

    /// Edit config file in $EDITOR
    #[arg(short, long)]
    pub edit: bool,

    /// Show config file path
    #[arg(long)]
    pub path: bool,

    /// Use global config (~/.revkb/config.toml) instead of local
    #[arg(short, long)]
    pub global: bool,
}

/// Known keys and the TOML type of their values
const KEYS: &[(&str, ValueKind)] = &[
    ("user.name", ValueKind::String),
    ("core.auto_apply", ValueKind::Bool),
    ("core.default_kind", ValueKind::String),
    ("display.history_limit", ValueKind::Integer),
    ("display.search_limit", ValueKind::Integer),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Bool,
    Integer,
}

fn value_kind(key: &str) -> Result<ValueKind> {
    KEYS.iter()
        .find(|(known, _)| *known == key)
        .map(|(_, kind)| *kind)
        .with_context(|| {
            let known: Vec<&str> = KEYS.iter().map(|(k, _)| *k).collect();
            format!("Unknown config key: {}. Known keys: {}", key, known.join(", "))
        })
}

/// Config file to read and write: `--config`/`REVKB_CONFIG` wins unless
/// `--global` is given, then the local repository, then `./.revkb`
fn get_config_path(global: bool, explicit: Option<&Path>) -> Result<PathBuf> {
    if let (false, Some(path)) = (global, explicit) {
        return Ok(path.to_path_buf());
    }
    if global {
        Config::global_config_path().context("Could not determine home directory")
    } else {
        Ok(Config::find_repo_dir()
            .unwrap_or_else(|| PathBuf::from(REPO_DIR))
            .join("config.toml"))
    }
}

pub fn run(args: ConfigArgs, explicit: Option<&Path>) -> Result<()> {
    let config_path = get_config_path(args.global, explicit)?;

    if args.path {
        println!("Global: {}", get_config_path(true, None)?.display());
        println!("Local:  {}", get_config_path(false, None)?.display());
        if let Some(path) = explicit {
            println!("Explicit: {}", path.display());
        }
        println!();
        if config_path.exists() {
            println!("✓ Active: {}", config_path.display());
        } else {
            println!("⚠ No config file found at {}", config_path.display());
        }
        return Ok(());
    }

    if args.edit {
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

        if !config_path.exists() {
            Config::default().save_to(&config_path)?;
            println!("Created {}", config_path.display());
        }

        std::process::Command::new(&editor)
            .arg(&config_path)
            .status()
            .with_context(|| format!("Failed to open editor: {}", editor))?;
        return Ok(());
    }

    if args.list || (args.key.is_none() && args.value.is_none()) {
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            println!("📋 Configuration ({}):\n", config_path.display());
            println!("{}", content);
        } else {
            println!("📋 No config file at {}", config_path.display());
            println!();
            println!("Create one with:");
            println!("  revkb init");
            println!("  revkb config user.name \"Your Name\"");
        }
        return Ok(());
    }

    if let Some(key) = &args.key {
        if let Some(value) = &args.value {
            set_config_value(&config_path, key, value)?;
            println!("✅ Set {} = {} (in {})", key, value, config_path.display());
        } else {
            match get_config_value(&config_path, key)? {
                Some(v) => println!("{}", v),
                None => println!("(not set)"),
            }
        }
    }

    Ok(())
}

/// Set a config value using dot notation (e.g., "core.auto_apply").
///
/// The file is left untouched if the result would no longer load.
fn set_config_value(path: &Path, key: &str, val: &str) -> Result<()> {
    use toml_edit::{value, DocumentMut};

    let new_value = parse_toml_value(value_kind(key)?, val)
        .with_context(|| format!("Invalid value for {}: {}", key, val))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content.parse().context("Failed to parse config.toml")?;

    let Some((section, name)) = key.split_once('.') else {
        anyhow::bail!("Config keys are section.key: {}", key);
    };
    if doc.get(section).is_none() {
        doc[section] = toml_edit::table();
    }
    doc[section][name] = value(new_value);

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated)
        .with_context(|| format!("Invalid value for {}: {}", key, val))?;

    fs::write(path, updated)?;
    Ok(())
}

/// Get a config value by dot notation key
fn get_config_value(path: &Path, key: &str) -> Result<Option<String>> {
    value_kind(key)?;
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let doc: toml::Value = content.parse().context("Failed to parse config.toml")?;

    let parts: Vec<&str> = key.split('.').collect();
    let val = match parts.as_slice() {
        [name] => doc.get(name),
        [section, name] => doc.get(section).and_then(|t| t.get(name)),
        _ => None,
    };

    Ok(val.map(|v| match v {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Parse a command-line value as the TOML type the key expects
fn parse_toml_value(kind: ValueKind, s: &str) -> Result<toml_edit::Value> {
    Ok(match kind {
        ValueKind::String => s.into(),
        ValueKind::Bool => s
            .parse::<bool>()
            .with_context(|| format!("Expected true or false, got '{}'", s))?
            .into(),
        ValueKind::Integer => s
            .parse::<i64>()
            .with_context(|| format!("Expected a whole number, got '{}'", s))?
            .into(),
    })
}
