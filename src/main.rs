//! revkb CLI - Entry point
//!
//! Usage: revkb <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use revkb::cli::{self, Cli, Commands, Context};
use revkb::config::Config;

fn main() -> Result<()> {
    let Cli {
        verbose,
        config,
        user,
        command,
    } = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // init and config must work before a valid config exists
    let context = || -> Result<Context> {
        let config = Config::load_with(config.as_deref())?;
        Ok(Context::new(config, user.clone()))
    };

    match command {
        Commands::Init(args) => cli::init::run(args),
        Commands::Config(args) => cli::config::run(args, config.as_deref()),
        Commands::Create(args) => cli::create::run(args, &context()?),
        Commands::Update(args) => cli::update::run(args, &context()?),
        Commands::Show(args) => cli::show::run(args, &context()?),
        Commands::History(args) => cli::history::run(args, &context()?),
        Commands::Relate(args) => cli::relate::run(args, &context()?),
        Commands::Redirect(args) => cli::redirect::run(args, &context()?),
        Commands::Edit(args) => cli::edit::execute(args, &context()?),
        Commands::Search(args) => cli::search::run(args, &context()?),
        Commands::Stats(args) => cli::stats::execute(args, &context()?),
    }
}
