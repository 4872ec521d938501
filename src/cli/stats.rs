//! Stats command - Show database statistics

use clap::Args;

use super::utils::open_storage;
use super::Context;

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute stats command
pub fn execute(args: StatsArgs, ctx: &Context) -> anyhow::Result<()> {
    let storage = open_storage(ctx)?;
    let stats = storage.stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let pending = stats.entities - stats.accepted_entities;
    let edits = stats.open_edits + stats.applied_edits + stats.cancelled_edits;

    println!("📊 Knowledge Base Statistics\n");
    println!("  Entities:         {}", stats.entities);
    println!("  ├── Accepted:     {}", stats.accepted_entities);
    println!("  ├── Pending:      {}", pending);
    println!("  └── Redirects:    {}", stats.redirects);
    println!("  Relationships:    {}", stats.relationships);
    println!("  Revisions:        {}", stats.revisions);
    println!("  Edits:            {}", edits);
    println!("  ├── Open:         {}", stats.open_edits);
    println!("  ├── Applied:      {}", stats.applied_edits);
    println!("  └── Cancelled:    {}", stats.cancelled_edits);
    println!("  Users:            {}", stats.users);

    if let Some(path) = storage.path() {
        println!("\n📁 Database: {}", path.display());
    }

    Ok(())
}
