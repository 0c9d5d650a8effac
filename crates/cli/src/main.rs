use std::path::PathBuf;

use anyhow::Context;
use bookshelf_db::Database;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Bookshelf service and maintenance commands
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    /// Directory holding base.toml and the per-environment files
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to load (local, staging, production)
    #[arg(long = "env", global = true)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Print the resolved configuration as JSON, secrets redacted
    Config,
    /// Connect to the database and run a health check
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_with(cli.config_dir.as_deref(), cli.environment.as_deref())
        .context("failed to load bookshelf settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "bookshelf CLI serving");
            bookshelf_app::run(settings).await
        }
        // No telemetry here so stdout stays machine readable.
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings.redacted())
                .context("failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Ping => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            let database = Database::connect(&settings.database).await?;
            database.health().await?;
            println!(
                "database reachable at {}",
                bookshelf_db::sanitize_url(&settings.database.endpoint)
            );
            Ok(())
        }
    }
}
