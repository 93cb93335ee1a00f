mod collections;
mod migrate;

pub use collections::CollectionsCommand;
pub use migrate::MigrateCommand;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use cairn::Cairn;
use cairn_core::config::{CairnConfig, LoggingConfig};

/// cairn - schema migrations for the trail-sharing app
#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path.
    #[arg(short, long, default_value = "cairn.toml", global = true)]
    pub config: PathBuf,

    /// Migrations directory path (overrides `[migrations] dir`).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Use a JSON snapshot file instead of PostgreSQL.
    #[arg(short, long, global = true)]
    pub snapshot: Option<PathBuf>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage schema migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),

    /// Inspect or seed collections.
    #[command(subcommand)]
    Collections(CollectionsCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config = self.load_config()?;
        init_logging(&config.observability.logging);

        let mut builder = Cairn::builder().config(config);
        if let Some(dir) = &self.migrations_dir {
            builder = builder.migrations_dir(dir);
        }
        let cairn = builder.build()?;

        let target = match &self.snapshot {
            Some(path) => Target::Snapshot(path),
            None => Target::Database,
        };

        match self.command {
            Commands::Migrate(cmd) => cmd.execute(&cairn, target).await,
            Commands::Collections(cmd) => cmd.execute(&cairn, target).await,
        }
    }

    fn load_config(&self) -> Result<CairnConfig> {
        if self.config.exists() {
            return Ok(CairnConfig::from_file(&self.config)?);
        }

        // Snapshot mode and DATABASE_URL both work without a config file.
        match std::env::var("DATABASE_URL") {
            Ok(url) => Ok(CairnConfig::default_with_database_url(&url)),
            Err(_) if self.snapshot.is_some() => Ok(CairnConfig::default_with_database_url("")),
            Err(_) => anyhow::bail!(
                "Configuration file not found: {}\nCreate one or set DATABASE_URL.",
                self.config.display()
            ),
        }
    }
}

/// Where schema state lives for this invocation.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Database,
    Snapshot(&'a Path),
}

fn header(title: &str) {
    println!();
    println!("  {} {}", style("CAIRN").bold().cyan(), title);
    println!();
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());

    let result = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}
