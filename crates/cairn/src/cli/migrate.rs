use anyhow::Result;
use clap::Subcommand;
use console::style;

use cairn::Cairn;
use cairn_runtime::migrations::{CheckOutcome, MigrationRunner};
use cairn_runtime::store::{MemoryStore, SchemaStore};

use super::{header, Target};

/// Manage schema migrations.
#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations.
    Up,

    /// Revert the last N migrations.
    Down {
        /// Number of migrations to revert.
        #[arg(default_value = "1")]
        count: usize,
    },

    /// Show migration status.
    Status,

    /// Apply and revert every pending migration in memory, without writing.
    Check,
}

impl MigrateCommand {
    pub async fn execute(self, cairn: &Cairn, target: Target<'_>) -> Result<()> {
        match target {
            Target::Snapshot(path) => {
                let store = MemoryStore::open(path).await?;
                self.run(cairn.runner(store)).await
            }
            Target::Database => {
                let store = cairn.connect_store().await?;
                self.run(cairn.runner(store)).await
            }
        }
    }

    async fn run<S: SchemaStore>(self, mut runner: MigrationRunner<S>) -> Result<()> {
        match self {
            MigrateCommand::Up => {
                header("Migrations");

                if runner.registry().is_empty() {
                    println!("  {} No migrations registered", style("ℹ").blue());
                    return Ok(());
                }

                println!("  {} Running pending migrations...", style("→").dim());
                let report = runner.run_pending().await?;

                for id in &report.applied {
                    println!("  {} Applied: {}", style("✓").green(), id);
                }
                println!(
                    "  {} {} applied, {} already up to date",
                    style("✓").green(),
                    report.applied.len(),
                    report.skipped
                );
                println!();
            }

            MigrateCommand::Down { count } => {
                header("Migrations");

                if count == 0 {
                    println!("  {} Nothing to revert (count=0)", style("ℹ").blue());
                    return Ok(());
                }

                println!(
                    "  {} Reverting {} migration(s)...",
                    style("→").dim(),
                    count
                );

                let reverted = runner.revert_last(count).await?;

                if reverted.is_empty() {
                    println!("  {} No migrations to revert", style("ℹ").blue());
                } else {
                    for id in &reverted {
                        println!("  {} Reverted: {}", style("✓").green(), id);
                    }
                    println!();
                    println!(
                        "  {} Reverted {} migration(s)",
                        style("✓").green(),
                        reverted.len()
                    );
                }
                println!();
            }

            MigrateCommand::Status => {
                header("Migration Status");

                let status = runner.status().await?;

                if status.applied.is_empty() && status.pending.is_empty() {
                    println!("  {} No migrations found", style("ℹ").blue());
                    return Ok(());
                }

                if !status.applied.is_empty() {
                    println!("  {} Applied:", style("✓").green());
                    for m in &status.applied {
                        let marker = if m.registered {
                            style("↓").green().to_string()
                        } else {
                            style("?").red().to_string()
                        };
                        println!(
                            "    {} {} {} ({})",
                            marker,
                            style(&m.identifier).cyan(),
                            style("at").dim(),
                            m.applied_at.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                }

                if !status.pending.is_empty() {
                    if !status.applied.is_empty() {
                        println!();
                    }
                    println!("  {} Pending:", style("○").yellow());
                    for id in &status.pending {
                        println!("    {} {}", style("→").dim(), style(id).yellow());
                        if let Some(migration) = runner.registry().get(id) {
                            for line in migration.describe_up() {
                                println!("        {}", style(line).dim());
                            }
                        }
                    }
                }

                println!();
                println!(
                    "  {} {} applied, {} pending",
                    style("ℹ").blue(),
                    status.applied.len(),
                    status.pending.len()
                );
                println!();

                println!(
                    "  {} = revertible, {} = not registered in this build",
                    style("↓").green(),
                    style("?").red()
                );
                println!();
            }

            MigrateCommand::Check => {
                header("Migration Check");

                let report = runner.check().await?;

                if report.entries.is_empty() {
                    println!("  {} No pending migrations", style("ℹ").blue());
                    return Ok(());
                }

                for entry in &report.entries {
                    match &entry.outcome {
                        CheckOutcome::RoundTrip => {
                            println!("  {} {}", style("✓").green(), entry.identifier);
                        }
                        CheckOutcome::NotReversible { collections } => println!(
                            "  {} {} does not restore: {}",
                            style("✗").red(),
                            entry.identifier,
                            collections.join(", ")
                        ),
                        CheckOutcome::ApplyFailed(e) => println!(
                            "  {} {} failed to apply: {}",
                            style("✗").red(),
                            entry.identifier,
                            e
                        ),
                        CheckOutcome::RevertFailed(e) => println!(
                            "  {} {} failed to revert: {}",
                            style("✗").red(),
                            entry.identifier,
                            e
                        ),
                    }
                }
                println!();

                if !report.is_ok() {
                    anyhow::bail!("migration check failed");
                }
            }
        }

        Ok(())
    }
}
