use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;

use cairn::Cairn;
use cairn_core::schema::CollectionSchema;
use cairn_runtime::store::{MemoryStore, SchemaStore};

use super::{header, Target};

/// Inspect or seed collections.
#[derive(Subcommand)]
pub enum CollectionsCommand {
    /// Insert or replace collections from a JSON export.
    Import {
        /// File holding a JSON array of collections.
        file: PathBuf,
    },

    /// List collections.
    List,
}

impl CollectionsCommand {
    pub async fn execute(self, cairn: &Cairn, target: Target<'_>) -> Result<()> {
        match target {
            Target::Snapshot(path) => self.run(MemoryStore::open(path).await?).await,
            Target::Database => self.run(cairn.connect_store().await?).await,
        }
    }

    async fn run<S: SchemaStore>(self, mut store: S) -> Result<()> {
        store.ensure_tables().await?;

        match self {
            CollectionsCommand::Import { file } => {
                header("Collections");

                let collections = read_collections(&file)?;
                store.import_collections(&collections).await?;

                for collection in &collections {
                    println!(
                        "  {} Imported: {} ({})",
                        style("✓").green(),
                        collection.name,
                        collection.id
                    );
                }
                println!();
            }

            CollectionsCommand::List => {
                header("Collections");

                let collections = store.load_collections().await?;
                if collections.is_empty() {
                    println!("  {} No collections", style("ℹ").blue());
                    return Ok(());
                }

                for collection in &collections {
                    println!(
                        "  {} {} {} {}",
                        style(&collection.name).cyan(),
                        style(&collection.id).dim(),
                        style(collection.kind).yellow(),
                        style(format!("{} fields", collection.fields.len())).dim()
                    );
                }
                println!();
            }
        }

        Ok(())
    }
}

/// Read and validate a collections export.
fn read_collections(path: &Path) -> Result<Vec<CollectionSchema>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let collections: Vec<CollectionSchema> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid collections file {}", path.display()))?;

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for collection in &collections {
        collection.validate()?;
        if !ids.insert(collection.id.as_str()) || !names.insert(collection.name.as_str()) {
            anyhow::bail!(
                "Collection {} ({}) appears more than once",
                collection.name,
                collection.id
            );
        }
    }

    Ok(collections)
}
