//! cairn - collection-schema migrations for the trail-sharing app.
//!
//! Bundles the app's migrations and assembles them, together with any
//! migration files and programmatic units, into a registry that runs
//! against PostgreSQL or a local snapshot.

pub mod migrations;
mod runtime;

// Re-export the building blocks for programmatic migrations
pub use cairn_runtime::migrations::{Migration, MigrationId, SchemaSession};

pub use runtime::prelude;
pub use runtime::{Cairn, CairnBuilder};
