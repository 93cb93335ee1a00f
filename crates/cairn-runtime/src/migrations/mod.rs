//! Versioned, reversible schema migrations.

mod loader;
mod registry;
mod runner;
mod session;
mod unit;

pub use loader::load_migrations_from_dir;
pub use registry::MigrationRegistry;
pub use runner::{
    AppliedMigration, CheckEntry, CheckOutcome, CheckReport, MigrationRunner, MigrationStatus,
    RunReport,
};
pub use session::SchemaSession;
pub use unit::{AppliedRecord, Migration, MigrationFile, MigrationId, MigrationStep, PatchSet};
