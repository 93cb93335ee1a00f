pub mod db;
pub mod migrations;
pub mod store;

pub use db::Database;
pub use migrations::{
    load_migrations_from_dir, Migration, MigrationId, MigrationRegistry, MigrationRunner,
    SchemaSession,
};
pub use store::{MemoryStore, PgSchemaStore, SchemaStore};
