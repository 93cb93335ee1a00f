//! PostgreSQL-backed schema store with mesh-safe locking.
//!
//! Collections live in a JSONB table, applied migrations in a tracking
//! table. The advisory lock is taken on a dedicated pooled connection and
//! held until released, so only one node migrates at a time.

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use cairn_core::config::MigrationsConfig;
use cairn_core::error::{CairnError, Result};
use cairn_core::schema::CollectionSchema;

use super::SchemaStore;
use crate::migrations::{AppliedRecord, MigrationId};

/// Schema store over a PostgreSQL pool.
pub struct PgSchemaStore {
    pool: PgPool,
    config: MigrationsConfig,
    lock_conn: Option<PoolConnection<Postgres>>,
}

impl PgSchemaStore {
    pub fn new(pool: PgPool, config: MigrationsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool,
            config,
            lock_conn: None,
        })
    }
}

impl SchemaStore for PgSchemaStore {
    async fn acquire_lock(&mut self) -> Result<()> {
        if self.lock_conn.is_some() {
            return Err(CairnError::InvalidState(
                "migration lock is already held".to_string(),
            ));
        }

        debug!("Acquiring migration lock...");
        let mut conn = self.pool.acquire().await.map_err(|e| {
            CairnError::Database(format!("Failed to acquire lock connection: {}", e))
        })?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(self.config.lock_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                CairnError::Database(format!("Failed to acquire migration lock: {}", e))
            })?;
        self.lock_conn = Some(conn);
        debug!("Migration lock acquired");
        Ok(())
    }

    async fn release_lock(&mut self) -> Result<()> {
        let Some(mut conn) = self.lock_conn.take() else {
            return Ok(());
        };

        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.config.lock_id)
            .fetch_one(&mut *conn)
            .await;

        let err = match unlocked {
            Ok(true) => {
                debug!("Migration lock released");
                return Ok(());
            }
            Ok(false) => CairnError::InvalidState(
                "migration lock was not held by the lock session".to_string(),
            ),
            Err(e) => CairnError::Database(format!("Failed to release migration lock: {}", e)),
        };

        // The lock is session-scoped; ending the session drops it server-side.
        if let Err(e) = conn.close().await {
            warn!("Failed to close migration lock connection: {}", e);
        }
        Err(err)
    }

    async fn ensure_tables(&mut self) -> Result<()> {
        for sql in [
            create_collections_table_sql(&self.config.collections_table),
            create_migrations_table_sql(&self.config.table),
        ] {
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    CairnError::Database(format!("Failed to create tracking table: {}", e))
                })?;
        }
        Ok(())
    }

    async fn load_collections(&mut self) -> Result<Vec<CollectionSchema>> {
        let sql = format!(
            "SELECT schema FROM {} ORDER BY created_at, id",
            self.config.collections_table
        );
        let rows: Vec<(Json<CollectionSchema>,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CairnError::Database(format!("Failed to load collections: {}", e)))?;

        Ok(rows.into_iter().map(|(Json(schema),)| schema).collect())
    }

    async fn applied_records(&mut self) -> Result<Vec<AppliedRecord>> {
        let sql = format!(
            "SELECT identifier, applied_at FROM {} ORDER BY applied_at, identifier",
            self.config.table
        );
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CairnError::Database(format!("Failed to get applied migrations: {}", e))
            })?;

        Ok(rows
            .into_iter()
            .map(|(identifier, applied_at)| AppliedRecord::new(identifier.into(), applied_at))
            .collect())
    }

    async fn commit_apply(
        &mut self,
        changed: &[CollectionSchema],
        record: &AppliedRecord,
    ) -> Result<()> {
        let mut tx = begin(&self.pool).await?;
        upsert_collections(&mut tx, &self.config.collections_table, changed).await?;

        let sql = format!(
            "INSERT INTO {} (identifier, applied_at) VALUES ($1, $2)",
            self.config.table
        );
        sqlx::query(&sql)
            .bind(record.identifier.as_str())
            .bind(record.applied_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CairnError::Database(format!(
                    "Failed to record migration '{}': {}",
                    record.identifier, e
                ))
            })?;

        tx.commit().await.map_err(|e| {
            CairnError::Database(format!(
                "Failed to commit migration '{}': {}",
                record.identifier, e
            ))
        })
    }

    async fn commit_revert(
        &mut self,
        changed: &[CollectionSchema],
        identifier: &MigrationId,
    ) -> Result<()> {
        let mut tx = begin(&self.pool).await?;
        upsert_collections(&mut tx, &self.config.collections_table, changed).await?;

        let sql = format!("DELETE FROM {} WHERE identifier = $1", self.config.table);
        let result = sqlx::query(&sql)
            .bind(identifier.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CairnError::Database(format!(
                    "Failed to remove migration record '{}': {}",
                    identifier, e
                ))
            })?;
        if result.rows_affected() == 0 {
            return Err(CairnError::NotFound(format!(
                "applied record for migration {}",
                identifier
            )));
        }

        tx.commit().await.map_err(|e| {
            CairnError::Database(format!(
                "Failed to commit revert of '{}': {}",
                identifier, e
            ))
        })
    }

    async fn import_collections(&mut self, collections: &[CollectionSchema]) -> Result<()> {
        let mut tx = begin(&self.pool).await?;
        upsert_collections(&mut tx, &self.config.collections_table, collections).await?;
        tx.commit()
            .await
            .map_err(|e| CairnError::Database(format!("Failed to import collections: {}", e)))
    }
}

async fn begin(pool: &PgPool) -> Result<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|e| CairnError::Database(format!("Failed to start transaction: {}", e)))
}

async fn upsert_collections(
    tx: &mut Transaction<'static, Postgres>,
    table: &str,
    collections: &[CollectionSchema],
) -> Result<()> {
    let sql = upsert_collection_sql(table);
    for collection in collections {
        sqlx::query(&sql)
            .bind(&collection.id)
            .bind(&collection.name)
            .bind(Json(collection))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                CairnError::Database(format!(
                    "Failed to save collection '{}': {}",
                    collection.name, e
                ))
            })?;
    }
    Ok(())
}

fn create_collections_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id VARCHAR(255) PRIMARY KEY,
            name VARCHAR(255) UNIQUE NOT NULL,
            schema JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    )
}

fn create_migrations_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            identifier VARCHAR(255) PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    )
}

fn upsert_collection_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id, name, schema) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, schema = EXCLUDED.schema, updated_at = NOW()"
    )
}
