//! Knex-compatible PostgreSQL migration engine.
//!
//! Completed migrations are recorded per batch in a bookkeeping table;
//! `latest`, `rollback` and `down` run under an advisory lock so two
//! processes never migrate the same table at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_postgres::Client;

use crate::config::{ConnectionConfig, MigrationsConfig, ResolvedConnection};
use crate::db;
use crate::engine::{
    CompletedMigration, EngineFactory, MakeOptions, MigrationBatch, MigrationEngine,
    MigrationListing, PendingMigration,
};
use crate::error::{Result, TidemarkError};
use crate::history::{self, CompletedRecord};
use crate::migration::{self, MigrationFile};

/// Engine bound to one configured connection.
///
/// The database is only contacted by operations that need it, so scaffolding
/// works without a reachable server.
pub struct PgEngine {
    name: String,
    config: ConnectionConfig,
    client: OnceCell<Client>,
}

impl PgEngine {
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already connected client.
    pub fn with_client(name: impl Into<String>, config: ConnectionConfig, client: Client) -> Self {
        Self {
            name: name.into(),
            config,
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                log::debug!("Connecting; connection={}", self.name);
                db::connect(&self.config).await
            })
            .await
    }

    /// Take the advisory lock, then ensure the bookkeeping table under it.
    async fn lock(&self, config: &MigrationsConfig) -> Result<&Client> {
        let client = self.client().await?;
        db::acquire_advisory_lock(client, &config.schema_name, &config.table_name).await?;
        if let Err(e) =
            history::create_table(client, &config.schema_name, &config.table_name).await
        {
            self.unlock(client, config).await;
            return Err(e);
        }
        Ok(client)
    }

    async fn unlock(&self, client: &Client, config: &MigrationsConfig) {
        if let Err(e) =
            db::release_advisory_lock(client, &config.schema_name, &config.table_name).await
        {
            log::error!("Failed to release advisory lock: {}", e);
        }
    }

    async fn apply_pending(
        &self,
        client: &Client,
        config: &MigrationsConfig,
    ) -> Result<MigrationBatch> {
        let (schema, table) = (&config.schema_name, &config.table_name);
        let done: HashSet<String> = history::completed(client, schema, table)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        let files = migration::scan_migrations(&config.directory, &config.extension)?;

        // A completed migration without its file means a corrupt directory.
        let on_disk: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
        if let Some(name) = done.iter().filter(|n| !on_disk.contains(n.as_str())).min() {
            return Err(TidemarkError::MigrationMissing { name: name.clone() });
        }

        let pending: Vec<MigrationFile> = files
            .into_iter()
            .filter(|f| !done.contains(&f.name))
            .collect();

        let last = history::last_batch(client, schema, table).await?;
        if pending.is_empty() {
            log::info!("No pending migrations; connection={}", self.name);
            return Ok(MigrationBatch {
                batch: last,
                migrations: Vec::new(),
            });
        }

        let batch = last + 1;
        let insert = history::insert_sql(schema, table);
        let mut applied = Vec::with_capacity(pending.len());
        for file in &pending {
            let source = migration::load_migration(file)?;
            log::info!("Applying migration; migration={}, batch={}", file.name, batch);
            db::execute_migration_sql(
                client,
                &file.name,
                &source.up,
                &insert,
                &[&file.name, &batch],
                !config.disable_transactions,
            )
            .await?;
            applied.push(file.name.clone());
        }

        Ok(MigrationBatch {
            batch,
            migrations: applied,
        })
    }
}

/// Revert `records` in the given order, deleting each bookkeeping row.
async fn revert_records(
    client: &Client,
    config: &MigrationsConfig,
    records: &[CompletedRecord],
) -> Result<Vec<String>> {
    let files: HashMap<String, MigrationFile> =
        migration::scan_migrations(&config.directory, &config.extension)?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

    // Check every file first so a gap never leaves a half reverted batch.
    for record in records {
        if !files.contains_key(&record.name) {
            return Err(TidemarkError::MigrationMissing {
                name: record.name.clone(),
            });
        }
    }

    let delete = history::delete_sql(&config.schema_name, &config.table_name);
    let mut reverted = Vec::with_capacity(records.len());
    for record in records {
        let file = &files[&record.name];
        let source = migration::load_migration(file)?;
        log::info!(
            "Reverting migration; migration={}, batch={}",
            record.name,
            record.batch
        );
        db::execute_migration_sql(
            client,
            &record.name,
            &source.down,
            &delete,
            &[&record.id],
            !config.disable_transactions,
        )
        .await?;
        reverted.push(record.name.clone());
    }
    Ok(reverted)
}

#[async_trait]
impl MigrationEngine for PgEngine {
    async fn list(&self, config: &MigrationsConfig) -> Result<MigrationListing> {
        let client = self.client().await?;
        let (schema, table) = (&config.schema_name, &config.table_name);

        let records = if history::table_exists(client, schema, table).await? {
            history::completed(client, schema, table).await?
        } else {
            Vec::new()
        };
        let done: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();

        let files = migration::scan_migrations(&config.directory, &config.extension)?;
        for record in &records {
            if !files.iter().any(|f| f.name == record.name) {
                log::warn!(
                    "Completed migration has no file; migration={}, connection={}",
                    record.name,
                    self.name
                );
            }
        }

        let directory = config.directory.display().to_string();
        let pending = files
            .into_iter()
            .filter(|f| !done.contains(f.name.as_str()))
            .map(|f| PendingMigration {
                file: f.name,
                directory: directory.clone(),
            })
            .collect();

        Ok(MigrationListing {
            completed: records
                .iter()
                .map(|r| CompletedMigration {
                    name: r.name.clone(),
                })
                .collect(),
            pending,
        })
    }

    async fn latest(&self, config: &MigrationsConfig) -> Result<MigrationBatch> {
        let client = self.lock(config).await?;
        let result = self.apply_pending(client, config).await;
        self.unlock(client, config).await;
        result
    }

    async fn rollback(&self, config: &MigrationsConfig) -> Result<MigrationBatch> {
        let client = self.lock(config).await?;
        let result = async {
            let records =
                history::last_batch_records(client, &config.schema_name, &config.table_name)
                    .await?;
            let batch = records.first().map(|r| r.batch).unwrap_or(0);
            let migrations = revert_records(client, config, &records).await?;
            Ok::<_, TidemarkError>(MigrationBatch { batch, migrations })
        }
        .await;
        self.unlock(client, config).await;
        result
    }

    async fn down(&self, config: &MigrationsConfig) -> Result<MigrationBatch> {
        let client = self.lock(config).await?;
        let result = async {
            let mut records =
                history::completed(client, &config.schema_name, &config.table_name).await?;
            records.reverse();
            let batch = records.iter().map(|r| r.batch).max().unwrap_or(0);
            let migrations = revert_records(client, config, &records).await?;
            Ok::<_, TidemarkError>(MigrationBatch { batch, migrations })
        }
        .await;
        self.unlock(client, config).await;
        result
    }

    async fn make(&self, name: &str, options: &MakeOptions) -> Result<String> {
        let path = migration::create_migration_file(&options.directory, name, &options.extension)?;
        Ok(path.display().to_string())
    }
}

/// Builds a [`PgEngine`] per resolved connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgEngineFactory;

impl EngineFactory for PgEngineFactory {
    fn engine(&self, connection: &ResolvedConnection<'_>) -> Result<Arc<dyn MigrationEngine>> {
        Ok(Arc::new(PgEngine::new(
            connection.name,
            connection.config.clone(),
        )))
    }
}
