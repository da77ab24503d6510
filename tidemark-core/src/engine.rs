//! The migration engine seam.
//!
//! Command handlers only talk to a [`MigrationEngine`]; discovering files,
//! numbering batches and executing SQL are the engine's business. The
//! bundled implementation is [`crate::postgres::PgEngine`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{MigrationsConfig, ResolvedConnection};
use crate::error::Result;

/// A migration recorded as completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedMigration {
    pub name: String,
}

/// A migration file that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub file: String,
    pub directory: String,
}

/// The two disjoint lists returned by [`MigrationEngine::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationListing {
    /// Completed migrations in application order.
    pub completed: Vec<CompletedMigration>,
    /// Pending migrations in the order they would be applied.
    pub pending: Vec<PendingMigration>,
}

/// Outcome of applying or reverting a group of migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationBatch {
    /// Batch number applied or reverted.
    pub batch: i32,
    /// Migration names in the order the engine processed them.
    pub migrations: Vec<String>,
}

impl MigrationBatch {
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Where and how a new migration file is scaffolded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeOptions {
    pub directory: std::path::PathBuf,
    pub extension: String,
}

/// Operations a migration engine offers to the command layer.
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    /// Completed and pending migrations for `config`.
    async fn list(&self, config: &MigrationsConfig) -> Result<MigrationListing>;

    /// Apply every pending migration as a new batch.
    async fn latest(&self, config: &MigrationsConfig) -> Result<MigrationBatch>;

    /// Revert the most recent batch.
    async fn rollback(&self, config: &MigrationsConfig) -> Result<MigrationBatch>;

    /// Revert every completed migration.
    async fn down(&self, config: &MigrationsConfig) -> Result<MigrationBatch>;

    /// Create a new migration file and return its path.
    async fn make(&self, name: &str, options: &MakeOptions) -> Result<String>;
}

/// Produces the engine bound to a resolved connection.
pub trait EngineFactory: Send + Sync {
    fn engine(&self, connection: &ResolvedConnection<'_>) -> Result<Arc<dyn MigrationEngine>>;
}
