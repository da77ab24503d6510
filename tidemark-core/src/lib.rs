//! Knex-style migration commands for PostgreSQL with named connections.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tidemark_core::commands::registry::{Invocation, CONNECTION_OPTION};
//! use tidemark_core::config::DatabaseOptions;
//! use tidemark_core::Tidemark;
//! # use tidemark_core::console::Console;
//!
//! # async fn run(console: &mut dyn Console) -> Result<(), Box<dyn std::error::Error>> {
//! let options = DatabaseOptions::load(None)?;
//! let tidemark = Tidemark::new(options);
//! let invocation = Invocation::for_command("migrate")?.with_option(CONNECTION_OPTION, "reporting");
//! tidemark.execute(&invocation, console).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`] — Named connections (TOML, env vars) and connection resolution
//! - [`commands`] — The command table and one handler per command
//! - [`engine`] — The migration engine seam the handlers talk to
//! - [`postgres`] — Bundled knex-compatible engine
//! - [`migration`] — Migration file parsing, scanning and scaffolding
//! - [`history`] — Batch bookkeeping table
//! - [`db`] — Connections, TLS, advisory locks
//! - [`console`] — Output and confirmation seam
//! - [`relations`] — Eager-load expression shapes
//! - [`error`] — Error types

pub mod commands;
pub mod config;
pub mod console;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod migration;
pub mod postgres;
pub mod relations;

use std::sync::Arc;

use commands::registry::{CommandKind, Invocation, CONNECTION_OPTION};
use config::{DatabaseOptions, ResolvedConnection};
use console::Console;
use engine::{EngineFactory, MigrationEngine};
use error::Result;

pub use commands::registry::{CommandSpec, COMMANDS};
pub use console::{MigrationStatus, StatusRow};
pub use engine::{MigrationBatch, MigrationListing};
pub use error::TidemarkError;
pub use postgres::{PgEngine, PgEngineFactory};
pub use relations::{LoadRelSchema, NestedLoadRelSchema};

/// Main entry point for the Tidemark library.
///
/// Holds the named connections and the factory that turns a resolved
/// connection into a migration engine.
pub struct Tidemark {
    options: DatabaseOptions,
    engines: Box<dyn EngineFactory>,
}

impl Tidemark {
    /// Use the bundled PostgreSQL engine.
    pub fn new(options: DatabaseOptions) -> Self {
        Self::with_engine_factory(options, PgEngineFactory)
    }

    pub fn with_engine_factory(
        options: DatabaseOptions,
        engines: impl EngineFactory + 'static,
    ) -> Self {
        Self {
            options,
            engines: Box::new(engines),
        }
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Run a parsed command line.
    pub async fn execute(&self, invocation: &Invocation, console: &mut dyn Console) -> Result<()> {
        let connection = invocation.option(CONNECTION_OPTION);
        match invocation.kind {
            CommandKind::MigrateStatus => self.migrate_status(connection, console).await,
            CommandKind::Migrate => self.migrate(connection, console).await,
            CommandKind::MigrateRollback => self.migrate_rollback(connection, console).await,
            CommandKind::MigrateReset => self.migrate_reset(connection, console).await,
            CommandKind::MakeMigration => {
                let name = invocation.required_argument("name")?;
                self.make_migration(connection, name, console).await
            }
        }
    }

    /// Show completed and pending migrations.
    pub async fn migrate_status(
        &self,
        connection: Option<&str>,
        console: &mut dyn Console,
    ) -> Result<()> {
        let (resolved, engine) = self.engine_for(connection)?;
        commands::status::execute(engine.as_ref(), &resolved, console).await
    }

    /// Apply pending migrations as one batch.
    pub async fn migrate(&self, connection: Option<&str>, console: &mut dyn Console) -> Result<()> {
        let (resolved, engine) = self.engine_for(connection)?;
        commands::migrate::execute(engine.as_ref(), &resolved, console).await
    }

    /// Revert the last batch.
    pub async fn migrate_rollback(
        &self,
        connection: Option<&str>,
        console: &mut dyn Console,
    ) -> Result<()> {
        let (resolved, engine) = self.engine_for(connection)?;
        commands::rollback::execute(engine.as_ref(), &resolved, console).await
    }

    /// Revert every migration once the operator confirms.
    pub async fn migrate_reset(
        &self,
        connection: Option<&str>,
        console: &mut dyn Console,
    ) -> Result<()> {
        let (resolved, engine) = self.engine_for(connection)?;
        commands::reset::execute(engine.as_ref(), &resolved, console).await
    }

    /// Scaffold a migration file named `name`.
    pub async fn make_migration(
        &self,
        connection: Option<&str>,
        name: &str,
        console: &mut dyn Console,
    ) -> Result<()> {
        let (resolved, engine) = self.engine_for(connection)?;
        commands::make::execute(engine.as_ref(), &resolved, name, console).await
    }

    fn engine_for(
        &self,
        connection: Option<&str>,
    ) -> Result<(ResolvedConnection<'_>, Arc<dyn MigrationEngine>)> {
        let resolved = self.options.resolve(connection)?;
        log::debug!("Resolved connection; connection={}", resolved.name);
        let engine = self.engines.engine(&resolved)?;
        Ok((resolved, engine))
    }
}
