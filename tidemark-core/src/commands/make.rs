//! Scaffold a new migration file in the connection's migrations directory.

use crate::config::ResolvedConnection;
use crate::console::Console;
use crate::engine::{MakeOptions, MigrationEngine};
use crate::error::Result;
use crate::migration::{base_name, SCAFFOLD_EXTENSION};

pub async fn execute(
    engine: &dyn MigrationEngine,
    connection: &ResolvedConnection<'_>,
    name: &str,
    console: &mut dyn Console,
) -> Result<()> {
    let options = MakeOptions {
        directory: connection.config.migrations.directory.clone(),
        extension: SCAFFOLD_EXTENSION.to_string(),
    };

    let path = engine.make(name, &options).await?;
    console.success(base_name(&path));
    Ok(())
}
