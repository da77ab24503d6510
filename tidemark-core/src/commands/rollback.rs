//! Revert the most recent batch.

use crate::config::ResolvedConnection;
use crate::console::Console;
use crate::engine::MigrationEngine;
use crate::error::Result;

/// Shown when there is nothing left to revert.
pub const AT_BASE_MESSAGE: &str = "No migrations to rollback. Already at the base migration";

pub async fn execute(
    engine: &dyn MigrationEngine,
    connection: &ResolvedConnection<'_>,
    console: &mut dyn Console,
) -> Result<()> {
    let report = engine.rollback(&connection.config.migrations).await?;

    if report.is_empty() {
        console.info(AT_BASE_MESSAGE);
        return Ok(());
    }

    log::info!(
        "Batch reverted; connection={}, batch={}, count={}",
        connection.name,
        report.batch,
        report.migrations.len()
    );

    console.info(&format!("Reverted Batch: {}", report.batch));
    for migration in &report.migrations {
        console.success(migration);
    }
    Ok(())
}
