//! Apply all pending migrations as one batch.

use crate::config::ResolvedConnection;
use crate::console::Console;
use crate::engine::MigrationEngine;
use crate::error::Result;

pub async fn execute(
    engine: &dyn MigrationEngine,
    connection: &ResolvedConnection<'_>,
    console: &mut dyn Console,
) -> Result<()> {
    let report = engine.latest(&connection.config.migrations).await?;

    if report.is_empty() {
        console.info("No migrations to run");
        return Ok(());
    }

    log::info!(
        "Migrations applied; connection={}, batch={}, count={}",
        connection.name,
        report.batch,
        report.migrations.len()
    );

    console.info(&format!("Batch Number: {}", report.batch));
    for migration in &report.migrations {
        console.success(migration);
    }
    Ok(())
}
