//! Revert every completed migration after an explicit confirmation.

use crate::config::ResolvedConnection;
use crate::console::Console;
use crate::engine::MigrationEngine;
use crate::error::Result;

use super::rollback::AT_BASE_MESSAGE;

pub const CONFIRM_QUESTION: &str =
    "Are you sure you want to reset your database? This action is irreversible.";

pub async fn execute(
    engine: &dyn MigrationEngine,
    connection: &ResolvedConnection<'_>,
    console: &mut dyn Console,
) -> Result<()> {
    if !console.confirm(CONFIRM_QUESTION).await? {
        log::debug!("Reset declined; connection={}", connection.name);
        console.info("Thank you! Exiting...");
        return Ok(());
    }

    let report = engine.down(&connection.config.migrations).await?;

    if report.is_empty() {
        console.info(AT_BASE_MESSAGE);
        return Ok(());
    }

    log::info!(
        "Reset complete; connection={}, count={}",
        connection.name,
        report.migrations.len()
    );

    console.info("Rollback of following migrations are done:");
    for migration in &report.migrations {
        console.success(migration);
    }
    Ok(())
}
