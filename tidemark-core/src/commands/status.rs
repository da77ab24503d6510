//! Show completed and pending migrations.

use crate::config::ResolvedConnection;
use crate::console::{Console, MigrationStatus, StatusRow};
use crate::engine::{MigrationEngine, MigrationListing};
use crate::error::Result;

/// Completed rows first, then pending rows, each in engine order.
pub fn status_rows(listing: MigrationListing) -> Vec<StatusRow> {
    let completed = listing.completed.into_iter().map(|m| StatusRow {
        migration: m.name,
        status: MigrationStatus::Completed,
    });
    let pending = listing.pending.into_iter().map(|m| StatusRow {
        migration: m.file,
        status: MigrationStatus::Pending,
    });
    completed.chain(pending).collect()
}

pub async fn execute(
    engine: &dyn MigrationEngine,
    connection: &ResolvedConnection<'_>,
    console: &mut dyn Console,
) -> Result<()> {
    let listing = engine.list(&connection.config.migrations).await?;
    log::debug!(
        "Listed migrations; connection={}, completed={}, pending={}",
        connection.name,
        listing.completed.len(),
        listing.pending.len()
    );
    console.table(&status_rows(listing));
    Ok(())
}
