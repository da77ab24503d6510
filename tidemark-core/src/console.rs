//! Console I/O seam used by the command handlers.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Whether a migration has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationStatus {
    Completed,
    Pending,
}

impl MigrationStatus {
    /// Single-letter marker shown in the status table.
    pub fn marker(&self) -> &'static str {
        match self {
            MigrationStatus::Completed => "Y",
            MigrationStatus::Pending => "N",
        }
    }
}

/// One line of `migrate:status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub migration: String,
    pub status: MigrationStatus,
}

/// Where command handlers send their output and ask their questions.
#[async_trait]
pub trait Console: Send {
    /// Informational line.
    fn info(&mut self, message: &str);

    /// Line reporting a completed step.
    fn success(&mut self, message: &str);

    /// Render migration status rows as a table.
    fn table(&mut self, rows: &[StatusRow]);

    /// Ask a yes/no question; `false` unless the operator agrees.
    async fn confirm(&mut self, question: &str) -> Result<bool>;
}
