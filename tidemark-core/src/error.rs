//! Error types for tidemark operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly.");
    }
    msg
}

/// All error types that tidemark operations can produce.
#[derive(Error, Debug)]
pub enum TidemarkError {
    /// Invalid or missing configuration (TOML parse errors, bad identifiers, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The requested connection name has no entry in the configuration.
    #[error("Connection '{name}' is not configured. Available: {available}")]
    ConnectionNotFound { name: String, available: String },

    /// A required command argument was not supplied.
    #[error("Missing required argument '{0}'")]
    MissingArgument(String),

    /// The invocation names a command that is not in the command table.
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// A database query or connection operation failed.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// A filesystem I/O operation failed (reading migration files, config, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A migration file or name could not be parsed.
    #[error("Migration parse error: {0}")]
    MigrationParseError(String),

    /// A migration script failed to execute against the database.
    #[error("Migration failed for {script}: {reason}")]
    MigrationFailed { script: String, reason: String },

    /// A migration is recorded as completed but its file is gone.
    #[error("Migration {name} is recorded as completed but its file is missing")]
    MigrationMissing { name: String },

    /// Could not acquire or release the advisory lock guarding migration runs.
    #[error("Failed to acquire advisory lock: {0}")]
    LockError(String),
}

/// Convenience type alias for `Result<T, TidemarkError>`.
pub type Result<T> = std::result::Result<T, TidemarkError>;
