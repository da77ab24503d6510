//! Database connection, TLS support, advisory locking, and transaction execution.

use std::future::Future;
use std::time::Duration;

use tokio_postgres::Client;

use crate::config::{ConnectionConfig, SslMode};
use crate::error::{Result, TidemarkError};

/// Quote a SQL identifier.
///
/// Doubles any embedded double-quotes and wraps in double-quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate that a SQL identifier contains only `[a-zA-Z0-9_]`.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TidemarkError::ConfigError(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TidemarkError::ConfigError(format!(
            "Identifier '{}' contains invalid characters. Only [a-zA-Z0-9_] are allowed.",
            name
        )));
    }
    Ok(())
}

/// Schema-qualified, quoted table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Build a rustls ClientConfig using the Mozilla CA bundle and ring crypto provider.
fn make_rustls_config() -> Result<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder_with_provider(std::sync::Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TidemarkError::ConfigError(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(root_store)
    .with_no_client_auth();
    Ok(config)
}

/// Authentication failures are not worth retrying.
fn is_permanent_error(e: &tokio_postgres::Error) -> bool {
    if let Some(db_err) = e.as_db_error() {
        let code = db_err.code().code();
        // 28P01 = invalid_password, 28000 = invalid_authorization_specification
        return code == "28P01" || code == "28000";
    }
    false
}

/// Inject TCP keepalive parameters into a connection string if not already present.
///
/// Returns the string unchanged if `keepalive_secs == 0` or keepalive params already exist.
pub fn inject_keepalive(conn_string: &str, keepalive_secs: u32) -> String {
    if keepalive_secs == 0 || conn_string.to_lowercase().contains("keepalives") {
        return conn_string.to_string();
    }
    if conn_string.starts_with("postgres://") || conn_string.starts_with("postgresql://") {
        let sep = if conn_string.contains('?') { '&' } else { '?' };
        format!(
            "{}{}keepalives=1&keepalives_idle={}",
            conn_string, sep, keepalive_secs
        )
    } else {
        format!(
            "{} keepalives=1 keepalives_idle={}",
            conn_string, keepalive_secs
        )
    }
}

/// Run the connection driver in the background, logging when it fails.
fn spawn_connection_task<F>(connection: F)
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("Database connection error: {}", e);
        }
    });
}

async fn connect_once(
    conn_string: &str,
    ssl_mode: &SslMode,
    connect_timeout_secs: u32,
) -> Result<std::result::Result<Client, tokio_postgres::Error>> {
    let tls_config = match ssl_mode {
        SslMode::Disable => None,
        SslMode::Prefer | SslMode::Require => Some(make_rustls_config()?),
    };

    let connect_fut = async {
        match (ssl_mode, tls_config) {
            (SslMode::Require, Some(tls_config)) => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                let (client, connection) = tokio_postgres::connect(conn_string, tls).await?;
                spawn_connection_task(connection);
                Ok::<Client, tokio_postgres::Error>(client)
            }
            (SslMode::Prefer, Some(tls_config)) => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                match tokio_postgres::connect(conn_string, tls).await {
                    Ok((client, connection)) => {
                        spawn_connection_task(connection);
                        Ok(client)
                    }
                    Err(_) => {
                        log::debug!("TLS connection failed, falling back to plaintext");
                        let (client, connection) =
                            tokio_postgres::connect(conn_string, tokio_postgres::NoTls).await?;
                        spawn_connection_task(connection);
                        Ok(client)
                    }
                }
            }
            _ => {
                let (client, connection) =
                    tokio_postgres::connect(conn_string, tokio_postgres::NoTls).await?;
                spawn_connection_task(connection);
                Ok(client)
            }
        }
    };

    if connect_timeout_secs == 0 {
        return Ok(connect_fut.await);
    }
    match tokio::time::timeout(Duration::from_secs(connect_timeout_secs as u64), connect_fut).await
    {
        Ok(result) => Ok(result),
        Err(_) => Ok(Err(tokio_postgres::Error::__private_api_timeout())),
    }
}

/// Connect using a connection's settings, retrying with exponential backoff + jitter.
///
/// Each retry waits `min(2^attempt, 30)s + rand(0..1000ms)`. Authentication
/// failures are returned immediately.
pub async fn connect(config: &ConnectionConfig) -> Result<Client> {
    let conn_string = inject_keepalive(&config.connection_string()?, config.keepalive_secs);
    let retries = config.connect_retries;
    let mut last_err = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let base_delay = std::cmp::min(1u64 << attempt, 30);
            let delay = Duration::from_secs(base_delay)
                + Duration::from_millis(fastrand::u64(0..1000));
            log::info!(
                "Connection attempt failed, retrying; attempt={}, max_attempts={}, delay_ms={}",
                attempt + 1,
                retries + 1,
                delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
        }

        match connect_once(&conn_string, &config.ssl_mode, config.connect_timeout_secs).await? {
            Ok(client) => {
                if attempt > 0 {
                    log::info!("Connected after retry; attempt={}", attempt + 1);
                }
                if config.statement_timeout_secs > 0 {
                    client
                        .batch_execute(&format!(
                            "SET statement_timeout = '{}s'",
                            config.statement_timeout_secs
                        ))
                        .await?;
                }
                return Ok(client);
            }
            Err(e) => {
                if is_permanent_error(&e) {
                    log::error!("Permanent connection error, not retrying: {}", e);
                    return Err(TidemarkError::DatabaseError(e));
                }
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(TidemarkError::DatabaseError(e)),
        None => Err(TidemarkError::ConfigError(
            "No connection attempt was made".to_string(),
        )),
    }
}

/// Stable lock id for a bookkeeping table, so every process targeting the
/// same table contends for the same advisory lock.
pub(crate) fn advisory_lock_id(schema: &str, table: &str) -> i64 {
    crc32fast::hash(format!("{}.{}", schema, table).as_bytes()) as i64
}

/// Acquire the advisory lock guarding migration runs on a bookkeeping table.
pub async fn acquire_advisory_lock(client: &Client, schema: &str, table: &str) -> Result<()> {
    let lock_id = advisory_lock_id(schema, table);
    log::debug!(
        "Acquiring advisory lock; lock_id={}, table={}.{}",
        lock_id,
        schema,
        table
    );
    client
        .execute("SELECT pg_advisory_lock($1)", &[&lock_id])
        .await
        .map_err(|e| TidemarkError::LockError(e.to_string()))?;
    Ok(())
}

/// Release the advisory lock taken by [`acquire_advisory_lock`].
pub async fn release_advisory_lock(client: &Client, schema: &str, table: &str) -> Result<()> {
    let lock_id = advisory_lock_id(schema, table);
    log::debug!("Releasing advisory lock; lock_id={}", lock_id);
    client
        .execute("SELECT pg_advisory_unlock($1)", &[&lock_id])
        .await
        .map_err(|e| TidemarkError::LockError(format!("release failed: {}", e)))?;
    Ok(())
}

/// Execute migration SQL plus its bookkeeping statement as one unit.
///
/// With `transactional` the pair runs inside BEGIN/COMMIT and is rolled back
/// on failure. Failures of `sql` are reported as [`TidemarkError::MigrationFailed`].
pub async fn execute_migration_sql(
    client: &Client,
    script: &str,
    sql: &str,
    bookkeeping: &str,
    params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    transactional: bool,
) -> Result<()> {
    if transactional {
        client.batch_execute("BEGIN").await?;
    }

    let outcome = async {
        if !sql.trim().is_empty() {
            client
                .batch_execute(sql)
                .await
                .map_err(|e| TidemarkError::MigrationFailed {
                    script: script.to_string(),
                    reason: crate::error::format_db_error(&e),
                })?;
        }
        client.execute(bookkeeping, params).await?;
        Ok::<(), TidemarkError>(())
    }
    .await;

    match outcome {
        Ok(()) => {
            if transactional {
                client.batch_execute("COMMIT").await?;
            }
            Ok(())
        }
        Err(e) => {
            if transactional {
                if let Err(rollback_err) = client.batch_execute("ROLLBACK").await {
                    log::warn!("Failed to rollback transaction: {}", rollback_err);
                }
            }
            Err(e)
        }
    }
}
