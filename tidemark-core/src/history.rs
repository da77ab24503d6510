//! Bookkeeping table operations (create, query, insert, delete).
//!
//! The layout matches knex's `knex_migrations` table so existing histories
//! can be picked up as-is.

use chrono::{DateTime, Utc};
use tokio_postgres::Client;

use crate::db::qualified_table;
use crate::error::Result;

/// A row from the bookkeeping table.
#[derive(Debug, Clone)]
pub struct CompletedRecord {
    /// Insertion order; later rows were applied later.
    pub id: i32,
    /// File name of the migration.
    pub name: String,
    /// Batch the migration was applied in.
    pub batch: i32,
    /// When the migration was applied.
    pub migration_time: Option<DateTime<Utc>>,
}

/// Create the bookkeeping table if it does not exist.
pub async fn create_table(client: &Client, schema: &str, table: &str) -> Result<()> {
    let sql = format!(
        r#"
CREATE SCHEMA IF NOT EXISTS {schema};
CREATE TABLE IF NOT EXISTS {fq} (
    id             SERIAL PRIMARY KEY,
    name           VARCHAR(255),
    batch          INTEGER,
    migration_time TIMESTAMPTZ DEFAULT now()
);
"#,
        schema = crate::db::quote_ident(schema),
        fq = qualified_table(schema, table),
    );
    client.batch_execute(&sql).await?;
    Ok(())
}

/// Check if the bookkeeping table exists.
pub async fn table_exists(client: &Client, schema: &str, table: &str) -> Result<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )",
            &[&schema, &table],
        )
        .await?;
    Ok(row.get::<_, bool>(0))
}

/// All completed migrations in application order.
pub async fn completed(client: &Client, schema: &str, table: &str) -> Result<Vec<CompletedRecord>> {
    let sql = format!(
        "SELECT id, name, batch, migration_time FROM {} ORDER BY id",
        qualified_table(schema, table)
    );
    let rows = client.query(&sql, &[]).await?;
    Ok(rows
        .into_iter()
        .map(|row| CompletedRecord {
            id: row.get(0),
            // knex declares these columns nullable
            name: row.get::<_, Option<String>>(1).unwrap_or_default(),
            batch: row.get::<_, Option<i32>>(2).unwrap_or(0),
            migration_time: row.get(3),
        })
        .collect())
}

/// Highest batch number recorded, or 0 when nothing has run.
pub async fn last_batch(client: &Client, schema: &str, table: &str) -> Result<i32> {
    let sql = format!(
        "SELECT COALESCE(MAX(batch), 0) FROM {}",
        qualified_table(schema, table)
    );
    let row = client.query_one(&sql, &[]).await?;
    Ok(row.get::<_, i32>(0))
}

/// Completed migrations of the highest batch, newest first.
pub async fn last_batch_records(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<CompletedRecord>> {
    let batch = last_batch(client, schema, table).await?;
    let mut records: Vec<CompletedRecord> = completed(client, schema, table)
        .await?
        .into_iter()
        .filter(|r| r.batch == batch)
        .collect();
    records.reverse();
    Ok(records)
}

/// Statement recording a migration as completed; params are `$1 = name, $2 = batch`.
pub fn insert_sql(schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO {} (name, batch, migration_time) VALUES ($1, $2, now())",
        qualified_table(schema, table)
    )
}

/// Statement removing a completed migration; param is `$1 = id`.
pub fn delete_sql(schema: &str, table: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", qualified_table(schema, table))
}
