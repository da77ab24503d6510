//! Migration file discovery, up/down section parsing, and scaffolding.
//!
//! A migration is a single file named `{timestamp}_{name}.{ext}`. Its body is
//! split into an up and a down section by marker comments:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE users (id SERIAL PRIMARY KEY);
//!
//! -- migrate:down
//! DROP TABLE users;
//! ```
//!
//! `-- up` / `-- down` are accepted too. A marker is the whole line; comments
//! that merely start with "up" or "down" stay SQL. Text before the first
//! marker belongs to the up section.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex_lite::Regex;

use crate::error::{Result, TidemarkError};

/// Extension written by `make:migration`, independent of the discovery setting.
pub const SCAFFOLD_EXTENSION: &str = "sql";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*--\s*(?:migrate:\s*)?(up|down)\s*$").unwrap());

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// A migration file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name including extension; this is what the bookkeeping table records.
    pub name: String,
    /// Full path to the file.
    pub path: PathBuf,
}

/// The executable halves of a migration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSource {
    pub up: String,
    pub down: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Up,
    Down,
}

/// Split a migration body into up and down SQL.
pub fn parse_migration(content: &str) -> MigrationSource {
    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut section = Section::Up;

    for line in content.lines() {
        if let Some(caps) = MARKER_RE.captures(line) {
            section = if caps[1].eq_ignore_ascii_case("up") {
                Section::Up
            } else {
                Section::Down
            };
            continue;
        }
        match section {
            Section::Up => up.push(line),
            Section::Down => down.push(line),
        }
    }

    MigrationSource {
        up: up.join("\n").trim().to_string(),
        down: down.join("\n").trim().to_string(),
    }
}

/// Read and parse a migration file.
pub fn load_migration(file: &MigrationFile) -> Result<MigrationSource> {
    let content = std::fs::read_to_string(&file.path)?;
    Ok(parse_migration(&content))
}

/// List migration files in `directory` with the given extension, sorted by name.
///
/// A missing directory yields an empty list.
pub fn scan_migrations(directory: &Path, extension: &str) -> Result<Vec<MigrationFile>> {
    if !directory.exists() {
        log::debug!(
            "Migrations directory does not exist; directory={}",
            directory.display()
        );
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                log::warn!("Skipping migration with non UTF-8 name; path={}", path.display());
                continue;
            }
        };
        files.push(MigrationFile { name, path });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Write a new migration file `{YYYYMMDDHHMMSS}_{name}.{extension}` into `directory`.
///
/// Creates the directory if needed and returns the path of the new file.
pub fn create_migration_file(directory: &Path, name: &str, extension: &str) -> Result<PathBuf> {
    if !NAME_RE.is_match(name) {
        return Err(TidemarkError::MigrationParseError(format!(
            "Invalid migration name '{}'. Use letters, digits, '_' and '-' only.",
            name
        )));
    }

    std::fs::create_dir_all(directory)?;

    let now = Utc::now();
    let file_name = format!(
        "{}_{}.{}",
        now.format("%Y%m%d%H%M%S"),
        name,
        extension.trim_start_matches('.')
    );
    let path = directory.join(&file_name);
    if path.exists() {
        return Err(TidemarkError::MigrationParseError(format!(
            "Migration file {} already exists",
            file_name
        )));
    }

    let template = format!(
        "-- Migration: {}\n-- Created: {}\n\n-- migrate:up\n\n\n-- migrate:down\n\n",
        name,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    std::fs::write(&path, template)?;

    log::info!("Created migration; path={}", path.display());
    Ok(path)
}

/// The final component of a path as reported by an engine.
///
/// Engines may hand back `/`-separated strings regardless of platform, so the
/// split is done on both separators.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', std::path::MAIN_SEPARATOR])
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up_and_down() {
        let src = parse_migration(
            "-- migrate:up\nCREATE TABLE a (id INT);\n\n-- migrate:down\nDROP TABLE a;\n",
        );
        assert_eq!(src.up, "CREATE TABLE a (id INT);");
        assert_eq!(src.down, "DROP TABLE a;");
    }

    #[test]
    fn test_parse_short_markers_case_insensitive() {
        let src = parse_migration("-- UP\nSELECT 1;\n--Down\nSELECT 2;");
        assert_eq!(src.up, "SELECT 1;");
        assert_eq!(src.down, "SELECT 2;");
    }

    #[test]
    fn test_parse_without_markers_is_all_up() {
        let src = parse_migration("CREATE TABLE b (id INT);\n-- a comment\n");
        assert_eq!(src.up, "CREATE TABLE b (id INT);\n-- a comment");
        assert!(src.down.is_empty());
    }

    #[test]
    fn test_parse_keeps_preamble_in_up() {
        let src = parse_migration("-- Migration: x\nSELECT 0;\n-- migrate:down\nSELECT 9;");
        assert_eq!(src.up, "-- Migration: x\nSELECT 0;");
        assert_eq!(src.down, "SELECT 9;");
    }

    #[test]
    fn test_parse_ignores_lookalike_comments() {
        let src = parse_migration("-- update the users table\nUPDATE users SET x = 1;");
        assert_eq!(
            src.up,
            "-- update the users table\nUPDATE users SET x = 1;"
        );
    }

    #[test]
    fn test_parse_comments_starting_with_marker_words() {
        let src = parse_migration(
            "-- migrate:up\n\
             CREATE TABLE readings (v INT);\n\
             -- Down-sample readings into hourly buckets\n\
             CREATE TABLE hourly (v INT);\n\
             -- up to 24 rows per day\n\
             -- down: see below\n\
             -- migrate:down\n\
             DROP TABLE hourly;\n\
             DROP TABLE readings;",
        );
        assert!(src.up.contains("CREATE TABLE hourly (v INT);"));
        assert!(src.up.contains("-- up to 24 rows per day"));
        assert!(src.up.contains("-- down: see below"));
        assert_eq!(src.down, "DROP TABLE hourly;\nDROP TABLE readings;");
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240102_b.sql"), "").unwrap();
        std::fs::write(dir.path().join("20240101_a.sql"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let files = scan_migrations(dir.path(), "sql").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["20240101_a.sql", "20240102_b.sql"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = scan_migrations(&dir.path().join("nope"), "sql").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_create_migration_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("db").join("migrations");

        let path = create_migration_file(&target, "create_users", "sql").unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.ends_with("_create_users.sql"));
        assert_eq!(file_name.len(), "20240101120000_create_users.sql".len());

        let content = std::fs::read_to_string(&path).unwrap();
        let src = parse_migration(&content);
        assert!(src.up.starts_with("-- Migration: create_users"));
        assert!(src.down.is_empty());
    }

    #[test]
    fn test_create_migration_rejects_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_migration_file(dir.path(), "../escape", "sql").is_err());
        assert!(create_migration_file(dir.path(), "", "sql").is_err());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c/20240101_create_x.js"), "20240101_create_x.js");
        assert_eq!(base_name("20240101_create_x.js"), "20240101_create_x.js");
    }
}
