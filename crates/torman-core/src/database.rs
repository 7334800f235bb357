//! Relational persistence backend and ad-hoc query access.
//!
//! A saved manual becomes five tables: scalar fields in `manual(field,
//! value)`, each mapping in its own table with an explicit `seq` column that
//! records document order. Reloads always `ORDER BY seq`, so the round-trip
//! law holds regardless of how the engine happens to return rows. A table or
//! column missing from a cache file is corruption, not an empty manual.
//!
//! [`query`] opens the cache read-only and runs caller-supplied statements,
//! surfacing the engine's native diagnostics unmodified.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Category, ConfigOption, Manual};

/// File extension that routes `save`/`load` to this backend.
pub(crate) const DATABASE_EXTENSION: &str = "sqlite";

const SCHEMA: &str = "
CREATE TABLE manual(field TEXT PRIMARY KEY, value TEXT NOT NULL);
CREATE TABLE commandline_options(seq INTEGER PRIMARY KEY, flag TEXT NOT NULL, description TEXT NOT NULL);
CREATE TABLE signals(seq INTEGER PRIMARY KEY, name TEXT NOT NULL, description TEXT NOT NULL);
CREATE TABLE files(seq INTEGER PRIMARY KEY, path TEXT NOT NULL, description TEXT NOT NULL);
CREATE TABLE config_options(seq INTEGER PRIMARY KEY, name TEXT NOT NULL, category INTEGER NOT NULL, usage TEXT NOT NULL, summary TEXT NOT NULL, description TEXT NOT NULL);
";

/// Default location of the manual cache database.
///
/// `TORMAN_DATABASE` overrides the platform data directory when set to a
/// non-empty path.
pub fn default_database_path() -> Result<PathBuf> {
    database_path_from(std::env::var("TORMAN_DATABASE").ok().as_deref())
}

fn database_path_from(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(configured) = configured {
        let trimmed = configured.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let dirs = directories::ProjectDirs::from("", "", "torman")
        .ok_or_else(|| Error::Storage("Unable to determine a data directory".to_string()))?;
    Ok(dirs.data_dir().join("manual.sqlite"))
}

/// Writes the manual into a fresh database file, replacing `path` atomically.
pub(crate) fn save_to_database(manual: &Manual, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Build the database under a temporary name so a failed save never
    // clobbers an existing cache.
    let staging = tempfile::Builder::new()
        .prefix(".manual-")
        .suffix(".sqlite")
        .tempfile_in(dir)
        .map_err(|e| Error::Storage(format!("Failed to stage write for {}: {e}", path.display())))?;

    let mut conn = Connection::open(staging.path())
        .map_err(|e| Error::Storage(format!("Failed to create {}: {e}", path.display())))?;
    write_manual(&mut conn, manual)
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", path.display())))?;
    conn.close()
        .map_err(|(_, e)| Error::Storage(format!("Failed to flush {}: {e}", path.display())))?;

    let _ = staging
        .persist(path)
        .map_err(|e| Error::Storage(format!("Failed to commit {}: {e}", path.display())))?;

    debug!("Saved manual database to {}", path.display());
    Ok(())
}

fn write_manual(conn: &mut Connection, manual: &Manual) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;

    for (field, value) in [
        ("name", &manual.name),
        ("synopsis", &manual.synopsis),
        ("description", &manual.description),
    ] {
        let _ = tx.execute(
            "INSERT INTO manual(field, value) VALUES (?1, ?2)",
            params![field, value],
        )?;
    }

    for (seq, (flag, description)) in manual.commandline_options.iter().enumerate() {
        let _ = tx.execute(
            "INSERT INTO commandline_options(seq, flag, description) VALUES (?1, ?2, ?3)",
            params![seq as i64, flag, description],
        )?;
    }

    for (seq, (name, description)) in manual.signals.iter().enumerate() {
        let _ = tx.execute(
            "INSERT INTO signals(seq, name, description) VALUES (?1, ?2, ?3)",
            params![seq as i64, name, description],
        )?;
    }

    for (seq, (file, description)) in manual.files.iter().enumerate() {
        let _ = tx.execute(
            "INSERT INTO files(seq, path, description) VALUES (?1, ?2, ?3)",
            params![seq as i64, file, description],
        )?;
    }

    for (seq, option) in manual.config_options.values().enumerate() {
        let _ = tx.execute(
            "INSERT INTO config_options(seq, name, category, usage, summary, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seq as i64,
                option.name,
                option.category.code(),
                option.usage,
                option.summary,
                option.description
            ],
        )?;
    }

    tx.commit()
}

/// Reloads a manual from a database file.
pub(crate) fn load_from_database(path: &Path) -> Result<Manual> {
    if !path.exists() {
        return Err(Error::DatabaseMissing {
            path: path.to_path_buf(),
        });
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::Corrupt(format!("{}: {e}", path.display())))?;

    // Any engine failure past the existence check means the file does not
    // hold our schema, including a missing table or seq column.
    read_manual(&conn).map_err(|e| Error::Corrupt(format!("{}: {e}", path.display())))
}

fn read_manual(conn: &Connection) -> rusqlite::Result<Manual> {
    let mut manual = Manual::new();

    let mut stmt = conn.prepare("SELECT field, value FROM manual")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let field: String = row.get(0)?;
        let value: String = row.get(1)?;
        match field.as_str() {
            "name" => manual.name = value,
            "synopsis" => manual.synopsis = value,
            "description" => manual.description = value,
            other => debug!("Ignoring unrecognized manual field '{}'", other),
        }
    }
    drop(rows);
    drop(stmt);

    let mut stmt =
        conn.prepare("SELECT flag, description FROM commandline_options ORDER BY seq")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let _ = manual.commandline_options.insert(row.get(0)?, row.get(1)?);
    }
    drop(rows);
    drop(stmt);

    let mut stmt = conn.prepare("SELECT name, description FROM signals ORDER BY seq")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let _ = manual.signals.insert(row.get(0)?, row.get(1)?);
    }
    drop(rows);
    drop(stmt);

    let mut stmt = conn.prepare("SELECT path, description FROM files ORDER BY seq")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let _ = manual.files.insert(row.get(0)?, row.get(1)?);
    }
    drop(rows);
    drop(stmt);

    let mut stmt = conn.prepare(
        "SELECT name, category, usage, summary, description FROM config_options ORDER BY seq",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let code: i64 = row.get(1)?;
        let option = ConfigOption {
            name: name.clone(),
            category: Category::from_code(code).unwrap_or(Category::Unknown),
            usage: row.get(2)?,
            summary: row.get(3)?,
            description: row.get(4)?,
        };
        manual.insert_config_option(option);
    }

    Ok(manual)
}

/// Fully materialized result of an ad-hoc query.
///
/// Rows are read eagerly and the connection is released before this value is
/// returned, so holding or iterating it never keeps the cache file open.
#[derive(Debug)]
pub struct QueryRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl QueryRows {
    /// Column names of the statement, in select order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for QueryRows {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Runs a caller-supplied statement against a manual cache database.
///
/// With no explicit `database`, the [`default_database_path`] is used. The
/// file is opened read-only. Statement errors carry the engine's own
/// diagnostic text, including position details for syntax errors.
pub fn query(statement: &str, database: Option<&Path>) -> Result<QueryRows> {
    let path = match database {
        Some(explicit) => explicit.to_path_buf(),
        None => default_database_path()?,
    };

    if !path.exists() {
        return Err(Error::DatabaseMissing { path });
    }

    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut stmt = conn.prepare(statement)?;
    let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
    let column_count = stmt.column_count();

    let mut collected = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for index in 0..column_count {
            values.push(row.get::<_, Value>(index)?);
        }
        collected.push(values);
    }
    drop(rows);
    drop(stmt);
    drop(conn);

    Ok(QueryRows {
        columns,
        rows: collected.into_iter(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage;
    use std::fs;
    use tempfile::TempDir;

    fn sample_manual() -> Manual {
        let mut manual = Manual::new();
        manual.name = "tor - The second-generation onion router".into();
        manual.synopsis = "tor [OPTION value]...".into();
        manual.description = "Tor is a connection-oriented anonymizing communication service."
            .into();

        let _ = manual
            .commandline_options
            .insert("-f FILE".into(), "Specify a new configuration file.".into());
        let _ = manual.commandline_options.insert(
            "-h, -help".into(),
            "Display a short help message and exit.".into(),
        );

        let _ = manual
            .signals
            .insert("SIGTERM".into(), "Clean up and exit.".into());
        let _ = manual
            .files
            .insert("@CONFDIR@/torrc".into(), "The configuration file.".into());

        let mut option = ConfigOption::new("BandwidthRate");
        option.category = Category::General;
        option.usage = "N bytes|KBytes|MBytes".into();
        option.summary = "Average bandwidth usage limit".into();
        option.description = "A token bucket limits the average incoming bandwidth.".into();
        manual.insert_config_option(option);

        manual
    }

    #[test]
    fn test_database_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");
        let manual = sample_manual();

        storage::save(&manual, &path).unwrap();
        let loaded = storage::load(&path).unwrap();

        assert_eq!(manual, loaded);
    }

    #[test]
    fn test_database_roundtrip_of_empty_manual() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");

        storage::save(&Manual::new(), &path).unwrap();
        assert_eq!(Manual::new(), storage::load(&path).unwrap());
    }

    #[test]
    fn test_database_preserves_document_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");

        let mut manual = Manual::new();
        for name in ["Zebra", "Apple", "Mango"] {
            manual.insert_config_option(ConfigOption::new(name));
        }

        storage::save(&manual, &path).unwrap();
        let loaded = storage::load(&path).unwrap();

        let names: Vec<&str> = loaded.config_options.keys().map(String::as_str).collect();
        assert_eq!(vec!["Zebra", "Apple", "Mango"], names);
    }

    #[test]
    fn test_save_replaces_previous_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");

        storage::save(&sample_manual(), &path).unwrap();

        let mut replacement = Manual::new();
        replacement.name = "tor - rewritten".into();
        storage::save(&replacement, &path).unwrap();

        assert_eq!(replacement, storage::load(&path).unwrap());
    }

    #[test]
    fn test_query_against_saved_manual() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");
        storage::save(&sample_manual(), &path).unwrap();

        let mut rows = query(
            "SELECT description FROM config_options WHERE name = 'BandwidthRate'",
            Some(&path),
        )
        .unwrap();

        assert_eq!(["description"], rows.columns());
        assert_eq!(
            Some(vec![Value::Text(
                "A token bucket limits the average incoming bandwidth.".to_string()
            )]),
            rows.next()
        );
        assert_eq!(None, rows.next());
    }

    #[test]
    fn test_query_missing_database_names_exact_path() {
        let err = query("SELECT * FROM manual", Some(Path::new("/no/such/path"))).unwrap_err();
        assert_eq!("/no/such/path doesn't exist", err.to_string());
    }

    #[test]
    fn test_malformed_query_surfaces_engine_diagnostic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");
        storage::save(&Manual::new(), &path).unwrap();

        let err = query("hello world", Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_load_missing_database() {
        let err = load_from_database(Path::new("/no/such/path")).unwrap_err();
        assert_eq!("/no/such/path doesn't exist", err.to_string());
    }

    #[test]
    fn test_load_rejects_non_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");
        fs::write(&path, "plainly not a database").unwrap();

        let err = storage::load(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_load_rejects_missing_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.sqlite");

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE unrelated(x TEXT);").unwrap();
        conn.close().unwrap();

        let err = storage::load(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_database_path_override() {
        let path = database_path_from(Some("/tmp/override.sqlite")).unwrap();
        assert_eq!(Path::new("/tmp/override.sqlite"), path);

        // Blank overrides fall through to the platform default.
        let path = database_path_from(Some("   ")).unwrap();
        assert!(path.ends_with("manual.sqlite"));

        let path = database_path_from(None).unwrap();
        assert!(path.ends_with("manual.sqlite"));
    }
}
