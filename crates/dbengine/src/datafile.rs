//! A Data-File: one SQLite connection, its schema generation, and the
//! process-wide bits (shared-keys table, extension directory) that scope to
//! it.
//!
//! Migrations and `PRAGMA` setup use a tracked version number, one
//! transaction per missing migration, and `tracing::debug!` on each applied
//! step.

use crate::error::{Error, Result};
use bindoc::SharedKeys;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Schema generations, in the order they must apply.
const SCHEMA_GENERATIONS: &[(i64, &str)] = &[
    (201, MIGRATION_201),
    (301, MIGRATION_301),
    (302, MIGRATION_302),
    (400, MIGRATION_400),
    (500, MIGRATION_500),
    (501, MIGRATION_501),
];

const MIGRATION_201: &str = r#"
    CREATE TABLE IF NOT EXISTS kvmeta (
        name TEXT PRIMARY KEY,
        lastSeq INTEGER NOT NULL DEFAULT 0,
        purgeCnt INTEGER NOT NULL DEFAULT 0
    );
"#;

const MIGRATION_301: &str = r#"
    CREATE TABLE IF NOT EXISTS indexes (
        name TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        keyStore TEXT NOT NULL,
        expression TEXT NOT NULL,
        indexTableName TEXT,
        whereClause TEXT,
        indexedSequences TEXT,
        lastSeq INTEGER NOT NULL DEFAULT 0
    );
"#;

const MIGRATION_302: &str = r#"
    ALTER TABLE kvmeta ADD COLUMN purgeCntAdded INTEGER;
    UPDATE kvmeta SET purgeCntAdded = 0;
"#;

const MIGRATION_400: &str = r#"
    CREATE TABLE IF NOT EXISTS remotes (
        remote_id INTEGER PRIMARY KEY,
        address TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS remote_revs (
        remote_id INTEGER NOT NULL,
        doc_id TEXT NOT NULL,
        rev TEXT NOT NULL,
        PRIMARY KEY (remote_id, doc_id)
    );
"#;

const MIGRATION_500: &str = "";

/// A vector index's distance metric, so `APPROX_VECTOR_DISTANCE` can check
/// a call's requested metric against the index's own without re-reading the
/// index's options blob.
const MIGRATION_501: &str = r#"
    ALTER TABLE indexes ADD COLUMN vectorMetric TEXT;
"#;

/// Process-wide extension search directory. Changing it after any
/// Data-File has opened only warn-logs, matching the source's documented
/// laxness here.
static EXTENSION_DIRECTORY: OnceLock<Mutex<Option<String>>> = OnceLock::new();

pub fn set_extension_directory(path: impl Into<String>) {
    let cell = EXTENSION_DIRECTORY.get_or_init(|| Mutex::new(None));
    let mut guard = cell.lock().unwrap();
    if guard.is_some() {
        tracing::warn!("changing extension directory after a prior open took effect");
    }
    *guard = Some(path.into());
}

/// How a Data-File is opened.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub read_only: bool,
    pub busy_timeout_ms: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            read_only: false,
            busy_timeout_ms: 10_000,
        }
    }
}

impl OpenOptions {
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

pub struct DataFile {
    pub(crate) conn: Connection,
    pub(crate) shared_keys: SharedKeys,
    read_only: bool,
}

impl DataFile {
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let conn = if options.read_only {
            Connection::open_with_flags(
                &path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
            )
        } else {
            Connection::open(&path)
        }
        .map_err(|e| Error::CantOpenFile(format!("{}: {e}", path.as_ref().display())))?;

        Self::from_connection(conn, options)
    }

    pub fn open_in_memory(options: OpenOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, options)
    }

    fn from_connection(conn: Connection, options: OpenOptions) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_millis(options.busy_timeout_ms as u64))?;
        apply_pragmas(&conn)?;
        sqlbridge::register(&conn)?;

        let mut file = DataFile {
            conn,
            shared_keys: SharedKeys::new(),
            read_only: options.read_only,
        };
        file.migrate()?;
        Ok(file)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn shared_keys(&self) -> &SharedKeys {
        &self.shared_keys
    }

    pub fn shared_keys_mut(&mut self) -> &mut SharedKeys {
        &mut self.shared_keys
    }

    fn schema_version(&self) -> Result<i64> {
        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {version}"))?;
        Ok(())
    }

    /// Runs every migration above the current generation, each in its own
    /// transaction. A read-only handle with pending migrations is left
    /// un-migrated; writes against it later fail with
    /// [`Error::CantUpgradeDatabase`].
    fn migrate(&mut self) -> Result<()> {
        let mut current = self.schema_version()?;
        if current == 0 {
            // Freshly-created file: jump straight to 201 without an
            // intervening "pending migration" state.
            current = 0;
        }

        for &(generation, script) in SCHEMA_GENERATIONS {
            if generation <= current {
                continue;
            }
            if self.read_only {
                tracing::debug!(generation, "skipping migration on read-only open");
                continue;
            }
            tracing::debug!(generation, "applying schema migration");
            let tx = self.conn.transaction()?;
            if !script.trim().is_empty() {
                tx.execute_batch(script)?;
            }
            tx.execute_batch(&format!("PRAGMA user_version = {generation}"))?;
            tx.commit()?;
        }
        Ok(())
    }

    /// `true` if a write needing schema `generation` may proceed.
    pub fn require_schema(&self, generation: i64) -> Result<()> {
        if self.schema_version()? < generation {
            return Err(Error::CantUpgradeDatabase);
        }
        Ok(())
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA auto_vacuum = incremental;
        PRAGMA journal_mode = WAL;
        PRAGMA case_sensitive_like = true;
        PRAGMA fullfsync = ON;
        "#,
    )?;
    let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    tracing::debug!(journal_mode, "opened data file");
    Ok(())
}

/// Escapes uppercase letters in a collection name with a leading backslash
/// so the resulting identifier survives case-insensitive comparison.
pub fn mangle_collection_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_file_migrates_to_latest_generation() {
        let file = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        assert_eq!(file.schema_version().unwrap(), 500);
        let count: i64 = file
            .conn
            .query_row("SELECT count(*) FROM kvmeta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn read_only_open_does_not_migrate_a_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA user_version = 302;").unwrap();
        }
        let file = DataFile::open(&path, OpenOptions::default().read_only()).unwrap();
        assert_eq!(file.schema_version().unwrap(), 302);
    }

    #[test]
    fn mangles_uppercase_letters() {
        assert_eq!(mangle_collection_name("Foo"), "\\Foo");
        assert_eq!(mangle_collection_name("foo"), "foo");
    }
}
