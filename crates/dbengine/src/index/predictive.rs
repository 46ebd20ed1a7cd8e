//! Predictive indexes: a shadow table caching the output of a named
//! "prediction" callable, keyed by a digest of `(model-name, param-dict)`.
//!
//! The prediction callable itself is an external collaborator; this module
//! only owns the cache table's lifecycle. Population is driven by the host
//! through `fl_callback`, not by a trigger, since the prediction function
//! isn't something SQLite can express as pure SQL.

use crate::datafile::DataFile;
use crate::error::Result;

/// `<kv>:prediction:<digest>`. The digest is the caller's
/// to compute (typically `fxhash` over the model name + param dict JSON);
/// this module treats `expression` as an opaque cache key already in that
/// shape.
pub fn table_name(key_store: &str, expression: &str) -> String {
    let digest = fxhash::hash64(expression.as_bytes());
    format!("kv_{key_store}:prediction:{digest:016x}")
}

pub fn create(db: &DataFile, _key_store: &str, table: &str) -> Result<()> {
    db.connection().execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (docid INTEGER PRIMARY KEY, result BLOB);"#
    ))?;
    Ok(())
}

pub fn drop(db: &DataFile, table: &str) -> Result<()> {
    db.connection()
        .execute_batch(&format!(r#"DROP TABLE IF EXISTS "{table}";"#))?;
    Ok(())
}

/// Stores the host's computed prediction result for a row, overwriting any
/// prior cached value.
pub fn store(db: &DataFile, table: &str, docid: i64, result: &[u8]) -> Result<()> {
    db.connection().execute(
        &format!(r#"INSERT OR REPLACE INTO "{table}" (docid, result) VALUES (?1, ?2)"#),
        rusqlite::params![docid, result],
    )?;
    Ok(())
}
