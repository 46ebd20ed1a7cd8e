//! Array (unnested) indexes: a shadow table holding one row per array
//! element, kept current by triggers on the source table.

use crate::datafile::DataFile;
use crate::error::Result;

/// `<kv>:unnest:<prop>`.
pub fn table_name(key_store: &str, path: &str) -> String {
    format!("kv_{key_store}:unnest:{path}")
}

pub fn create(db: &DataFile, key_store: &str, table: &str, path: &str) -> Result<()> {
    let conn = db.connection();
    let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(key_store));
    conn.execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (docid INTEGER NOT NULL, value);
           CREATE INDEX IF NOT EXISTS "{table}::idx" ON "{table}"(value);"#
    ))?;

    conn.execute_batch(&format!(
        r#"CREATE TRIGGER IF NOT EXISTS "{table}::ins" AFTER INSERT ON "{live_table}" BEGIN
             INSERT INTO "{table}"(docid, value)
               SELECT NEW.rowid, each.value FROM fl_each(NEW.body, '{path}') AS each;
           END;
           CREATE TRIGGER IF NOT EXISTS "{table}::del" AFTER DELETE ON "{live_table}" BEGIN
             DELETE FROM "{table}" WHERE docid = OLD.rowid;
           END;
           CREATE TRIGGER IF NOT EXISTS "{table}::upd" AFTER UPDATE ON "{live_table}" BEGIN
             DELETE FROM "{table}" WHERE docid = OLD.rowid;
             INSERT INTO "{table}"(docid, value)
               SELECT NEW.rowid, each.value FROM fl_each(NEW.body, '{path}') AS each;
           END;"#
    ))?;
    Ok(())
}

pub fn drop(db: &DataFile, table: &str) -> Result<()> {
    for suffix in ["ins", "del", "upd"] {
        db.connection()
            .execute_batch(&format!(r#"DROP TRIGGER IF EXISTS "{table}::{suffix}";"#))?;
    }
    db.connection()
        .execute_batch(&format!(r#"DROP TABLE IF EXISTS "{table}";"#))?;
    Ok(())
}
