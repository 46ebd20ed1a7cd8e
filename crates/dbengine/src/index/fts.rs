//! Full-text indexes: an FTS5 virtual table kept in sync with triggers
//! that flatten the indexed property through `fl_fts_value`.

use crate::datafile::DataFile;
use crate::error::Result;

/// `<kv>::<prop>`.
pub fn table_name(key_store: &str, path: &str) -> String {
    format!("kv_{key_store}::{path}")
}

pub fn create(db: &DataFile, key_store: &str, table: &str, path: &str) -> Result<()> {
    let conn = db.connection();
    let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(key_store));
    conn.execute_batch(&format!(
        r#"CREATE VIRTUAL TABLE IF NOT EXISTS "{table}" USING fts5(content, tokenize="unicode61");"#
    ))?;

    conn.execute_batch(&format!(
        r#"CREATE TRIGGER IF NOT EXISTS "{table}::ins" AFTER INSERT ON "{live_table}" BEGIN
             INSERT INTO "{table}"(rowid, content) VALUES (NEW.rowid, fl_fts_value(fl_value(NEW.body, '{path}')));
           END;
           CREATE TRIGGER IF NOT EXISTS "{table}::del" AFTER DELETE ON "{live_table}" BEGIN
             DELETE FROM "{table}" WHERE rowid = OLD.rowid;
           END;
           CREATE TRIGGER IF NOT EXISTS "{table}::upd" AFTER UPDATE ON "{live_table}" BEGIN
             DELETE FROM "{table}" WHERE rowid = OLD.rowid;
             INSERT INTO "{table}"(rowid, content) VALUES (NEW.rowid, fl_fts_value(fl_value(NEW.body, '{path}')));
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
