//! The Key-Store: one collection's live/deleted table pair and the CRUD
//! surface over it.
//!
//! A `KeyStore` is a thin handle — table names plus behavior — not an
//! owner of the connection; every method takes the [`crate::DataFile`] it
//! runs against, rather than holding a borrow-checker-hostile back-reference.
//! Writes run in an `unchecked_transaction` (rusqlite's escape hatch for a
//! single-file-mutex model where the caller, not the type system, already
//! serializes access).

use crate::datafile::{mangle_collection_name, DataFile};
use crate::error::{Error, Result};
use crate::record::{flags, By, Content, Record, RecordUpdate, SequenceMode};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationOrder {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Default)]
pub struct EnumerationOptions {
    pub since: Option<i64>,
    pub include_deleted: bool,
    pub include_conflicted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order: Option<EnumerationOrder>,
}

pub struct KeyStore {
    name: String,
    live_table: String,
    del_table: String,
    all_view: String,
}

impl KeyStore {
    pub fn new(name: &str) -> Self {
        let mangled = mangle_collection_name(name);
        KeyStore {
            name: name.to_string(),
            live_table: format!("kv_{mangled}"),
            del_table: format!("kv_del_{mangled}"),
            all_view: format!("all_{mangled}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn live_table(&self) -> &str {
        &self.live_table
    }

    pub fn del_table(&self) -> &str {
        &self.del_table
    }

    pub fn all_view(&self) -> &str {
        &self.all_view
    }

    /// Creates the table pair and the union view if they don't already
    /// exist. Idempotent, so opening an already-provisioned collection is
    /// a cheap no-op.
    pub fn ensure_schema(&self, db: &DataFile) -> Result<()> {
        let conn = db.connection();
        for table in [&self.live_table, &self.del_table] {
            conn.execute_batch(&format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (
                    key TEXT PRIMARY KEY,
                    sequence INTEGER NOT NULL,
                    flags INTEGER NOT NULL DEFAULT 0,
                    version BLOB,
                    body BLOB,
                    extra BLOB,
                    expiration INTEGER
                );
                CREATE UNIQUE INDEX IF NOT EXISTS "{table}_seq" ON "{table}"(sequence);"#
            ))?;
        }
        conn.execute_batch(&format!(
            r#"CREATE TEMP VIEW IF NOT EXISTS "{view}" AS
                SELECT * FROM "{live}" UNION ALL SELECT * FROM "{del}";"#,
            view = self.all_view,
            live = self.live_table,
            del = self.del_table,
        ))?;
        conn.execute(
            "INSERT OR IGNORE INTO kvmeta (name, lastSeq, purgeCnt) VALUES (?1, 0, 0)",
            params![self.name],
        )?;
        Ok(())
    }

    fn table_for(&self, deleted: bool) -> &str {
        if deleted {
            &self.del_table
        } else {
            &self.live_table
        }
    }

    fn columns_for(content: Content) -> &'static str {
        match content {
            Content::KeyOnly => "key, sequence, 0, NULL, NULL, NULL, NULL",
            Content::MetaOnly => "key, sequence, flags, version, NULL, NULL, expiration",
            Content::CurrentRev => "key, sequence, flags, version, body, NULL, expiration",
            Content::EntireBody => "key, sequence, flags, version, body, extra, expiration",
        }
    }

    pub fn get(&self, db: &DataFile, by: By, content: Content) -> Result<Option<Record>> {
        let conn = db.connection();
        let cols = Self::columns_for(content);
        let sql = format!(
            "SELECT {cols} FROM \"{view}\" WHERE {where_clause}",
            view = self.all_view,
            where_clause = match by {
                By::Key(_) => "key = ?1",
                By::Sequence(_) => "sequence = ?1",
            }
        );
        let row = match by {
            By::Key(k) => conn.query_row(&sql, params![k], row_to_record).optional()?,
            By::Sequence(s) => conn.query_row(&sql, params![s], row_to_record).optional()?,
        };
        Ok(row)
    }

    pub fn last_sequence(&self, db: &DataFile) -> Result<i64> {
        Ok(db.connection().query_row(
            "SELECT lastSeq FROM kvmeta WHERE name = ?1",
            params![self.name],
            |row| row.get(0),
        )?)
    }

    pub fn purge_count(&self, db: &DataFile) -> Result<i64> {
        Ok(db.connection().query_row(
            "SELECT purgeCnt FROM kvmeta WHERE name = ?1",
            params![self.name],
            |row| row.get(0),
        )?)
    }

    /// Insert-or-replace with MVCC. Returns the new
    /// sequence, or `0` if `update.expected_sequence`/`expected_subsequence`
    /// doesn't match the row's current pair.
    pub fn set(
        &self,
        db: &DataFile,
        update: RecordUpdate,
        mode: SequenceMode,
    ) -> Result<i64> {
        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;

        let current: Option<(i64, u32)> = tx
            .query_row(
                &format!(
                    "SELECT sequence, flags FROM \"{}\" WHERE key = ?1",
                    self.live_table
                ),
                params![update.key],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u32)),
            )
            .optional()?;

        let expected_ok = match current {
            None => update.expected_sequence.is_none(),
            Some((seq, fl)) => {
                update.expected_sequence == Some(seq)
                    && update.expected_subsequence == (fl >> 16)
            }
        };
        if !expected_ok {
            return Ok(0);
        }

        let new_sequence = self.next_sequence(&tx)?;
        let sequence_to_write = match mode {
            SequenceMode::AssignNew => new_sequence,
            SequenceMode::PreserveSequence => current.map(|(s, _)| s).unwrap_or(new_sequence),
        };
        let subsequence = match mode {
            SequenceMode::AssignNew => 0,
            SequenceMode::PreserveSequence => {
                current.map(|(_, f)| f >> 16).unwrap_or(0) + 1
            }
        };
        let packed_flags = update.document_flags | (subsequence << 16);

        let insert = tx.execute(
            &format!(
                r#"INSERT INTO "{table}" (key, sequence, flags, version, body, extra, expiration)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                   ON CONFLICT(key) DO UPDATE SET
                     sequence=excluded.sequence, flags=excluded.flags, version=excluded.version,
                     body=excluded.body, extra=excluded.extra, expiration=excluded.expiration"#,
                table = self.live_table
            ),
            params![
                update.key,
                sequence_to_write,
                packed_flags,
                update.version,
                update.body,
                update.extra,
                update.expiration,
            ],
        );

        let insert = match insert {
            // A unique-sequence collision is vanishingly rare (clock-driven
            // sequence assignment racing a concurrent writer) but the
            // source recovers by re-reading MAX(sequence) and retrying once.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(mode, SequenceMode::AssignNew) =>
            {
                let retried = self.next_sequence(&tx)?;
                tx.execute(
                    &format!(
                        r#"INSERT INTO "{table}" (key, sequence, flags, version, body, extra, expiration)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                           ON CONFLICT(key) DO UPDATE SET
                             sequence=excluded.sequence, flags=excluded.flags, version=excluded.version,
                             body=excluded.body, extra=excluded.extra, expiration=excluded.expiration"#,
                        table = self.live_table
                    ),
                    params![
                        update.key,
                        retried,
                        packed_flags,
                        update.version,
                        update.body,
                        update.extra,
                        update.expiration,
                    ],
                )
            }
            other => other,
        };
        insert?;

        self.bump_last_seq(&tx, sequence_to_write)?;
        tx.commit()?;
        Ok(sequence_to_write)
    }

    fn next_sequence(&self, tx: &rusqlite::Transaction) -> Result<i64> {
        let last: i64 = tx.query_row(
            "SELECT lastSeq FROM kvmeta WHERE name = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(last + 1)
    }

    fn bump_last_seq(&self, tx: &rusqlite::Transaction, sequence: i64) -> Result<()> {
        tx.execute(
            "UPDATE kvmeta SET lastSeq = MAX(lastSeq, ?2) WHERE name = ?1",
            params![self.name, sequence],
        )?;
        Ok(())
    }

    /// Deletes `key`, optionally conditional on an expected `(sequence,
    /// subsequence)`. Bumps `purgeCnt` only when a row was actually removed.
    pub fn del(
        &self,
        db: &DataFile,
        key: &str,
        expected: Option<(i64, u32)>,
    ) -> Result<bool> {
        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;

        let current: Option<(i64, u32)> = tx
            .query_row(
                &format!("SELECT sequence, flags FROM \"{}\" WHERE key = ?1", self.live_table),
                params![key],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u32)),
            )
            .optional()?;

        let Some((seq, fl)) = current else {
            return Ok(false);
        };
        if let Some((exp_seq, exp_sub)) = expected {
            if seq != exp_seq || (fl >> 16) != exp_sub {
                return Err(Error::Conflict);
            }
        }

        let removed = tx.execute(
            &format!("DELETE FROM \"{}\" WHERE key = ?1", self.live_table),
            params![key],
        )?;
        if removed > 0 {
            tx.execute(
                "UPDATE kvmeta SET purgeCnt = purgeCnt + 1 WHERE name = ?1",
                params![self.name],
            )?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Moves one record to `dest` within the same Data-File, under an
    /// exclusive transaction; the destination gets a freshly-assigned
    /// sequence and the source purge counter advances atomically with it.
    pub fn move_to(
        &self,
        db: &DataFile,
        key: &str,
        dest: &KeyStore,
        new_key: Option<&str>,
    ) -> Result<i64> {
        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;

        let row: Option<Record> = tx
            .query_row(
                &format!(
                    "SELECT key, sequence, flags, version, body, extra, expiration FROM \"{}\" WHERE key = ?1",
                    self.live_table
                ),
                params![key],
                row_to_record,
            )
            .optional()?;
        let Some(mut row) = row else {
            return Err(Error::NotFound(key.to_string()));
        };

        let dest_key = new_key.unwrap_or(key);
        let exists: bool = tx.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE key = ?1)", dest.live_table),
            params![dest_key],
            |r| r.get(0),
        )?;
        if exists {
            return Err(Error::Conflict);
        }

        let new_sequence: i64 = tx.query_row(
            "SELECT lastSeq + 1 FROM kvmeta WHERE name = ?1",
            params![dest.name],
            |row| row.get(0),
        )?;
        row.sequence = new_sequence;
        row.key = dest_key.to_string();

        tx.execute(
            &format!(
                r#"INSERT INTO "{table}" (key, sequence, flags, version, body, extra, expiration)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                table = dest.live_table
            ),
            params![
                row.key, row.sequence, row.flags, row.version, row.body, row.extra, row.expiration
            ],
        )?;
        tx.execute(
            "UPDATE kvmeta SET lastSeq = ?2 WHERE name = ?1",
            params![dest.name, new_sequence],
        )?;
        tx.execute(
            &format!("DELETE FROM \"{}\" WHERE key = ?1", self.live_table),
            params![key],
        )?;
        tx.execute(
            "UPDATE kvmeta SET purgeCnt = purgeCnt + 1 WHERE name = ?1",
            params![self.name],
        )?;
        tx.commit()?;
        Ok(new_sequence)
    }

    /// ORs `bits` into the document flags and bumps the subsequence counter.
    pub fn set_document_flag(&self, db: &DataFile, key: &str, sequence: i64, bits: u32) -> Result<()> {
        let changed = db.connection().execute(
            &format!(
                "UPDATE \"{}\" SET flags = (flags | ?3) + ?4 WHERE key = ?1 AND sequence = ?2",
                self.live_table
            ),
            params![key, sequence, bits, flags::SUBSEQUENCE_INCREMENT],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }

    /// Creates the `expiration` column lazily on first use; a no-op if it's already present from migration 400+.
    fn ensure_expiration_column(&self, db: &DataFile) -> Result<()> {
        for table in [&self.live_table, &self.del_table] {
            let has_column: bool = db.connection().query_row(
                &format!("SELECT count(*) FROM pragma_table_info('{table}') WHERE name = 'expiration'"),
                [],
                |row| Ok(row.get::<_, i64>(0)? > 0),
            )?;
            if !has_column {
                db.connection()
                    .execute_batch(&format!("ALTER TABLE \"{table}\" ADD COLUMN expiration INTEGER"))?;
            }
        }
        Ok(())
    }

    pub fn set_expiration(&self, db: &DataFile, key: &str, epoch_millis: Option<i64>) -> Result<()> {
        self.ensure_expiration_column(db)?;
        let changed = db.connection().execute(
            &format!("UPDATE \"{}\" SET expiration = ?2 WHERE key = ?1", self.live_table),
            params![key, epoch_millis],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }

    pub fn get_expiration(&self, db: &DataFile, key: &str) -> Result<Option<i64>> {
        Ok(db
            .connection()
            .query_row(
                &format!("SELECT expiration FROM \"{}\" WHERE key = ?1", self.live_table),
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .flatten())
    }

    pub fn next_expiration(&self, db: &DataFile) -> Result<Option<i64>> {
        Ok(db.connection().query_row(
            &format!(
                "SELECT MIN(expiration) FROM \"{}\" WHERE expiration IS NOT NULL",
                self.live_table
            ),
            [],
            |row| row.get(0),
        )?)
    }

    /// Deletes every row whose expiration has passed, invoking `callback`
    /// with each expired key before the batch delete.
    pub fn expire_records(
        &self,
        db: &DataFile,
        now_millis: i64,
        mut callback: impl FnMut(&str),
    ) -> Result<usize> {
        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;
        let expired_keys: Vec<String> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT key FROM \"{}\" WHERE expiration IS NOT NULL AND expiration <= ?1",
                self.live_table
            ))?;
            let rows = stmt.query_map(params![now_millis], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for key in &expired_keys {
            callback(key);
        }
        for key in &expired_keys {
            tx.execute(
                &format!("DELETE FROM \"{}\" WHERE key = ?1", self.live_table),
                params![key],
            )?;
        }
        if !expired_keys.is_empty() {
            tx.execute(
                "UPDATE kvmeta SET purgeCnt = purgeCnt + ?2 WHERE name = ?1",
                params![self.name, expired_keys.len() as i64],
            )?;
        }
        tx.commit()?;
        Ok(expired_keys.len())
    }

    /// Fetches entire bodies for `doc_ids` in a single `IN (...)` query,
    /// returned in the caller's requested order.
    pub fn with_doc_bodies(&self, db: &DataFile, doc_ids: &[String]) -> Result<Vec<Option<Record>>> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = doc_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT key, sequence, flags, version, body, extra, expiration FROM \"{}\" WHERE key IN ({placeholders})",
            self.all_view
        );
        let conn = db.connection();
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            doc_ids.iter().map(|k| k as &dyn rusqlite::ToSql).collect();
        let mut by_key = std::collections::HashMap::new();
        let rows = stmt.query_map(params.as_slice(), row_to_record)?;
        for row in rows {
            let record = row?;
            by_key.insert(record.key.clone(), record);
        }
        Ok(doc_ids.iter().map(|k| by_key.get(k).cloned()).collect())
    }

    /// Forward/backward cursor over the union view, filtered by sequence
    /// and flag bits.
    pub fn enumerate(&self, db: &DataFile, options: EnumerationOptions) -> Result<Vec<Record>> {
        let mut sql = format!(
            "SELECT key, sequence, flags, version, body, extra, expiration FROM \"{}\" WHERE 1=1",
            self.all_view
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = options.since {
            sql.push_str(" AND sequence > ?");
            binds.push(Box::new(since));
        }
        if !options.include_deleted {
            sql.push_str(&format!(" AND (flags & {}) = 0", flags::DELETED));
        }
        if !options.include_conflicted {
            sql.push_str(&format!(" AND (flags & {}) = 0", flags::CONFLICTED));
        }
        sql.push_str(match options.order {
            Some(EnumerationOrder::Reverse) => " ORDER BY sequence DESC",
            _ => " ORDER BY sequence ASC",
        });
        if let Some(limit) = options.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Box::new(limit));
            if let Some(offset) = options.offset {
                sql.push_str(" OFFSET ?");
                binds.push(Box::new(offset));
            }
        }

        let conn = db.connection();
        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(refs.as_slice(), row_to_record)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Error::from)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
    Ok(Record {
        key: row.get(0)?,
        sequence: row.get(1)?,
        flags: row.get::<_, i64>(2)? as u32,
        version: row.get::<_, Option<Vec<u8>>>(3)?.unwrap_or_default(),
        body: row.get::<_, Option<Vec<u8>>>(4)?.unwrap_or_default(),
        extra: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
        expiration: row.get(6)?,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datafile::OpenOptions;

    fn fresh_store() -> (DataFile, KeyStore) {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();
        (db, store)
    }

    fn update(key: &str, expected_sequence: Option<i64>) -> RecordUpdate {
        RecordUpdate {
            key: key.to_string(),
            body: b"doc".to_vec(),
            version: vec![1],
            extra: vec![],
            expiration: None,
            document_flags: 0,
            expected_sequence,
            expected_subsequence: 0,
        }
    }

    #[test]
    fn sequence_monotonicity_across_writes() {
        let (db, store) = fresh_store();
        let seq1 = store.set(&db, update("a", None), SequenceMode::AssignNew).unwrap();
        let seq2 = store.set(&db, update("b", None), SequenceMode::AssignNew).unwrap();
        assert!(seq2 > seq1);
    }

    #[test]
    fn conflicting_expected_sequence_returns_zero() {
        let (db, store) = fresh_store();
        let seq = store.set(&db, update("a", None), SequenceMode::AssignNew).unwrap();
        let result = store
            .set(&db, update("a", Some(seq - 1)), SequenceMode::AssignNew)
            .unwrap();
        assert_eq!(result, 0);

        let ok = store
            .set(&db, update("a", Some(seq)), SequenceMode::AssignNew)
            .unwrap();
        assert!(ok > seq);
    }

    #[test]
    fn delete_bumps_purge_count() {
        let (db, store) = fresh_store();
        store.set(&db, update("a", None), SequenceMode::AssignNew).unwrap();
        assert_eq!(store.purge_count(&db).unwrap(), 0);
        let removed = store.del(&db, "a", None).unwrap();
        assert!(removed);
        assert_eq!(store.purge_count(&db).unwrap(), 1);
    }

    #[test]
    fn expire_records_invokes_callback_for_past_expirations() {
        let (db, store) = fresh_store();
        let mut past = update("past", None);
        past.expiration = Some(100);
        store.set(&db, past, SequenceMode::AssignNew).unwrap();

        let mut future = update("future", None);
        future.expiration = Some(i64::MAX);
        store.set(&db, future, SequenceMode::AssignNew).unwrap();

        let mut seen = Vec::new();
        let removed = store.expire_records(&db, 1_000, |k| seen.push(k.to_string())).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(seen, vec!["past".to_string()]);
    }

    #[test]
    fn move_to_transfers_record_with_new_sequence() {
        let (db, source) = fresh_store();
        let dest = KeyStore::new("archived");
        dest.ensure_schema(&db).unwrap();

        source.set(&db, update("a", None), SequenceMode::AssignNew).unwrap();
        let new_seq = source.move_to(&db, "a", &dest, None).unwrap();
        assert!(new_seq > 0);
        assert!(source.get(&db, By::Key("a"), Content::KeyOnly).unwrap().is_none());
        assert!(dest.get(&db, By::Key("a"), Content::EntireBody).unwrap().is_some());
    }
}
