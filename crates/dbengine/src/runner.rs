//! The Query Runner and Enumerator: binds parameters,
//! steps a compiled query, encodes rows into a single Binary-Doc buffer,
//! and exposes a seekable, refreshable, obsolescence-aware cursor over it.

use crate::catalog::RegistryCatalog;
use crate::datafile::DataFile;
use crate::error::{Error, Result};
use bindoc::Encoder;
use docql::translate::Translated;
use rusqlite::types::ValueRef;
use std::collections::HashMap;

/// `(lastSequence, purgeCount)` watermark pinned when a query ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub last_sequence: i64,
    pub purge_count: i64,
}

pub struct Query<'a> {
    db: &'a DataFile,
    translated: Translated,
}

impl<'a> Query<'a> {
    /// Compiles `src` (textual dialect) against the engine's live index
    /// registry and ensures a queryable view exists for every collection it
    /// references.
    pub fn prepare_text(db: &'a DataFile, src: &str) -> Result<Self> {
        let catalog = RegistryCatalog::new(db);
        let translated = docql::compile_text(src, &catalog)?;
        Self::ensure_views(db, &translated)?;
        Ok(Query { db, translated })
    }

    /// Compiles a JSON-AST query the same way.
    pub fn prepare_json(db: &'a DataFile, json: &serde_json::Value) -> Result<Self> {
        let catalog = RegistryCatalog::new(db);
        let translated = docql::compile_json(json, &catalog)?;
        Self::ensure_views(db, &translated)?;
        Ok(Query { db, translated })
    }

    /// The translator addresses each collection by its bare name; this stands up a TEMP
    /// VIEW under that exact name over the KeyStore's live rows so the
    /// compiled SQL resolves without the translator knowing about `kv_`
    /// table prefixes or the live/deleted split.
    fn ensure_views(db: &DataFile, translated: &Translated) -> Result<()> {
        for collection in &translated.collection_tables_used {
            let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(collection));
            db.connection().execute_batch(&format!(
                r#"CREATE TEMP VIEW IF NOT EXISTS "{collection}" AS
                    SELECT key, sequence, version, body, extra, expiration, 0 AS deleted, rowid AS _rowid
                    FROM "{live_table}";"#
            ))?;
        }
        Ok(())
    }

    pub fn translated(&self) -> &Translated {
        &self.translated
    }

    /// Runner lifecycle steps 1-5: pin the watermark, bind
    /// parameters, step the statement, encode every row, and materialize
    /// the result as a single Binary-Doc buffer backing the enumerator.
    ///
    /// `not_older_than`, if given, short-circuits to `Ok(None)` when the
    /// caller already observed a snapshot at least as new as the current
    /// one (step 2).
    pub fn run(
        &self,
        params: &HashMap<String, rusqlite::types::Value>,
        not_older_than: Option<Watermark>,
    ) -> Result<Option<Enumerator>> {
        let conn = self.db.connection();
        let tx = conn.unchecked_transaction()?;

        let watermark = read_watermark(&tx)?;
        if let Some(floor) = not_older_than {
            if watermark.last_sequence <= floor.last_sequence && watermark.purge_count == floor.purge_count {
                return Ok(None);
            }
        }

        let mut stmt = tx.prepare(&self.translated.sql)?;
        for info in &self.translated.parameters {
            let bind_name = format!(":{}", info.name);
            let index = stmt.parameter_index(&bind_name)?;
            match (index, params.get(&info.name)) {
                (Some(idx), Some(v)) => stmt.raw_bind_parameter(idx, v)?,
                (Some(idx), None) if info.optional => {
                    stmt.raw_bind_parameter(idx, rusqlite::types::Value::Null)?
                }
                (None, Some(_)) => {
                    return Err(Error::InvalidQuery(format!("unknown parameter {}", info.name)))
                }
                (_, None) => {
                    tracing::warn!(parameter = %info.name, "query parameter left unbound");
                }
            }
        }

        let column_count = self.translated.column_titles.len();
        let first_custom = self.translated.first_custom_result_column;
        let mut enc = Encoder::new();
        let mut row_count = 0usize;

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            enc.array_header(column_count);
            let mut missing: u64 = 0;
            for i in 0..column_count {
                let value = row.get_ref(i)?;
                let is_missing = matches!(value, ValueRef::Null);
                if is_missing {
                    missing |= 1 << i;
                }
                encode_column(&mut enc, value);
            }
            enc.unsigned(missing);
            row_count += 1;
        }
        drop(rows);
        drop(stmt);
        tx.commit()?;

        let buffer = enc.into_bytes();
        Ok(Some(Enumerator {
            buffer,
            row_count,
            column_count,
            first_custom_result_column: first_custom,
            watermark,
            cursor: 0,
        }))
    }
}

/// Encodes one SQL result column. Every column's expression was compiled
/// through `fl_result`, so a BLOB is already complete Binary-Doc bytes and is
/// spliced in verbatim rather than re-wrapped.
fn encode_column(enc: &mut Encoder, value: ValueRef) {
    match value {
        ValueRef::Null => {
            enc.null();
        }
        ValueRef::Integer(i) => {
            enc.int(i);
        }
        ValueRef::Real(d) => {
            enc.double(d);
        }
        ValueRef::Text(t) => {
            enc.string(&String::from_utf8_lossy(t));
        }
        ValueRef::Blob(b) => {
            enc.raw_value(b);
        }
    }
}

fn read_watermark(tx: &rusqlite::Transaction) -> Result<Watermark> {
    let (last_sequence, purge_count) = tx.query_row(
        "SELECT COALESCE(MAX(lastSeq), 0), COALESCE(SUM(purgeCnt), 0) FROM kvmeta",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(Watermark { last_sequence, purge_count })
}

/// A snapshot of results: the 2N-slot Binary-Doc buffer `Query::run`
/// materialized, plus the watermark it was captured at.
pub struct Enumerator {
    buffer: Vec<u8>,
    row_count: usize,
    column_count: usize,
    first_custom_result_column: usize,
    watermark: Watermark,
    cursor: usize,
}

impl Enumerator {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn first_custom_result_column(&self) -> usize {
        self.first_custom_result_column
    }

    /// Decodes row `index`'s payload array and missing-columns bitmap by
    /// walking the buffer from the start — rows are variable-length so
    /// there's no O(1) random access without an auxiliary offset table,
    /// which a buffer this small doesn't warrant.
    fn decode_row(&self, index: usize) -> Option<(bindoc::Array, u64)> {
        if index >= self.row_count {
            return None;
        }
        let mut pos = 0usize;
        for i in 0..=index {
            let (array, bitmap, next) = decode_one_row(&self.buffer, pos, self.column_count)?;
            if i == index {
                return Some((array, bitmap));
            }
            pos = next;
        }
        None
    }

    /// Advances the cursor and returns the row it now points at, or `None`
    /// past the last row.
    pub fn next(&mut self) -> Option<(bindoc::Array, u64)> {
        let row = self.decode_row(self.cursor)?;
        self.cursor += 1;
        Some(row)
    }

    pub fn seek(&mut self, index: usize) -> Option<(bindoc::Array, u64)> {
        self.cursor = index;
        self.decode_row(index)
    }

    /// `columns()` starting at `firstCustomResultColumn` for row `index`.
    pub fn columns(&self, index: usize) -> Vec<Option<bindoc::Value>> {
        let Some((array, _)) = self.decode_row(index) else {
            return Vec::new();
        };
        (self.first_custom_result_column..array.count())
            .map(|i| array.get(i))
            .collect()
    }

    pub fn missing_columns(&self, index: usize) -> u64 {
        self.decode_row(index).map(|(_, bitmap)| bitmap).unwrap_or(0)
    }

    /// Shares the encoded buffer with a fresh cursor at position 0.
    pub fn clone_cursor(&self) -> Enumerator {
        Enumerator {
            buffer: self.buffer.clone(),
            row_count: self.row_count,
            column_count: self.column_count,
            first_custom_result_column: self.first_custom_result_column,
            watermark: self.watermark,
            cursor: 0,
        }
    }

    /// Obsolescence rule: a purge-count change always
    /// obsoletes; otherwise only a `lastSequence` increase paired with an
    /// actual row-payload change does.
    pub fn obsoleted_by(&self, other: &Enumerator) -> bool {
        if self.watermark.purge_count != other.watermark.purge_count {
            return true;
        }
        other.watermark.last_sequence > self.watermark.last_sequence && self.buffer != other.buffer
    }
}

/// Decodes one `(payload array, missing bitmap)` pair starting at `pos`,
/// returning the position immediately after it.
fn decode_one_row(buffer: &[u8], pos: usize, _column_count: usize) -> Option<(bindoc::Array, u64, usize)> {
    let (array_value, after_array) = bindoc::value::parse_at(buffer, pos, None).ok()?;
    let array = array_value.as_array()?;
    let (bitmap_value, after_bitmap) = bindoc::value::parse_at(buffer, after_array, None).ok()?;
    let bitmap = bitmap_value.as_unsigned().or_else(|| bitmap_value.as_int().map(|i| i as u64))?;
    Some((array, bitmap, after_bitmap))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datafile::OpenOptions;
    use crate::keystore::KeyStore;
    use crate::record::{By, Content, SequenceMode};

    fn seeded() -> DataFile {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();
        let body = bindoc::Encoder::new()
            .dict_header(1)
            .plain_key("name")
            .string("Ada")
            .into_bytes();
        store
            .set(
                &db,
                crate::record::RecordUpdate {
                    key: "a".into(),
                    body,
                    version: vec![1],
                    extra: vec![],
                    expiration: None,
                    document_flags: 0,
                    expected_sequence: None,
                    expected_subsequence: 0,
                },
                SequenceMode::AssignNew,
            )
            .unwrap();
        let _ = store.get(&db, By::Key("a"), Content::EntireBody).unwrap();
        db
    }

    #[test]
    fn runs_a_simple_projection() {
        let db = seeded();
        let query = Query::prepare_text(&db, "SELECT name FROM docs").unwrap();
        let mut results = query.run(&HashMap::new(), None).unwrap().unwrap();
        assert_eq!(results.row_count(), 1);
        let (row, missing) = results.next().unwrap();
        assert_eq!(row.get(0).unwrap().as_string(), Some("Ada"));
        assert_eq!(missing, 0);
    }

    #[test]
    fn not_older_than_current_watermark_yields_nothing() {
        let db = seeded();
        let query = Query::prepare_text(&db, "SELECT name FROM docs").unwrap();
        let first = query.run(&HashMap::new(), None).unwrap().unwrap();
        let again = query.run(&HashMap::new(), Some(first.watermark())).unwrap();
        assert!(again.is_none());
    }
}
