//! The Lazy-Index Updater: a two-phase protocol letting a
//! host compute vector embeddings for changed rows between snapshots,
//! without holding a write transaction open while it does the (possibly
//! slow) embedding work.

use crate::datafile::DataFile;
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::sequence_set::SequenceSet;
use rusqlite::params;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Unset,
    Set,
    Skipped,
}

pub struct CandidateRow {
    pub rowid: i64,
    pub sequence: i64,
    /// The indexed expression's Binary-Doc encoded value for this row, for
    /// the host to embed.
    pub value: Vec<u8>,
}

/// A handle capturing one `begin_update` snapshot: the candidate rows and
/// per-row vector slots, open until `finish`.
pub struct LazyUpdate<'a> {
    db: &'a DataFile,
    index_name: String,
    vector_table: String,
    first_seq: i64,
    at_seq: i64,
    indexed_sequences: SequenceSet,
    candidates: Vec<CandidateRow>,
    slots: Vec<Slot>,
    vectors: Vec<Option<Vec<u8>>>,
    dimension: Option<u32>,
}

impl<'a> LazyUpdate<'a> {
    /// Enters the read-only loop, returning `Ok(None)` once the index is
    /// already fully caught up or the current candidate window contains no
    /// real work.
    pub fn begin(
        db: &'a DataFile,
        index_name: &str,
        key_store: &str,
        indexed_expression_sql: &str,
        vector_table: &str,
        limit: i64,
    ) -> Result<Option<LazyUpdate<'a>>> {
        loop {
            let spec = IndexManager::get(db, index_name)?
                .ok_or_else(|| Error::NoSuchIndex { name: index_name.to_string() })?;
            let indexed_sequences = spec.indexed_sequences;
            let cur_seq: i64 = db.connection().query_row(
                "SELECT lastSeq FROM kvmeta WHERE name = ?1",
                params![key_store],
                |row| row.get(0),
            )?;

            if indexed_sequences.contains_range(1, cur_seq + 1) {
                return Ok(None);
            }

            let start_seq = indexed_sequences.initial_gap_end();
            let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(key_store));
            let sql = format!(
                r#"SELECT rowid, sequence, {indexed_expression_sql}
                   FROM "{live_table}"
                   WHERE sequence >= ?1 AND {indexed_expression_sql} IS NOT NULL
                   ORDER BY sequence LIMIT ?2"#
            );
            let mut rows_fetched = 0i64;
            let mut candidates = Vec::new();
            {
                let conn = db.connection();
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![start_seq, limit])?;
                while let Some(row) = rows.next()? {
                    rows_fetched += 1;
                    let sequence: i64 = row.get(1)?;
                    if indexed_sequences.contains(sequence) {
                        continue;
                    }
                    candidates.push(CandidateRow {
                        rowid: row.get(0)?,
                        sequence,
                        value: row.get(2)?,
                    });
                }
            }

            if candidates.is_empty() {
                if rows_fetched < limit {
                    // Nothing left anywhere in the window: the whole tail is
                    // covered.
                    let mut advanced = indexed_sequences.clone();
                    advanced.add(1, cur_seq + 1);
                    IndexManager::update_indexed_sequences(db, index_name, &advanced, cur_seq)?;
                    return Ok(None);
                }
                // Every row in this window was already indexed; advance past
                // it and keep looking.
                let mut advanced = indexed_sequences.clone();
                advanced.add(start_seq, start_seq + rows_fetched);
                IndexManager::update_indexed_sequences(db, index_name, &advanced, cur_seq)?;
                continue;
            }

            let slots = vec![Slot::Unset; candidates.len()];
            let vectors = vec![None; candidates.len()];
            return Ok(Some(LazyUpdate {
                db,
                index_name: index_name.to_string(),
                vector_table: vector_table.to_string(),
                first_seq: start_seq,
                at_seq: cur_seq,
                indexed_sequences,
                candidates,
                slots,
                vectors,
                dimension: None,
            }));
        }
    }

    pub fn count(&self) -> usize {
        self.candidates.len()
    }

    /// Decodes the Binary-Doc value to embed for slot `i`.
    pub fn value_at(&self, i: usize) -> Result<bindoc::Value> {
        bindoc::parse(&self.candidates[i].value, None).map_err(Error::from)
    }

    /// The first call pins the vector dimension; later calls in the same
    /// update must match it.
    pub fn set_vector_at(&mut self, i: usize, vector: &[f32]) -> Result<()> {
        match self.dimension {
            None => self.dimension = Some(vector.len() as u32),
            Some(dim) if dim as usize != vector.len() => {
                return Err(Error::InvalidParameter(format!(
                    "vector dimension {} does not match the update's pinned dimension {dim}",
                    vector.len()
                )));
            }
            Some(_) => {}
        }
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.vectors[i] = Some(bytes);
        self.slots[i] = Slot::Set;
        Ok(())
    }

    pub fn skip_vector_at(&mut self, i: usize) {
        self.slots[i] = Slot::Skipped;
    }

    /// Requires every slot to have left `Unset`. Returns whether the index
    /// now fully covers `[1, curSeq+1)`.
    pub fn finish(mut self) -> Result<bool> {
        if self.slots.iter().any(|s| *s == Slot::Unset) {
            return Err(Error::UnsupportedOperation(
                "lazy-index update finished with an Unset slot".into(),
            ));
        }

        let conn = self.db.connection();
        let tx = conn.unchecked_transaction()?;

        let cur_seq: i64 = tx.query_row(
            "SELECT lastSeq FROM kvmeta WHERE name = (SELECT keyStore FROM indexes WHERE name = ?1)",
            params![self.index_name],
            |row| row.get(0),
        )?;

        let mut new_indexed = self.indexed_sequences.clone();
        let last_seq = self.candidates.last().map(|c| c.sequence).unwrap_or(self.first_seq);
        new_indexed.add(self.first_seq, last_seq + 1);

        // Rowids whose base-table sequence moved past `atSeq` during the
        // window were superseded by a concurrent writer; their
        // freshly-computed vectors must not land.
        let obsolete: HashSet<i64> = if cur_seq > self.at_seq {
            let key_store: String = tx.query_row(
                "SELECT keyStore FROM indexes WHERE name = ?1",
                params![self.index_name],
                |row| row.get(0),
            )?;
            let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(&key_store));
            let mut stmt = tx.prepare(&format!(
                r#"SELECT rowid FROM "{live_table}" WHERE sequence > ?1"#
            ))?;
            let rows = stmt.query_map(params![self.at_seq], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        } else {
            HashSet::new()
        };

        for (slot_index, candidate) in self.candidates.iter().enumerate() {
            match self.slots[slot_index] {
                Slot::Set if !obsolete.contains(&candidate.rowid) => {
                    let vector = self.vectors[slot_index].as_ref().expect("Set slot always has a vector");
                    tx.execute(
                        &format!(
                            r#"INSERT OR REPLACE INTO "{}" (docid, vector) VALUES (?1, ?2)"#,
                            self.vector_table
                        ),
                        params![candidate.rowid, vector],
                    )?;
                }
                Slot::Set => {
                    // Superseded by a concurrent write; drop this sequence
                    // from newIndexed so a later pass retries it.
                    new_indexed.remove(candidate.sequence);
                }
                Slot::Skipped => {
                    new_indexed.remove(candidate.sequence);
                }
                Slot::Unset => unreachable!("checked above"),
            }
        }

        IndexManager::update_indexed_sequences(self.db, &self.index_name, &new_indexed, cur_seq)?;
        tx.commit()?;

        Ok(new_indexed.contains_range(1, cur_seq + 1))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datafile::OpenOptions;
    use crate::index::{IndexType, VectorOptions};
    use crate::keystore::KeyStore;
    use crate::record::{RecordUpdate, SequenceMode};
    use crate::index::vector::{Clustering, Encoding, Metric};

    fn seeded() -> (DataFile, String) {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();
        for (key, text) in [("a", "red"), ("b", "blue")] {
            let body = bindoc::Encoder::new()
                .dict_header(1)
                .plain_key("tag")
                .string(text)
                .into_bytes();
            store
                .set(
                    &db,
                    RecordUpdate {
                        key: key.into(),
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
        }

        let options = VectorOptions {
            dimensions: 3,
            metric: Metric::Euclidean2,
            clustering: Clustering::Flat,
            encoding: Encoding::None,
            min_training_size: 0,
            max_training_size: 0,
            default_probe_count: 1,
            lazy: true,
        };
        IndexManager::create(
            &db,
            "byTagVector",
            IndexType::Vector,
            "docs",
            "[\".tag\"]",
            None,
            Some(&options),
        )
        .unwrap();
        let table = IndexManager::get(&db, "byTagVector").unwrap().unwrap().index_table_name.unwrap();
        (db, table)
    }

    #[test]
    fn full_round_trip_covers_all_sequences() {
        let (db, table) = seeded();
        let update = LazyUpdate::begin(&db, "byTagVector", "docs", "fl_value(body, 'tag')", &table, 10)
            .unwrap()
            .expect("pending work");
        assert_eq!(update.count(), 2);

        let mut update = update;
        for i in 0..update.count() {
            update.set_vector_at(i, &[0.0, 1.0, 2.0]).unwrap();
        }
        let complete = update.finish().unwrap();
        assert!(complete);

        let again = LazyUpdate::begin(&db, "byTagVector", "docs", "fl_value(body, 'tag')", &table, 10).unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn mismatched_dimension_is_rejected() {
        let (db, table) = seeded();
        let mut update = LazyUpdate::begin(&db, "byTagVector", "docs", "fl_value(body, 'tag')", &table, 10)
            .unwrap()
            .unwrap();
        update.set_vector_at(0, &[1.0, 2.0, 3.0]).unwrap();
        assert!(update.set_vector_at(1, &[1.0, 2.0]).is_err());
    }
}
