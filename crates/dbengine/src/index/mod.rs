//! The Index Manager: the `indexes` registry table plus
//! the per-type SQL artifact each row owns.

mod array;
mod fts;
mod predictive;
mod value_index;
pub mod vector;

pub use vector::VectorOptions;

use crate::datafile::DataFile;
use crate::error::{Error, Result};
use crate::sequence_set::SequenceSet;
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Value,
    FullText,
    Array,
    Predictive,
    Vector,
}

impl IndexType {
    fn as_str(&self) -> &'static str {
        match self {
            IndexType::Value => "value",
            IndexType::FullText => "full-text",
            IndexType::Array => "array",
            IndexType::Predictive => "predictive",
            IndexType::Vector => "vector",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "value" => Some(IndexType::Value),
            "full-text" => Some(IndexType::FullText),
            "array" => Some(IndexType::Array),
            "predictive" => Some(IndexType::Predictive),
            "vector" => Some(IndexType::Vector),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub kind: IndexType,
    pub key_store: String,
    /// The original query-language source of the WHAT clause, stored
    /// verbatim for rebuild and identity comparison.
    pub expression: String,
    pub index_table_name: Option<String>,
    pub where_clause: Option<String>,
    pub indexed_sequences: SequenceSet,
    pub last_seq: i64,
    /// `"euclidean2"`/`"cosine"`, set only for [`IndexType::Vector`].
    pub vector_metric: Option<String>,
}

/// Validates a name is non-empty and carries no double-quote.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidParameter("index name must not be empty".into()));
    }
    if name.contains('"') {
        return Err(Error::InvalidParameter(
            "index name must not contain a double quote".into(),
        ));
    }
    Ok(())
}

pub struct IndexManager;

impl IndexManager {
    /// Validates the name, compiles the property path to learn its
    /// auxiliary-table shape, no-ops if an identical index already exists,
    /// else replaces it and inserts the registry row.
    pub fn create(
        db: &DataFile,
        name: &str,
        kind: IndexType,
        key_store: &str,
        expression: &str,
        where_clause: Option<&str>,
        vector_options: Option<&VectorOptions>,
    ) -> Result<()> {
        validate_name(name)?;

        if let Some(existing) = Self::get(db, name)? {
            if existing.expression == expression
                && existing.where_clause.as_deref() == where_clause
                && existing.kind == kind
            {
                tracing::debug!(name, "createIndex is a no-op: identical spec already registered");
                return Ok(());
            }
            Self::delete(db, name)?;
        }

        let property_path = value_index::parse_single_property_path(expression);
        let mut vector_metric = None;
        let index_table_name = match kind {
            IndexType::Value => {
                let property_path = property_path?;
                value_index::create(db, key_store, name, &property_path, where_clause)?;
                None
            }
            IndexType::FullText => {
                let property_path = property_path?;
                let table = fts::table_name(key_store, &property_path);
                fts::create(db, key_store, &table, &property_path)?;
                Some(table)
            }
            IndexType::Array => {
                let property_path = property_path?;
                let table = array::table_name(key_store, &property_path);
                array::create(db, key_store, &table, &property_path)?;
                Some(table)
            }
            IndexType::Predictive => {
                let table = predictive::table_name(key_store, expression);
                predictive::create(db, key_store, &table)?;
                Some(table)
            }
            IndexType::Vector => {
                let options = vector_options.ok_or_else(|| {
                    Error::InvalidParameter("vector index requires VectorOptions".into())
                })?;
                let table = vector::table_name(key_store, name);
                vector::create(db, &table, options)?;
                vector_metric = Some(options.metric.as_str().to_string());
                Some(table)
            }
        };

        db.connection().execute(
            r#"INSERT INTO indexes
                (name, type, keyStore, expression, indexTableName, whereClause, indexedSequences, lastSeq, vectorMetric)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)"#,
            params![
                name,
                kind.as_str(),
                key_store,
                expression,
                index_table_name,
                where_clause,
                SequenceSet::new().to_json(),
                vector_metric,
            ],
        )?;
        Ok(())
    }

    /// Removes the registry row, drops the SQL artifact, then runs GC for
    /// any auxiliary table orphaned by the deletion.
    pub fn delete(db: &DataFile, name: &str) -> Result<()> {
        let Some(spec) = Self::get(db, name)? else {
            return Err(Error::NoSuchIndex { name: name.to_string() });
        };

        match spec.kind {
            IndexType::Value => value_index::drop(db, &spec.key_store, name)?,
            IndexType::FullText => fts::drop(db, spec.index_table_name.as_deref().unwrap())?,
            IndexType::Array => array::drop(db, spec.index_table_name.as_deref().unwrap())?,
            IndexType::Predictive => predictive::drop(db, spec.index_table_name.as_deref().unwrap())?,
            IndexType::Vector => vector::drop(db, spec.index_table_name.as_deref().unwrap())?,
        }

        db.connection()
            .execute("DELETE FROM indexes WHERE name = ?1", params![name])?;
        Self::gc(db)?;
        Ok(())
    }

    /// Drops any auxiliary table no longer referenced by a remaining
    /// registry row, plus its `<table>::ins/del/upd/preupdate/postupdate`
    /// triggers.
    fn gc(db: &DataFile) -> Result<()> {
        let live: Vec<String> = {
            let conn = db.connection();
            let mut stmt =
                conn.prepare("SELECT DISTINCT indexTableName FROM indexes WHERE indexTableName IS NOT NULL")?;
            stmt.query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?
        };

        let candidates: Vec<String> = {
            let conn = db.connection();
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type IN ('table','view') AND name LIKE '%:%'",
            )?;
            stmt.query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?
        };

        for table in candidates {
            if live.contains(&table) {
                continue;
            }
            tracing::debug!(table, "garbage-collecting orphaned index table");
            for suffix in ["ins", "del", "upd", "preupdate", "postupdate"] {
                db.connection()
                    .execute_batch(&format!("DROP TRIGGER IF EXISTS \"{table}::{suffix}\""))?;
            }
            db.connection()
                .execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\""))?;
        }
        Ok(())
    }

    pub fn get(db: &DataFile, name: &str) -> Result<Option<IndexSpec>> {
        db.connection()
            .query_row(
                r#"SELECT name, type, keyStore, expression, indexTableName, whereClause, indexedSequences, lastSeq, vectorMetric
                   FROM indexes WHERE name = ?1"#,
                params![name],
                row_to_spec,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Enumerates rows filtered by owning KeyStore.
    pub fn list(db: &DataFile, key_store: &str) -> Result<Vec<IndexSpec>> {
        let conn = db.connection();
        let mut stmt = conn.prepare(
            r#"SELECT name, type, keyStore, expression, indexTableName, whereClause, indexedSequences, lastSeq, vectorMetric
               FROM indexes WHERE keyStore = ?1 ORDER BY name"#,
        )?;
        let rows = stmt.query_map(params![key_store], row_to_spec)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Error::from)
    }

    pub fn update_indexed_sequences(db: &DataFile, name: &str, set: &SequenceSet, last_seq: i64) -> Result<()> {
        db.connection().execute(
            "UPDATE indexes SET indexedSequences = ?2, lastSeq = ?3 WHERE name = ?1",
            params![name, set.to_json(), last_seq],
        )?;
        Ok(())
    }
}

/// Extracts the property path a value/FTS/array index's stored expression
/// names, for catalog lookups that need to match a query's property
/// reference against a registered index.
pub fn index_property_path(expression: &str) -> Result<String> {
    value_index::parse_single_property_path(expression)
}

fn row_to_spec(row: &rusqlite::Row) -> rusqlite::Result<IndexSpec> {
    let kind_text: String = row.get(1)?;
    let sequences_json: Option<String> = row.get(6)?;
    Ok(IndexSpec {
        name: row.get(0)?,
        kind: IndexType::parse(&kind_text).unwrap_or(IndexType::Value),
        key_store: row.get(2)?,
        expression: row.get(3)?,
        index_table_name: row.get(4)?,
        where_clause: row.get(5)?,
        indexed_sequences: sequences_json
            .and_then(|s| SequenceSet::from_json(&s).ok())
            .unwrap_or_default(),
        last_seq: row.get(7)?,
        vector_metric: row.get(8)?,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datafile::OpenOptions;
    use crate::keystore::KeyStore;

    fn fresh() -> (DataFile, KeyStore) {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();
        (db, store)
    }

    #[test]
    fn create_then_delete_keeps_registry_consistent() {
        let (db, _store) = fresh();
        IndexManager::create(&db, "byName", IndexType::Value, "docs", "[\".name\"]", None, None).unwrap();
        assert!(IndexManager::get(&db, "byName").unwrap().is_some());

        IndexManager::delete(&db, "byName").unwrap();
        assert!(IndexManager::get(&db, "byName").unwrap().is_none());
    }

    #[test]
    fn create_is_idempotent_for_identical_spec() {
        let (db, _store) = fresh();
        IndexManager::create(&db, "byName", IndexType::Value, "docs", "[\".name\"]", None, None).unwrap();
        IndexManager::create(&db, "byName", IndexType::Value, "docs", "[\".name\"]", None, None).unwrap();
        assert_eq!(IndexManager::list(&db, "docs").unwrap().len(), 1);
    }

    #[test]
    fn rejects_names_with_double_quotes() {
        let (db, _store) = fresh();
        let err = IndexManager::create(&db, "bad\"name", IndexType::Value, "docs", "[\".name\"]", None, None);
        assert!(err.is_err());
    }
}
