//! Vector (ANN) indexes.
//!
//! The real vendor ANN table schema is a loadable-extension concern;
//! this module owns the registry-facing surface — [`VectorOptions`], table
//! naming, and a plain flat table any `vector_distance`-style extension
//! function can be pointed at — without inventing a specific vendor's
//! clustering/quantization SQL.

use crate::datafile::DataFile;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean2,
    Cosine,
}

impl Metric {
    /// `Default` in the query language means `Euclidean2`.
    pub fn resolve(requested: Option<Metric>, index_metric: Metric) -> Metric {
        requested.unwrap_or(index_metric)
    }

    /// The name `APPROX_VECTOR_DISTANCE`/`fl_vector_distance` use for this
    /// metric, and the value stored in the `indexes` registry's `vectorMetric` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Euclidean2 => "euclidean2",
            Metric::Cosine => "cosine",
        }
    }

    pub fn parse(s: &str) -> Option<Metric> {
        match s {
            "euclidean2" => Some(Metric::Euclidean2),
            "cosine" => Some(Metric::Cosine),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clustering {
    Flat,
    Multi { subquantizers: u32, bits: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    None,
    ProductQuantization,
    ScalarQuantization,
}

#[derive(Debug, Clone, Copy)]
pub struct VectorOptions {
    pub dimensions: u32,
    pub metric: Metric,
    pub clustering: Clustering,
    pub encoding: Encoding,
    pub min_training_size: u32,
    pub max_training_size: u32,
    pub default_probe_count: u32,
    pub lazy: bool,
}

/// Vector tables have a private schema chosen by the vector-index backend;
/// this keeps the name visually distinct from the other index families
/// without asserting a schema shape beyond that.
pub fn table_name(key_store: &str, index_name: &str) -> String {
    format!("kv_{key_store}:vector:{index_name}")
}

pub fn create(db: &DataFile, table: &str, options: &VectorOptions) -> Result<()> {
    db.connection().execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (docid INTEGER PRIMARY KEY, vector BLOB NOT NULL);"#
    ))?;
    tracing::debug!(
        table,
        dimensions = options.dimensions,
        lazy = options.lazy,
        "created vector index table"
    );
    Ok(())
}

pub fn drop(db: &DataFile, table: &str) -> Result<()> {
    db.connection()
        .execute_batch(&format!(r#"DROP TABLE IF EXISTS "{table}";"#))?;
    Ok(())
}

pub fn upsert_vector(db: &DataFile, table: &str, docid: i64, vector: &[f32]) -> Result<()> {
    let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
    db.connection().execute(
        &format!(r#"INSERT OR REPLACE INTO "{table}" (docid, vector) VALUES (?1, ?2)"#),
        rusqlite::params![docid, bytes],
    )?;
    Ok(())
}

pub fn delete_vector(db: &DataFile, table: &str, docid: i64) -> Result<()> {
    db.connection().execute(
        &format!(r#"DELETE FROM "{table}" WHERE docid = ?1"#),
        rusqlite::params![docid],
    )?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_metric_resolves_to_euclidean2() {
        assert_eq!(Metric::resolve(None, Metric::Cosine), Metric::Cosine);
        assert_eq!(
            Metric::resolve(Some(Metric::Euclidean2), Metric::Cosine),
            Metric::Euclidean2
        );
    }
}
