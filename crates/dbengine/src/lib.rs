//! The query and indexing core for an embedded, mobile-oriented document
//! database backed by SQLite: Key-Store CRUD, the Index
//! Manager, the Query Runner/Enumerator, and the Lazy-Index Updater, built
//! on the Binary-Doc accessor (`bindoc`) and SQL bridge (`sqlbridge`) and
//! compiled queries from `docql`.

pub mod catalog;
pub mod datafile;
pub mod error;
pub mod index;
pub mod keystore;
pub mod lazy;
pub mod record;
pub mod runner;
pub mod sequence_set;

pub use catalog::RegistryCatalog;
pub use datafile::{DataFile, OpenOptions};
pub use error::{Error, ErrorKind, Result};
pub use index::{IndexManager, IndexSpec, IndexType, VectorOptions};
pub use keystore::{EnumerationOptions, EnumerationOrder, KeyStore};
pub use lazy::LazyUpdate;
pub use record::{By, Content, Record, RecordUpdate, SequenceMode};
pub use runner::{Enumerator, Query, Watermark};
pub use sequence_set::SequenceSet;

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    /// An end-to-end smoke test spanning a write, a value index, and a
    /// query compiled through the real catalog — exercising the seam every
    /// other module's unit tests stub out individually.
    #[test]
    fn write_index_and_query_round_trip() {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();

        IndexManager::create(&db, "byCity", IndexType::Value, "docs", "[\".city\"]", None, None).unwrap();

        for (key, city) in [("a", "Boston"), ("b", "Seattle")] {
            let body = bindoc::Encoder::new()
                .dict_header(1)
                .plain_key("city")
                .string(city)
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

        let query = Query::prepare_text(&db, "SELECT city FROM docs WHERE city = 'Seattle'").unwrap();
        let mut results = query.run(&HashMap::new(), None).unwrap().unwrap();
        assert_eq!(results.row_count(), 1);
        let (row, _) = results.next().unwrap();
        assert_eq!(row.get(0).unwrap().as_string(), Some("Seattle"));
    }
}
