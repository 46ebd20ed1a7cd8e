//! The real [`docql::IndexCatalog`], backed by the `indexes` registry
//! table, so `MATCH`/`APPROX_VECTOR_DISTANCE` compile against whatever
//! indexes actually exist.

use crate::datafile::DataFile;
use crate::index::IndexManager;
use docql::IndexCatalog;

pub struct RegistryCatalog<'a> {
    db: &'a DataFile,
}

impl<'a> RegistryCatalog<'a> {
    pub fn new(db: &'a DataFile) -> Self {
        RegistryCatalog { db }
    }
}

impl<'a> IndexCatalog for RegistryCatalog<'a> {
    fn fts_table(&self, collection: &str, property_path: &str) -> Option<String> {
        let specs = IndexManager::list(self.db, collection).ok()?;
        specs
            .into_iter()
            .find(|spec| {
                spec.kind == crate::index::IndexType::FullText
                    && crate::index::index_property_path(&spec.expression)
                        .map(|p| p == property_path)
                        .unwrap_or(false)
            })
            .and_then(|spec| spec.index_table_name)
    }

    fn prediction_table(&self, collection: &str, model_name: &str) -> Option<String> {
        let specs = IndexManager::list(self.db, collection).ok()?;
        specs
            .into_iter()
            .find(|spec| spec.kind == crate::index::IndexType::Predictive && spec.expression == model_name)
            .and_then(|spec| spec.index_table_name)
    }

    fn vector_index(&self, collection: &str, index_name: &str) -> Option<(String, String)> {
        let specs = IndexManager::list(self.db, collection).ok()?;
        let spec = specs
            .into_iter()
            .find(|spec| spec.kind == crate::index::IndexType::Vector && spec.name == index_name)?;
        Some((spec.index_table_name?, spec.vector_metric?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datafile::OpenOptions;
    use crate::index::IndexType;
    use crate::keystore::KeyStore;

    #[test]
    fn resolves_fts_table_for_an_indexed_property() {
        let db = DataFile::open_in_memory(OpenOptions::default()).unwrap();
        let store = KeyStore::new("docs");
        store.ensure_schema(&db).unwrap();
        IndexManager::create(&db, "byBody", IndexType::FullText, "docs", "[\".body\"]", None, None).unwrap();

        let catalog = RegistryCatalog::new(&db);
        assert!(catalog.fts_table("docs", "body").is_some());
        assert!(catalog.fts_table("docs", "other").is_none());
    }
}
