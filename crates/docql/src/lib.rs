//! Compiles both the JSON-AST and textual query dialects to
//! the same [`ast::Query`], then to SQL against the Key-Store schema.
//!
//! This crate knows nothing about SQLite connections or the `indexes`
//! registry table directly — `translate::IndexCatalog` is the seam
//! `dbengine` implements so query compilation stays unit-testable here.

pub mod ast;
pub mod error;
mod lexer;
pub mod parse_json;
pub mod parse_text;
pub mod translate;

pub use error::{Error, Result};
pub use translate::{translate, IndexCatalog, NullIndexCatalog, ParamInfo, Translated};

/// Compiles a JSON-AST query (a `serde_json::Value`) straight to SQL.
pub fn compile_json(json: &serde_json::Value, catalog: &dyn IndexCatalog) -> Result<Translated> {
    let query = parse_json::parse_query(json)?;
    translate::translate(&query, catalog)
}

/// Compiles a textual-dialect query straight to SQL.
pub fn compile_text(src: &str, catalog: &dyn IndexCatalog) -> Result<Translated> {
    let query = parse_text::parse_query(src)?;
    translate::translate(&query, catalog)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_dialects_compile_equivalent_queries() {
        let from_json = compile_json(
            &json!({
                "WHAT": [[".name"]],
                "FROM": [{"COLLECTION": "docs"}],
                "WHERE": [">=", [".age"], 21],
            }),
            &NullIndexCatalog,
        )
        .unwrap();
        let from_text =
            compile_text("SELECT name FROM docs WHERE age >= 21", &NullIndexCatalog).unwrap();

        assert_eq!(from_json.sql, from_text.sql);
    }
}
