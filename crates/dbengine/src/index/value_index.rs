//! Plain value indexes: a SQL index over `fl_value(body, 'path')`.

use crate::datafile::DataFile;
use crate::error::{Error, Result};
use docql::ast::Expr;

/// Extracts the single property path a value/FTS/array index expression
/// names, e.g. `[".name"]` (the JSON-AST property-reference form — a bare
/// string is always a literal in that dialect). Create calls for these
/// index types take a one-property WHAT clause; anything richer is an
/// [`Error::InvalidParameter`].
pub fn parse_single_property_path(expression: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(expression)
        .map_err(|e| Error::InvalidParameter(format!("index expression is not valid JSON: {e}")))?;

    let expr = docql::parse_json::parse_expr(&json)?;
    match expr {
        Expr::Property(p) => Ok(p.path.trim_start_matches('.').to_string()),
        _ => Err(Error::InvalidParameter(
            "index expression must be a single property reference".into(),
        )),
    }
}

fn index_name(key_store: &str, name: &str) -> String {
    format!("\"{key_store}::{name}\"")
}

pub fn create(db: &DataFile, key_store: &str, name: &str, path: &str, where_clause: Option<&str>) -> Result<()> {
    let predicate = where_clause
        .map(|w| format!(" WHERE {w}"))
        .unwrap_or_default();
    let live_table = format!("kv_{}", crate::datafile::mangle_collection_name(key_store));
    db.connection().execute_batch(&format!(
        r#"CREATE INDEX IF NOT EXISTS {idx} ON "{live_table}" (fl_value(body, '{path}')){predicate};"#,
        idx = index_name(key_store, name),
    ))?;
    Ok(())
}

pub fn drop(db: &DataFile, key_store: &str, name: &str) -> Result<()> {
    db.connection()
        .execute_batch(&format!("DROP INDEX IF EXISTS {};", index_name(key_store, name)))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_path_from_json_ast_property_reference() {
        assert_eq!(parse_single_property_path("[\".name\"]").unwrap(), "name");
        assert_eq!(parse_single_property_path("[\".age\"]").unwrap(), "age");
    }

    #[test]
    fn rejects_non_property_expressions() {
        assert!(parse_single_property_path("[\"+\", 1, 2]").is_err());
    }
}
