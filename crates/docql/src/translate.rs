//! Compiles a [`crate::ast::Query`] to a SQLite `SELECT` statement built on
//! the `fl_*` scalar functions `sqlbridge` registers.
//!
//! Index awareness is abstracted behind [`IndexCatalog`] so this crate never
//! depends on `dbengine`: the engine crate implements the trait against its
//! `indexes` registry table, and the translator stays testable on its own.

use crate::ast::{Expr, JoinKind, Literal, MetaField, Query, QuantifierKind, Source};
use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// What the translator needs to know about a collection's indexes to choose
/// between a full scan and an index-assisted expression (`MATCH`, unnested
/// array membership, vector `APPROX_VECTOR_DISTANCE`).
pub trait IndexCatalog {
    /// The FTS index's auxiliary table name for `collection`/`property_path`,
    /// if one exists, so `MATCH` can target `<table> MATCH ?` directly.
    fn fts_table(&self, collection: &str, property_path: &str) -> Option<String>;

    /// The predictive index's shadow table name for `collection`/`model_name`,
    /// if one is registered, so `PREDICTION` can read its cached result
    /// instead of falling back to `fl_callback`.
    fn prediction_table(&self, collection: &str, model_name: &str) -> Option<String>;

    /// `(vector_table, metric)` for the vector index named `index_name` on
    /// `collection`, if one exists. `metric` is `"euclidean2"` or `"cosine"`,
    /// never `"default"`.
    fn vector_index(&self, collection: &str, index_name: &str) -> Option<(String, String)>;
}

/// An [`IndexCatalog`] that reports no indexes; every expression still
/// compiles, just without index-assisted rewrites. Useful in tests and as a
/// fallback before an engine is attached.
pub struct NullIndexCatalog;

impl IndexCatalog for NullIndexCatalog {
    fn fts_table(&self, _collection: &str, _property_path: &str) -> Option<String> {
        None
    }

    fn prediction_table(&self, _collection: &str, _model_name: &str) -> Option<String> {
        None
    }

    fn vector_index(&self, _collection: &str, _index_name: &str) -> Option<(String, String)> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    /// parameters named with an `opt_` prefix bind to `NULL`
    /// (rather than erroring) when the caller omits them.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub sql: String,
    pub parameters: Vec<ParamInfo>,
    pub collection_tables_used: Vec<String>,
    pub fts_tables_used: Vec<String>,
    /// Index of the first `WHAT` entry that isn't a bare `.` (whole-doc)
    /// reference — the first "custom" result column.
    pub first_custom_result_column: usize,
    pub column_titles: Vec<String>,
    pub uses_expiration: bool,
}

struct Ctx<'a> {
    catalog: &'a dyn IndexCatalog,
    default_table: String,
    aliases: Vec<(String, String)>,
    parameters: Vec<ParamInfo>,
    collection_tables_used: BTreeSet<String>,
    fts_tables_used: BTreeSet<String>,
    uses_expiration: bool,
}

pub fn translate(query: &Query, catalog: &dyn IndexCatalog) -> Result<Translated> {
    let primary = query
        .from
        .first()
        .ok_or(Error::MissingCollection)?
        .clone_for_ctx();

    let mut ctx = Ctx {
        catalog,
        default_table: primary.0.clone(),
        aliases: vec![(primary.1.clone(), primary.0.clone())],
        parameters: Vec::new(),
        collection_tables_used: BTreeSet::new(),
        fts_tables_used: BTreeSet::new(),
        uses_expiration: false,
    };
    ctx.collection_tables_used.insert(primary.0.clone());

    for source in &query.from[1..] {
        if let Some(table) = source.alias.clone().or(Some(source.collection.clone())) {
            ctx.aliases.push((table, source.collection.clone()));
            ctx.collection_tables_used.insert(source.collection.clone());
        }
    }

    let mut sql = String::from("SELECT ");
    if query.distinct {
        sql.push_str("DISTINCT ");
    }

    let mut column_titles = Vec::new();
    let mut first_custom_result_column = query.what.len();
    for (i, col) in query.what.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&render_result_expr(&col.expr, &mut ctx)?);
        let title = col
            .alias
            .clone()
            .unwrap_or_else(|| default_title(&col.expr));
        if i < first_custom_result_column && !is_whole_doc(&col.expr) {
            first_custom_result_column = i;
        }
        sql.push_str(" AS ");
        sql.push_str(&quote_ident(&title));
        column_titles.push(title);
    }
    if query.what.is_empty() {
        first_custom_result_column = 0;
    }

    sql.push_str(" FROM ");
    sql.push_str(&quote_ident(&primary.0));
    sql.push_str(" AS ");
    sql.push_str(&quote_ident(&primary.1));

    for source in &query.from[1..] {
        render_join(source, &mut sql, &mut ctx)?;
    }

    if let Some(where_) = &query.where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&render_expr(where_, &mut ctx)?);
    }

    if !query.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        for (i, e) in query.group_by.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&render_expr(e, &mut ctx)?);
        }
    }

    if let Some(having) = &query.having {
        sql.push_str(" HAVING ");
        sql.push_str(&render_expr(having, &mut ctx)?);
    }

    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        for (i, term) in query.order_by.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&render_expr(&term.expr, &mut ctx)?);
            if term.descending {
                sql.push_str(" DESC");
            }
        }
    }

    if let Some(limit) = &query.limit {
        sql.push_str(" LIMIT ");
        sql.push_str(&render_expr(limit, &mut ctx)?);
    }

    if let Some(offset) = &query.offset {
        // SQLite requires a LIMIT clause before OFFSET; -1 means unbounded.
        if query.limit.is_none() {
            sql.push_str(" LIMIT -1");
        }
        sql.push_str(" OFFSET ");
        sql.push_str(&render_expr(offset, &mut ctx)?);
    }

    Ok(Translated {
        sql,
        parameters: ctx.parameters,
        collection_tables_used: ctx.collection_tables_used.into_iter().collect(),
        fts_tables_used: ctx.fts_tables_used.into_iter().collect(),
        first_custom_result_column,
        column_titles,
        uses_expiration: ctx.uses_expiration,
    })
}

impl Source {
    /// `(table, alias)` pair for the primary `FROM` entry.
    fn clone_for_ctx(&self) -> (String, String) {
        let table = self.collection.clone();
        let alias = self.alias.clone().unwrap_or_else(|| table.clone());
        (table, alias)
    }
}

fn render_join(source: &Source, sql: &mut String, ctx: &mut Ctx) -> Result<()> {
    let keyword = match source.join {
        Some(JoinKind::LeftOuter) => " LEFT JOIN ",
        Some(JoinKind::Cross) => " CROSS JOIN ",
        _ => " JOIN ",
    };

    if let Some(unnest) = &source.unnest {
        let alias = source
            .alias
            .clone()
            .ok_or_else(|| Error::UnsupportedJsonValue {
                found: "UNNEST source requires an alias".to_string(),
            })?;
        sql.push_str(keyword);
        sql.push_str("fl_each(");
        sql.push_str(&render_expr(unnest, ctx)?);
        sql.push_str(") AS ");
        sql.push_str(&quote_ident(&alias));
        ctx.aliases.push((alias, String::new()));
        return Ok(());
    }

    ctx.collection_tables_used.insert(source.collection.clone());
    let alias = source.alias.clone().unwrap_or_else(|| source.collection.clone());
    ctx.aliases.push((alias.clone(), source.collection.clone()));
    sql.push_str(keyword);
    sql.push_str(&quote_ident(&source.collection));
    sql.push_str(" AS ");
    sql.push_str(&quote_ident(&alias));
    if let Some(on) = &source.on {
        sql.push_str(" ON ");
        sql.push_str(&render_expr(on, ctx)?);
    }
    Ok(())
}

fn is_whole_doc(expr: &Expr) -> bool {
    matches!(expr, Expr::Property(p) if p.path.is_empty() || p.path == ".")
}

fn default_title(expr: &Expr) -> String {
    match expr {
        Expr::Property(p) => last_path_component(&p.path),
        Expr::Meta(m) => meta_name(*m).to_string(),
        Expr::Op { name, .. } => name.clone(),
        _ => "$1".to_string(),
    }
}

fn last_path_component(path: &str) -> String {
    path.rsplit(['.', '['])
        .next()
        .unwrap_or(path)
        .trim_end_matches(']')
        .to_string()
}

fn meta_name(meta: MetaField) -> &'static str {
    match meta {
        MetaField::Id => "_id",
        MetaField::Sequence => "_sequence",
        MetaField::Rev => "_rev",
        MetaField::Expiration => "_expiration",
        MetaField::Deleted => "_deleted",
    }
}

/// Renders a `WHAT`-clause column. Every column is wrapped in `fl_result`
/// so its encoding is normalized the same way regardless of which kind of
/// expression produced it (spec's "output columns go through `fl_result`").
fn render_result_expr(expr: &Expr, ctx: &mut Ctx) -> Result<String> {
    let inner = if is_whole_doc(expr) {
        let table = ctx
            .aliases
            .first()
            .map(|(alias, _)| alias.clone())
            .unwrap_or_else(|| ctx.default_table.clone());
        format!("fl_root({}.body)", quote_ident(&table))
    } else {
        render_expr(expr, ctx)?
    };
    Ok(format!("fl_result({inner})"))
}

fn render_expr(expr: &Expr, ctx: &mut Ctx) -> Result<String> {
    match expr {
        Expr::Literal(lit) => Ok(render_literal(lit)),
        Expr::Property(p) => render_property(p, ctx),
        Expr::Meta(m) => render_meta(*m, ctx),
        Expr::Param(name) => {
            let optional = name.starts_with("opt_");
            ctx.parameters.push(ParamInfo {
                name: name.clone(),
                optional,
            });
            Ok(format!(":{name}"))
        }
        Expr::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|e| render_expr(e, ctx))
                .collect::<Result<_>>()?;
            Ok(format!("fl_array({})", rendered.join(", ")))
        }
        Expr::Op { name, args } => render_op(name, args, ctx),
        Expr::Quantifier {
            kind,
            variable,
            collection,
            satisfies,
        } => render_quantifier(*kind, variable, collection, satisfies, ctx),
        Expr::Case {
            operand,
            whens,
            else_,
        } => render_case(operand, whens, else_, ctx),
        Expr::OrdinalOrAlias(s) => Ok(s.clone()),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "NULL".to_string(),
        Literal::Bool(b) => hex_blob_literal(&bindoc::Encoder::new().bool(*b).into_bytes()),
        Literal::Int(i) => i.to_string(),
        Literal::Double(d) => format!("{d}"),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

/// SQLite blob-literal syntax (`X'...'`) for `bytes`, used to compile a
/// Binary-Doc-encoded literal (currently just `bool`) straight into the SQL
/// text rather than through a bound parameter.
fn hex_blob_literal(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2 + 3);
    s.push_str("X'");
    for b in bytes {
        s.push_str(&format!("{b:02X}"));
    }
    s.push('\'');
    s
}

fn render_property(p: &crate::ast::PropertyRef, ctx: &mut Ctx) -> Result<String> {
    let _ = bindoc::Path::parse(&p.path)?; // validate; fl_value takes the raw textual path
    // The JSON and textual dialects disagree on whether a leading "." is
    // part of the path string; normalize so both compile to identical SQL.
    let normalized = p.path.strip_prefix('.').unwrap_or(&p.path);

    // A path rooted at a quantifier loop variable (bound via `fl_each`'s
    // `value` column, not a `body` blob) is rendered against that alias
    // instead of the query's primary table.
    if let Some((var, rest)) = match_bound_variable(normalized, p.table.as_deref(), ctx) {
        return Ok(if rest.is_empty() {
            format!("{}.value", quote_ident(&var))
        } else {
            format!("fl_value({}.value, '{}')", quote_ident(&var), rest.replace('\'', "''"))
        });
    }

    let table = p
        .table
        .clone()
        .or_else(|| ctx.aliases.first().map(|(alias, _)| alias.clone()))
        .unwrap_or_else(|| ctx.default_table.clone());
    Ok(format!(
        "fl_value({}.body, '{}')",
        quote_ident(&table),
        normalized.replace('\'', "''")
    ))
}

/// Returns `(variable, remainder_path)` when `path` (optionally qualified by
/// an explicit `table`) resolves to a bound loop variable currently in
/// scope, innermost first.
fn match_bound_variable(path: &str, table: Option<&str>, ctx: &Ctx) -> Option<(String, String)> {
    let bound: Vec<&str> = ctx
        .aliases
        .iter()
        .filter(|(_, collection)| collection.is_empty())
        .map(|(alias, _)| alias.as_str())
        .collect();

    if let Some(table) = table {
        return bound
            .iter()
            .find(|&&v| v == table)
            .map(|_| (table.to_string(), path.to_string()));
    }

    for var in bound.iter().rev() {
        if path == *var {
            return Some((var.to_string(), String::new()));
        }
        if let Some(rest) = path.strip_prefix(&format!("{var}.")) {
            return Some((var.to_string(), rest.to_string()));
        }
    }
    None
}

fn render_meta(meta: MetaField, ctx: &mut Ctx) -> Result<String> {
    let table = ctx
        .aliases
        .first()
        .map(|(alias, _)| alias.clone())
        .unwrap_or_else(|| ctx.default_table.clone());
    let column = match meta {
        MetaField::Id => "key",
        MetaField::Sequence => "sequence",
        MetaField::Rev => "version",
        MetaField::Expiration => {
            ctx.uses_expiration = true;
            "expiration"
        }
        MetaField::Deleted => "deleted",
    };
    Ok(format!("{}.{}", quote_ident(&table), column))
}

fn render_op(name: &str, args: &[Expr], ctx: &mut Ctx) -> Result<String> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "AND" | "OR" => {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| render_expr(a, ctx))
                .collect::<Result<_>>()?;
            Ok(format!("({})", rendered.join(&format!(" {upper} "))))
        }
        "NOT" => Ok(format!("(NOT {})", render_expr(&args[0], ctx)?)),
        "=" | "!=" | "<" | "<=" | ">" | ">=" | "+" | "-" | "*" | "/" | "%" if args.len() == 2 => {
            Ok(format!(
                "({} {} {})",
                render_expr(&args[0], ctx)?,
                upper,
                render_expr(&args[1], ctx)?
            ))
        }
        "-" if args.len() == 1 => Ok(format!("(-{})", render_expr(&args[0], ctx)?)),
        "BETWEEN" => Ok(format!(
            "({} BETWEEN {} AND {})",
            render_expr(&args[0], ctx)?,
            render_expr(&args[1], ctx)?,
            render_expr(&args[2], ctx)?
        )),
        "IN" => {
            let needle = render_expr(&args[0], ctx)?;
            let list: Vec<String> = args[1..]
                .iter()
                .map(|a| render_expr(a, ctx))
                .collect::<Result<_>>()?;
            Ok(format!("({} IN ({}))", needle, list.join(", ")))
        }
        "LIKE" => Ok(format!(
            "({} LIKE {})",
            render_expr(&args[0], ctx)?,
            render_expr(&args[1], ctx)?
        )),
        "IS NULL" => Ok(format!("({} IS NULL)", render_expr(&args[0], ctx)?)),
        "IS NOT NULL" => Ok(format!("({} IS NOT NULL)", render_expr(&args[0], ctx)?)),
        "IS VALUED" => Ok(format!("(fl_is_valued({}) = 1)", render_expr(&args[0], ctx)?)),
        "MATCH" => render_match(args, ctx),
        "MISSING" => Ok(format!("({} IS NULL)", render_expr(&args[0], ctx)?)),
        "REGEXP_LIKE" => Ok(format!(
            "(regexp_like({}, {}) = 1)",
            render_expr(&args[0], ctx)?,
            render_expr(&args[1], ctx)?
        )),
        "ARRAY_COUNT" => Ok(format!("fl_array_count({})", render_expr(&args[0], ctx)?)),
        "ARRAY_CONTAINS" => Ok(format!(
            "(fl_array_contains({}, {}) = 1)",
            render_expr(&args[0], ctx)?,
            render_expr(&args[1], ctx)?
        )),
        "PREDICTION" => render_prediction(args, ctx),
        "APPROX_VECTOR_DISTANCE" => render_vector_distance(args, ctx),
        _ => {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| render_expr(a, ctx))
                .collect::<Result<_>>()?;
            Ok(format!("{}({})", sql_function_name(name), rendered.join(", ")))
        }
    }
}

/// `MATCH(propertyPath, query)`: rewritten against the FTS auxiliary table
/// when one is registered for the property, falling back to `fl_fts_value`
/// otherwise.
fn render_match(args: &[Expr], ctx: &mut Ctx) -> Result<String> {
    let Expr::Property(p) = &args[0] else {
        return Err(Error::UnsupportedJsonValue {
            found: "MATCH requires a property path as its first argument".to_string(),
        });
    };
    let collection = ctx.default_table.clone();
    if let Some(table) = ctx.catalog.fts_table(&collection, &p.path) {
        ctx.fts_tables_used.insert(table.clone());
        let query = render_expr(&args[1], ctx)?;
        return Ok(format!("{} MATCH {}", quote_ident(&table), query));
    }
    Ok(format!(
        "fl_fts_value({}) MATCH {}",
        render_property(p, ctx)?,
        render_expr(&args[1], ctx)?
    ))
}

/// `PREDICTION(modelName, paramDict [, path])`: reads the matching
/// predictive index's cached result when one is registered for `modelName`;
/// falls back to `fl_callback`, the driver's diagnostic hook, when no such
/// index exists, since invoking the prediction callable itself isn't
/// something a compiled query can do.
fn render_prediction(args: &[Expr], ctx: &mut Ctx) -> Result<String> {
    let Expr::Literal(Literal::String(model_name)) = &args[0] else {
        return Err(Error::UnsupportedJsonValue {
            found: "PREDICTION requires a string literal model name".to_string(),
        });
    };
    let collection = ctx.default_table.clone();
    let table_alias = ctx
        .aliases
        .first()
        .map(|(alias, _)| alias.clone())
        .unwrap_or_else(|| collection.clone());

    if let Some(table) = ctx.catalog.prediction_table(&collection, model_name) {
        let result_expr = format!(
            "(SELECT result FROM {} WHERE docid = {}._rowid)",
            quote_ident(&table),
            quote_ident(&table_alias)
        );
        return match args.get(2) {
            Some(Expr::Literal(Literal::String(path))) => {
                Ok(format!("fl_value({result_expr}, '{}')", path.replace('\'', "''")))
            }
            Some(_) => Err(Error::InvalidIndexReference(
                "PREDICTION's path argument must be a string literal".to_string(),
            )),
            None => Ok(format!("fl_root({result_expr})")),
        };
    }

    let params = render_expr(&args[1], ctx)?;
    Ok(format!("fl_callback('{}', {params})", model_name.replace('\'', "''")))
}

/// `APPROX_VECTOR_DISTANCE(indexName, target [, metric])`: legal only where
/// a vector index of that name exists on the collection; the metric named
/// in the call, if any, must equal the index's own metric once `Default`
/// resolves to `Euclidean2`.
fn render_vector_distance(args: &[Expr], ctx: &mut Ctx) -> Result<String> {
    let Expr::Literal(Literal::String(index_name)) = &args[0] else {
        return Err(Error::UnsupportedJsonValue {
            found: "APPROX_VECTOR_DISTANCE requires a string literal index name".to_string(),
        });
    };
    let collection = ctx.default_table.clone();
    let table_alias = ctx
        .aliases
        .first()
        .map(|(alias, _)| alias.clone())
        .unwrap_or_else(|| collection.clone());

    let Some((table, index_metric)) = ctx.catalog.vector_index(&collection, index_name) else {
        return Err(Error::InvalidIndexReference(format!(
            "APPROX_VECTOR_DISTANCE requires a vector index named '{index_name}'"
        )));
    };

    if let Some(Expr::Literal(Literal::String(requested))) = args.get(2) {
        let requested = requested.to_ascii_lowercase();
        if requested != "default" && requested != index_metric {
            return Err(Error::InvalidIndexReference(format!(
                "APPROX_VECTOR_DISTANCE metric '{requested}' doesn't match index '{index_name}''s metric '{index_metric}'"
            )));
        }
    }

    let target = render_expr(&args[1], ctx)?;
    Ok(format!(
        "fl_vector_distance((SELECT vector FROM {} WHERE docid = {}._rowid), {target}, '{index_metric}')",
        quote_ident(&table),
        quote_ident(&table_alias)
    ))
}

fn render_quantifier(
    kind: QuantifierKind,
    variable: &str,
    collection: &Expr,
    satisfies: &Expr,
    ctx: &mut Ctx,
) -> Result<String> {
    let collection_sql = render_expr(collection, ctx)?;
    ctx.aliases.push((variable.to_string(), String::new()));
    let predicate = render_expr(satisfies, ctx)?;
    ctx.aliases.pop();

    let aggregate = match kind {
        QuantifierKind::Any => "MAX",
        QuantifierKind::Every => "MIN",
        QuantifierKind::AnyAndEvery => "MIN",
    };
    let base = format!(
        "(SELECT {aggregate}(CASE WHEN {predicate} THEN 1 ELSE 0 END) FROM fl_each({collection_sql}) AS {var})",
        var = quote_ident(variable)
    );
    match kind {
        QuantifierKind::Any => Ok(format!("COALESCE({base}, 0) = 1")),
        QuantifierKind::Every => Ok(format!("COALESCE({base}, 1) = 1")),
        QuantifierKind::AnyAndEvery => Ok(format!(
            "(EXISTS (SELECT 1 FROM fl_each({collection_sql})) AND COALESCE({base}, 1) = 1)"
        )),
    }
}

fn render_case(
    operand: &Option<Box<Expr>>,
    whens: &[(Expr, Expr)],
    else_: &Option<Box<Expr>>,
    ctx: &mut Ctx,
) -> Result<String> {
    let mut sql = String::from("CASE");
    if let Some(operand) = operand {
        sql.push(' ');
        sql.push_str(&render_expr(operand, ctx)?);
    }
    for (cond, then) in whens {
        sql.push_str(" WHEN ");
        sql.push_str(&render_expr(cond, ctx)?);
        sql.push_str(" THEN ");
        sql.push_str(&render_expr(then, ctx)?);
    }
    if let Some(else_) = else_ {
        sql.push_str(" ELSE ");
        sql.push_str(&render_expr(else_, ctx)?);
    }
    sql.push_str(" END");
    Ok(sql)
}

/// Maps a query-language operator name to the SQL scalar/aggregate function
/// that implements it; most pass through unchanged.
fn sql_function_name(name: &str) -> String {
    match name.to_ascii_uppercase().as_str() {
        "CONCAT" => "||".to_string(),
        other => other.to_string(),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse_json::parse_query as parse_json_query;
    use crate::parse_text::parse_query as parse_text_query;
    use serde_json::json;

    #[test]
    fn translates_simple_where() {
        let q = parse_text_query("SELECT name FROM docs WHERE age >= 21").unwrap();
        let t = translate(&q, &NullIndexCatalog).unwrap();
        assert!(t.sql.contains("fl_value(\"docs\".body, 'name')"));
        assert!(t.sql.contains(">="));
        assert_eq!(t.collection_tables_used, vec!["docs".to_string()]);
    }

    #[test]
    fn translates_parameter_and_tracks_optionality() {
        let q = parse_text_query("SELECT name FROM docs WHERE city = $opt_city").unwrap();
        let t = translate(&q, &NullIndexCatalog).unwrap();
        assert_eq!(t.parameters.len(), 1);
        assert!(t.parameters[0].optional);
        assert!(t.sql.contains(":opt_city"));
    }

    #[test]
    fn translates_whole_doc_projection() {
        let q = parse_json_query(&json!({
            "WHAT": [["."]],
            "FROM": [{"COLLECTION": "docs"}],
        }))
        .unwrap();
        let t = translate(&q, &NullIndexCatalog).unwrap();
        assert!(t.sql.contains("fl_root(\"docs\".body)"));
        assert_eq!(t.first_custom_result_column, 1);
    }

    #[test]
    fn translates_meta_expiration_flag() {
        let q = parse_text_query("SELECT _expiration FROM docs").unwrap();
        let t = translate(&q, &NullIndexCatalog).unwrap();
        assert!(t.uses_expiration);
        assert!(t.sql.contains(".expiration"));
    }

    #[test]
    fn translates_any_quantifier() {
        let q = parse_text_query("SELECT name FROM docs WHERE ANY x IN tags SATISFIES x = 'red' END")
            .unwrap();
        let t = translate(&q, &NullIndexCatalog).unwrap();
        assert!(t.sql.contains("fl_each"));
        assert!(t.sql.contains("= 1"));
    }
}
