//! Compiles the JSON-AST dialect into [`crate::ast`].
//!
//! The dialect's one load-bearing ambiguity: a bare JSON string is always a
//! string *literal*. A property reference or a parameter is a single-element
//! array wrapping one, e.g. `[".name"]` or `["$city"]` — that's how callers
//! distinguish "the string `.name`" from "the value at path `name`". Every
//! other array is an operator invocation `[op, args...]`.

use crate::ast::{
    Expr, JoinKind, Literal, OrderTerm, PropertyRef, Query, QuantifierKind, ResultColumn, Source,
};
use crate::error::{Error, Result};
use serde_json::Value as Json;

pub fn parse_query(json: &Json) -> Result<Query> {
    let obj = json.as_object().ok_or_else(|| Error::UnsupportedJsonValue {
        found: describe(json),
    })?;

    let mut query = Query::empty();

    let what = obj.get("WHAT").ok_or(Error::MissingWhat)?;
    query.what = what
        .as_array()
        .ok_or(Error::MissingWhat)?
        .iter()
        .map(parse_result_column)
        .collect::<Result<_>>()?;

    if let Some(from) = obj.get("FROM") {
        query.from = from
            .as_array()
            .ok_or_else(|| Error::UnsupportedJsonValue {
                found: describe(from),
            })?
            .iter()
            .map(parse_source)
            .collect::<Result<_>>()?;
    }

    if let Some(where_) = obj.get("WHERE") {
        query.where_ = Some(parse_expr(where_)?);
    }

    if let Some(group_by) = obj.get("GROUP_BY") {
        query.group_by = parse_expr_array(group_by)?;
    }

    if let Some(having) = obj.get("HAVING") {
        query.having = Some(parse_expr(having)?);
    }

    if let Some(order_by) = obj.get("ORDER_BY") {
        query.order_by = order_by
            .as_array()
            .ok_or_else(|| Error::UnsupportedJsonValue {
                found: describe(order_by),
            })?
            .iter()
            .map(parse_order_term)
            .collect::<Result<_>>()?;
    }

    if let Some(limit) = obj.get("LIMIT") {
        query.limit = Some(parse_expr(limit)?);
    }

    if let Some(offset) = obj.get("OFFSET") {
        query.offset = Some(parse_expr(offset)?);
    }

    if let Some(distinct) = obj.get("DISTINCT") {
        query.distinct = distinct.as_bool().unwrap_or(false);
    }

    Ok(query)
}

fn parse_result_column(json: &Json) -> Result<ResultColumn> {
    // `[expr, "alias"]` form: a two-element array whose *second* element is a
    // plain string names the column; everything else goes through the usual
    // expression rules (so `[".name"]` alone is still just a property ref).
    if let Some(arr) = json.as_array() {
        if arr.len() == 2 {
            if let Some(alias) = arr[1].as_str() {
                if !looks_like_bare_operator_form(&arr[0]) {
                    return Ok(ResultColumn {
                        expr: parse_expr(&arr[0])?,
                        alias: Some(alias.to_string()),
                    });
                }
            }
        }
    }
    Ok(ResultColumn {
        expr: parse_expr(json)?,
        alias: None,
    })
}

/// A two-element array is ambiguous between `[expr, alias]` and `[op, arg]`;
/// treat it as an operator call when the first element isn't itself a
/// wrapped property/param (the only shape a bare result column uses).
fn looks_like_bare_operator_form(first: &Json) -> bool {
    !matches!(first, Json::String(_) | Json::Array(_))
}

fn parse_source(json: &Json) -> Result<Source> {
    let obj = json
        .as_object()
        .ok_or_else(|| Error::UnsupportedJsonValue {
            found: describe(json),
        })?;

    if let Some(unnest) = obj.get("UNNEST") {
        return Ok(Source {
            collection: String::new(),
            alias: obj.get("AS").and_then(Json::as_str).map(str::to_string),
            join: None,
            on: None,
            unnest: Some(parse_expr(unnest)?),
        });
    }

    let collection = obj
        .get("COLLECTION")
        .and_then(Json::as_str)
        .ok_or(Error::MissingCollection)?;

    let join = match obj.get("JOIN").and_then(Json::as_str) {
        Some("LEFT") | Some("LEFT OUTER") => Some(JoinKind::LeftOuter),
        Some("CROSS") => Some(JoinKind::Cross),
        Some(_) => Some(JoinKind::Inner),
        None => None,
    };

    let on = obj.get("ON").map(parse_expr).transpose()?;

    Ok(Source {
        collection: collection.to_string(),
        alias: obj.get("AS").and_then(Json::as_str).map(str::to_string),
        join,
        on,
        unnest: None,
    })
}

fn parse_order_term(json: &Json) -> Result<OrderTerm> {
    // `["DESC", expr]` wraps descending order; anything else is ascending.
    if let Some(arr) = json.as_array() {
        if arr.len() == 2 && arr[0].as_str() == Some("DESC") {
            return Ok(OrderTerm {
                expr: parse_expr(&arr[1])?,
                descending: true,
            });
        }
    }
    Ok(OrderTerm {
        expr: parse_expr(json)?,
        descending: false,
    })
}

fn parse_expr_array(json: &Json) -> Result<Vec<Expr>> {
    json.as_array()
        .ok_or_else(|| Error::UnsupportedJsonValue {
            found: describe(json),
        })?
        .iter()
        .map(parse_expr)
        .collect()
}

pub fn parse_expr(json: &Json) -> Result<Expr> {
    match json {
        Json::Null => Ok(Expr::Literal(Literal::Null)),
        Json::Bool(b) => Ok(Expr::Literal(Literal::Bool(*b))),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Expr::Literal(Literal::Int(i)))
            } else {
                Ok(Expr::Literal(Literal::Double(n.as_f64().unwrap_or(0.0))))
            }
        }
        Json::String(s) => Ok(Expr::Literal(Literal::String(s.clone()))),
        Json::Array(arr) => parse_array_expr(arr),
        Json::Object(_) => Err(Error::UnsupportedJsonValue {
            found: describe(json),
        }),
    }
}

fn parse_array_expr(arr: &[Json]) -> Result<Expr> {
    if arr.is_empty() {
        return Err(Error::ExpectedOperatorName {
            found: "[]".to_string(),
        });
    }

    // Single-element wrapper: property path or parameter reference.
    if arr.len() == 1 {
        if let Some(s) = arr[0].as_str() {
            if let Some(rest) = s.strip_prefix('$') {
                return Ok(Expr::Param(rest.to_string()));
            }
            if s.starts_with('.') || s.is_empty() {
                return Ok(Expr::property(s));
            }
        }
    }

    let name = arr[0].as_str().ok_or_else(|| Error::ExpectedOperatorName {
        found: describe(&arr[0]),
    })?;

    match name.to_ascii_uppercase().as_str() {
        "ANY" | "EVERY" | "ANY AND EVERY" => parse_quantifier(name, &arr[1..]),
        "CASE" => parse_case(&arr[1..]),
        "ARRAY" => Ok(Expr::Array(
            arr[1..].iter().map(parse_expr).collect::<Result<_>>()?,
        )),
        "_." => parse_dotted_operator(&arr[1..]),
        _ => Ok(Expr::op(
            name.to_string(),
            arr[1..].iter().map(parse_expr).collect::<Result<_>>()?,
        )),
    }
}

/// `["ANY", "x", collectionExpr, satisfiesExpr]`.
fn parse_quantifier(name: &str, args: &[Json]) -> Result<Expr> {
    if args.len() != 3 {
        return Err(Error::WrongArgCount {
            op: name.to_string(),
            expected: "3".to_string(),
            found: args.len(),
        });
    }
    let variable = args[0]
        .as_str()
        .ok_or_else(|| Error::UnsupportedJsonValue {
            found: describe(&args[0]),
        })?
        .to_string();
    let kind = match name.to_ascii_uppercase().as_str() {
        "ANY" => QuantifierKind::Any,
        "EVERY" => QuantifierKind::Every,
        _ => QuantifierKind::AnyAndEvery,
    };
    Ok(Expr::Quantifier {
        kind,
        variable,
        collection: Box::new(parse_expr(&args[1])?),
        satisfies: Box::new(parse_expr(&args[2])?),
    })
}

/// `["CASE", [when, then], [when, then], ..., else?]`; an optional leading
/// bare (non-pair) argument is the `CASE operand WHEN ...` form's operand.
fn parse_case(args: &[Json]) -> Result<Expr> {
    let mut rest = args;
    let mut operand = None;
    if let Some(first) = rest.first() {
        if !is_when_then_pair(first) {
            operand = Some(Box::new(parse_expr(first)?));
            rest = &rest[1..];
        }
    }

    let mut whens = Vec::new();
    let mut idx = 0;
    while idx < rest.len() && is_when_then_pair(&rest[idx]) {
        let pair = rest[idx].as_array().unwrap();
        whens.push((parse_expr(&pair[0])?, parse_expr(&pair[1])?));
        idx += 1;
    }

    let else_ = if idx < rest.len() {
        Some(Box::new(parse_expr(&rest[idx])?))
    } else {
        None
    };

    Ok(Expr::Case {
        operand,
        whens,
        else_,
    })
}

fn is_when_then_pair(json: &Json) -> bool {
    matches!(json.as_array(), Some(arr) if arr.len() == 2)
}

/// Placeholder hook for a future dotted-operator extension; not part of
/// `spec.md` — kept unreachable so unknown leading-underscore names still
/// fail with a clear error instead of silently matching the catch-all.
fn parse_dotted_operator(_args: &[Json]) -> Result<Expr> {
    Err(Error::ExpectedOperatorName {
        found: "_.".to_string(),
    })
}

fn describe(json: &Json) -> String {
    match json {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "a boolean".to_string(),
        Json::Number(_) => "a number".to_string(),
        Json::String(s) => format!("{s:?}"),
        Json::Array(_) => "an array".to_string(),
        Json::Object(_) => "an object".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_select_star() {
        let q = parse_query(&json!({
            "WHAT": [["."]],
            "FROM": [{"COLLECTION": "_"}],
        }))
        .unwrap();
        assert_eq!(q.what.len(), 1);
        assert_eq!(q.from.len(), 1);
        assert_eq!(q.from[0].collection, "_");
    }

    #[test]
    fn parses_property_and_comparison() {
        let q = parse_query(&json!({
            "WHAT": [[".name"]],
            "FROM": [{"COLLECTION": "_"}],
            "WHERE": [">", [".age"], 35],
        }))
        .unwrap();
        assert_eq!(
            q.what[0].expr,
            Expr::property(".name")
        );
        assert_eq!(
            q.where_,
            Some(Expr::op(
                ">",
                vec![Expr::property(".age"), Expr::Literal(Literal::Int(35))]
            ))
        );
    }

    #[test]
    fn parses_parameter_reference() {
        let e = parse_expr(&json!(["$minAge"])).unwrap();
        assert_eq!(e, Expr::Param("minAge".to_string()));
    }

    #[test]
    fn parses_order_by_desc() {
        let q = parse_query(&json!({
            "WHAT": [["."]],
            "ORDER_BY": [["DESC", [".age"]]],
        }))
        .unwrap();
        assert!(q.order_by[0].descending);
        assert_eq!(q.order_by[0].expr, Expr::property(".age"));
    }

    #[test]
    fn parses_any_quantifier() {
        let e = parse_expr(&json!(["ANY", "x", [".tags"], ["=", ["?x"], "red"]])).unwrap();
        match e {
            Expr::Quantifier { kind, variable, .. } => {
                assert_eq!(kind, QuantifierKind::Any);
                assert_eq!(variable, "x");
            }
            other => panic!("expected Quantifier, got {other:?}"),
        }
    }

    #[test]
    fn parses_searched_case() {
        let e = parse_expr(&json!(["CASE", [[">", [".age"], 18], "adult"], "minor"])).unwrap();
        match e {
            Expr::Case { operand, whens, else_ } => {
                assert!(operand.is_none());
                assert_eq!(whens.len(), 1);
                assert!(else_.is_some());
            }
            other => panic!("expected Case, got {other:?}"),
        }
    }

    #[test]
    fn result_column_with_alias() {
        let rc = parse_result_column(&json!([[".name"], "fullName"])).unwrap();
        assert_eq!(rc.alias.as_deref(), Some("fullName"));
        assert_eq!(rc.expr, Expr::property(".name"));
    }
}
