//! The `fl_*` scalar functions, registered against a
//! `rusqlite::Connection` by [`crate::register`].

use crate::error::{Error, Result};
use crate::values::value_to_sql;
use bindoc::Encoder;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;

const DETERMINISTIC: FunctionFlags =
    FunctionFlags::SQLITE_UTF8.union(FunctionFlags::SQLITE_DETERMINISTIC);

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("fl_root", 1, DETERMINISTIC, fl_root)?;
    conn.create_scalar_function("fl_value", 2, DETERMINISTIC, fl_value)?;
    conn.create_scalar_function("fl_nested_value", 2, DETERMINISTIC, fl_value)?;
    conn.create_scalar_function("fl_exists", 2, DETERMINISTIC, fl_exists)?;
    conn.create_scalar_function("fl_count", 2, DETERMINISTIC, fl_count)?;
    conn.create_scalar_function("fl_contains", 3, DETERMINISTIC, fl_contains)?;
    conn.create_scalar_function("fl_blob", 2, DETERMINISTIC, fl_blob)?;
    conn.create_scalar_function("fl_result", 1, DETERMINISTIC, fl_result)?;
    conn.create_scalar_function("fl_array", -1, DETERMINISTIC, fl_array)?;
    conn.create_scalar_function("fl_boolean_result", 1, DETERMINISTIC, fl_boolean_result)?;
    conn.create_scalar_function("fl_null", 0, DETERMINISTIC, fl_null)?;
    conn.create_scalar_function("fl_bool", 1, DETERMINISTIC, fl_bool)?;
    conn.create_scalar_function("fl_version", 1, DETERMINISTIC, fl_version)?;
    conn.create_scalar_function("fl_fts_value", 1, DETERMINISTIC, fl_fts_value)?;
    conn.create_scalar_function("fl_unnested_value", -1, DETERMINISTIC, fl_unnested_value)?;
    conn.create_scalar_function("fl_is_valued", 1, DETERMINISTIC, fl_is_valued)?;
    conn.create_scalar_function("fl_array_count", 1, DETERMINISTIC, fl_array_count)?;
    conn.create_scalar_function("fl_array_contains", 2, DETERMINISTIC, fl_array_contains)?;
    conn.create_scalar_function("fl_vector_distance", 3, DETERMINISTIC, fl_vector_distance)?;
    conn.create_scalar_function("regexp_like", 2, DETERMINISTIC, regexp_like)?;
    conn.create_scalar_function("fl_callback", -1, FunctionFlags::SQLITE_UTF8, fl_callback)?;
    Ok(())
}

fn body_arg(ctx: &Context, i: usize) -> rusqlite::Result<Option<Vec<u8>>> {
    match ctx.get_raw(i) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(b) => Ok(Some(b.to_vec())),
        other => Err(rusqlite::Error::InvalidFunctionParameterType(
            i,
            other.data_type(),
        )),
    }
}

fn path_arg(ctx: &Context, i: usize) -> rusqlite::Result<String> {
    ctx.get::<String>(i)
}

/// `fl_root(body)`: the whole parsed document as a result value.
fn fl_root(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(SqlValue::Null);
    };
    let root = bindoc::parse_record_body(&body, None).map_err(Error::from)?;
    Ok(value_to_sql(&root))
}

/// `fl_value(body, path)`: evaluates a property path, returning SQL `NULL`
/// for a missing property (distinct from the `null` value marker).
fn fl_value(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(SqlValue::Null);
    };
    let path = path_arg(ctx, 1)?;
    match bindoc::eval_path(&body, &path, None).map_err(Error::from)? {
        Some(v) => Ok(value_to_sql(&v)),
        None => Ok(SqlValue::Null),
    }
}

/// `fl_exists(body, path)`: `1` if the property is present (even if `null`),
/// `0` if missing.
fn fl_exists(ctx: &Context) -> rusqlite::Result<i64> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(0);
    };
    let path = path_arg(ctx, 1)?;
    Ok(bindoc::eval_path(&body, &path, None)
        .map_err(Error::from)?
        .is_some() as i64)
}

/// `fl_count(body, path)`: element/entry count for an array or dict at
/// `path`; `NULL` for anything else (including missing).
fn fl_count(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(SqlValue::Null);
    };
    let path = path_arg(ctx, 1)?;
    let Some(v) = bindoc::eval_path(&body, &path, None).map_err(Error::from)? else {
        return Ok(SqlValue::Null);
    };
    if let Some(a) = v.as_array() {
        return Ok(SqlValue::Integer(a.count() as i64));
    }
    if let Some(d) = v.as_dict() {
        return Ok(SqlValue::Integer(d.count() as i64));
    }
    Ok(SqlValue::Null)
}

/// `fl_contains(body, path, needle)`: semantic-equality membership test
/// against an array at `path`, using deliberately
/// asymmetric bool/number comparison.
fn fl_contains(ctx: &Context) -> rusqlite::Result<i64> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(0);
    };
    let path = path_arg(ctx, 1)?;
    let Some(haystack) = bindoc::eval_path(&body, &path, None).map_err(Error::from)? else {
        return Ok(0);
    };
    let Some(array) = haystack.as_array() else {
        return Ok(0);
    };

    let needle_bytes = normalize_sql_value(ctx.get_raw(2));
    let needle = bindoc::parse(&needle_bytes, None).map_err(Error::from)?;

    for item in array.iter() {
        if bindoc::semantically_equal(&needle, &item) {
            return Ok(1);
        }
    }
    Ok(0)
}

/// `fl_blob(body, path)`: returns the raw bytes of a `data` value at `path`,
/// or `NULL` if missing or not `data`.
fn fl_blob(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let Some(body) = body_arg(ctx, 0)? else {
        return Ok(SqlValue::Null);
    };
    let path = path_arg(ctx, 1)?;
    let Some(v) = bindoc::eval_path(&body, &path, None).map_err(Error::from)? else {
        return Ok(SqlValue::Null);
    };
    match v.as_data() {
        Some(d) => Ok(SqlValue::Blob(d.to_vec())),
        None => Ok(SqlValue::Null),
    }
}

/// `fl_result(value)`: normalizes one SQL result column for a user-facing
/// row. SQL `NULL` (a missing property) passes through unchanged so the
/// Query Runner's missing-column bitmap still applies to it; every other
/// value is coerced into pre-encoded Binary-Doc bytes, which keeps a `bool`
/// column from round-tripping as a bare `INTEGER` and losing its Kind.
fn fl_result(ctx: &Context) -> rusqlite::Result<SqlValue> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(SqlValue::Null),
        other => Ok(SqlValue::Blob(normalize_sql_value(other))),
    }
}

/// `fl_array(v1, v2, ...)`: packs arbitrary SQL argument values into a
/// Binary-Doc array, used to materialize computed `ARRAY` expressions. An
/// array has no "missing element" concept, so a `NULL` argument here becomes
/// a Binary-Doc `null` entry rather than being dropped.
fn fl_array(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let mut enc = Encoder::new();
    let n = ctx.len();
    enc.array_header(n);
    for i in 0..n {
        match ctx.get_raw(i) {
            ValueRef::Null => enc.null(),
            other => enc.raw_value(&normalize_sql_value(other)),
        };
    }
    Ok(SqlValue::Blob(enc.into_bytes()))
}

/// Coerces one SQL argument to Binary-Doc bytes. `Integer`/`Real`/`Text`
/// encode directly; a `Blob` is passed through unchanged if it's already a
/// complete Binary-Doc value (the case for a `bool`/`null` produced by
/// [`crate::values::value_to_sql`], or a nested property/array result),
/// otherwise it's wrapped as a `data` value so raw bytes can't later be
/// misread as an encoded one.
fn normalize_sql_value(v: ValueRef) -> Vec<u8> {
    match v {
        ValueRef::Null => Encoder::new().null().into_bytes(),
        ValueRef::Integer(i) => Encoder::new().int(i).into_bytes(),
        ValueRef::Real(d) => Encoder::new().double(d).into_bytes(),
        ValueRef::Text(t) => Encoder::new()
            .string(std::str::from_utf8(t).unwrap_or_default())
            .into_bytes(),
        ValueRef::Blob(b) => {
            if bindoc::parse(b, None).is_ok() {
                b.to_vec()
            } else {
                Encoder::new().data(b).into_bytes()
            }
        }
    }
}

/// `fl_boolean_result(v)`: the dialect's general truthiness coercion, for
/// the compiled form of boolean-context expressions.
fn fl_boolean_result(ctx: &Context) -> rusqlite::Result<i64> {
    let raw = ctx.get_raw(0);
    let truthy = match raw {
        ValueRef::Null => false,
        ValueRef::Integer(i) => i != 0,
        ValueRef::Real(d) => d != 0.0 && !d.is_nan(),
        ValueRef::Text(t) => !t.is_empty(),
        ValueRef::Blob(b) => match bindoc::parse(b, None) {
            Ok(v) => v.is_truthy(),
            Err(_) => !b.is_empty(),
        },
    };
    Ok(truthy as i64)
}

/// `fl_null()`: the Binary-Doc `null` marker, for emitting `NULL` into a
/// computed result position without it reading as SQL `NULL`/missing.
fn fl_null(_ctx: &Context) -> rusqlite::Result<SqlValue> {
    Ok(SqlValue::Blob(Encoder::new().null().into_bytes()))
}

/// `fl_bool(v)`: coerces `v` to the Binary-Doc boolean encoding.
fn fl_bool(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let truthy = fl_boolean_result(ctx)? != 0;
    Ok(SqlValue::Blob(Encoder::new().bool(truthy).into_bytes()))
}

/// `fl_version(raw)`: expands a document's revision-id bytes into
/// `"<generation>-<hex digest>"`. `NULL` (no revision recorded yet) stays
/// `NULL`; a `TEXT` argument is assumed already expanded and passed through.
fn fl_version(ctx: &Context) -> rusqlite::Result<SqlValue> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Blob(b) => Ok(SqlValue::Text(expand_revid(b).map_err(rusqlite::Error::from)?)),
        ValueRef::Text(t) => Ok(SqlValue::Text(String::from_utf8_lossy(t).into_owned())),
        other => Err(rusqlite::Error::InvalidFunctionParameterType(0, other.data_type())),
    }
}

/// Expands a revision-id's binary encoding - a LEB128 varint generation
/// counter followed by the revision's digest bytes - into its
/// human-readable form. This byte layout is this bridge's own storage
/// convention for the `version` column, not a format anything outside it
/// needs to parse.
fn expand_revid(bytes: &[u8]) -> crate::error::Result<String> {
    let (generation, digest) =
        read_leb128(bytes).ok_or_else(|| Error::InvalidRevisionId("truncated generation varint".into()))?;
    Ok(format!("{generation}-{}", hex_encode(digest)))
}

fn read_leb128(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate() {
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some((result, &bytes[i + 1..]));
        }
        shift += 7;
    }
    None
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// `fl_fts_value(body_fragment)`: extracts the flattened text an FTS index
/// expression indexes, from either a `string` or a `string`-array value.
fn fl_fts_value(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let raw = ctx.get_raw(0);
    let bytes = match raw {
        ValueRef::Null => return Ok(SqlValue::Null),
        ValueRef::Blob(b) => b.to_vec(),
        ValueRef::Text(t) => return Ok(SqlValue::Text(String::from_utf8_lossy(t).into_owned())),
        other => {
            return Err(rusqlite::Error::InvalidFunctionParameterType(
                0,
                other.data_type(),
            ))
        }
    };
    let v = bindoc::parse(&bytes, None).map_err(Error::from)?;
    if let Some(s) = v.as_string() {
        return Ok(SqlValue::Text(s.to_string()));
    }
    if let Some(a) = v.as_array() {
        let joined = a
            .iter()
            .filter_map(|item| item.as_string().map(str::to_string))
            .collect::<Vec<_>>()
            .join(" ");
        return Ok(SqlValue::Text(joined));
    }
    Ok(SqlValue::Null)
}

/// `fl_unnested_value(blob [, path])`: behaves like `fl_root`/`fl_value` when
/// the argument is a Binary-Doc blob; otherwise passes a 1-arg SQL value
/// through unchanged, or yields `NULL` for the 2-arg form. Unnested-array
/// index tables may hold a plain SQL-typed scalar directly in their `value`
/// column rather than a blob, and this is the function callers use to read
/// that column without tripping `fl_value`'s blob-only type check.
fn fl_unnested_value(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let argc = ctx.len();
    match ctx.get_raw(0) {
        ValueRef::Blob(_) if argc == 1 => fl_root(ctx),
        ValueRef::Blob(_) => fl_value(ctx),
        _ if argc == 1 => Ok(passthrough_sql_value(ctx.get_raw(0))),
        _ => Ok(SqlValue::Null),
    }
}

fn passthrough_sql_value(v: ValueRef) -> SqlValue {
    match v {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(d) => SqlValue::Real(d),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

/// `fl_is_valued(value)`: `1` if `value` is neither missing (SQL `NULL`) nor
/// the Binary-Doc `null` marker, `0` otherwise. Backs the `IS VALUED`
/// comparison operator.
fn fl_is_valued(ctx: &Context) -> rusqlite::Result<i64> {
    Ok(match ctx.get_raw(0) {
        ValueRef::Null => 0,
        ValueRef::Blob(b) => !crate::values::is_null_marker(b) as i64,
        _ => 1,
    })
}

/// `fl_array_count(value)`: element/entry count for an array or dict value;
/// `NULL` for anything else. Backs the `ARRAY_COUNT` operator, which (unlike
/// `fl_count`) operates on an already-evaluated value rather than a
/// `(body, path)` pair.
fn fl_array_count(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let ValueRef::Blob(b) = ctx.get_raw(0) else {
        return Ok(SqlValue::Null);
    };
    let v = bindoc::parse(b, None).map_err(Error::from)?;
    if let Some(a) = v.as_array() {
        return Ok(SqlValue::Integer(a.count() as i64));
    }
    if let Some(d) = v.as_dict() {
        return Ok(SqlValue::Integer(d.count() as i64));
    }
    Ok(SqlValue::Null)
}

/// `fl_array_contains(value, needle)`: semantic-equality membership test
/// against an already-evaluated array value, backing `ARRAY_CONTAINS`.
fn fl_array_contains(ctx: &Context) -> rusqlite::Result<i64> {
    let ValueRef::Blob(b) = ctx.get_raw(0) else {
        return Ok(0);
    };
    let v = bindoc::parse(b, None).map_err(Error::from)?;
    let Some(array) = v.as_array() else {
        return Ok(0);
    };
    let needle_bytes = normalize_sql_value(ctx.get_raw(1));
    let needle = bindoc::parse(&needle_bytes, None).map_err(Error::from)?;
    for item in array.iter() {
        if bindoc::semantically_equal(&needle, &item) {
            return Ok(1);
        }
    }
    Ok(0)
}

/// `fl_vector_distance(vector, target, metric)`: the distance between two
/// raw little-endian `f32` vectors, backing `APPROX_VECTOR_DISTANCE` over
/// the flat vector-index table. `metric` is `"euclidean2"` or `"cosine"`;
/// either input missing or length-mismatched yields SQL `NULL`.
fn fl_vector_distance(ctx: &Context) -> rusqlite::Result<SqlValue> {
    let (ValueRef::Blob(a), ValueRef::Blob(b)) = (ctx.get_raw(0), ctx.get_raw(1)) else {
        return Ok(SqlValue::Null);
    };
    let metric = ctx.get::<String>(2)?;
    let Some(a) = decode_f32_vector(a) else {
        return Ok(SqlValue::Null);
    };
    let Some(b) = decode_f32_vector(b) else {
        return Ok(SqlValue::Null);
    };
    if a.len() != b.len() || a.is_empty() {
        return Ok(SqlValue::Null);
    }
    let distance = match metric.as_str() {
        "cosine" => {
            let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a * norm_b)
            }
        }
        _ => a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum(),
    };
    Ok(SqlValue::Real(distance as f64))
}

fn decode_f32_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// `regexp_like(text, pattern)`: `1` if `text` matches `pattern` anywhere,
/// `0` if it doesn't or either side isn't text. Backs the `REGEXP_LIKE`
/// comparison operator.
fn regexp_like(ctx: &Context) -> rusqlite::Result<i64> {
    let (ValueRef::Text(text), ValueRef::Text(pattern)) = (ctx.get_raw(0), ctx.get_raw(1)) else {
        return Ok(0);
    };
    let pattern = std::str::from_utf8(pattern).unwrap_or_default();
    let re = regex::Regex::new(pattern)
        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
    Ok(re.is_match(std::str::from_utf8(text).unwrap_or_default()) as i64)
}

/// `fl_callback(...)`: a diagnostic no-op hook predictive-index drivers can
/// call to observe the arguments a query compiled for them; returns its
/// first argument unchanged.
fn fl_callback(ctx: &Context) -> rusqlite::Result<SqlValue> {
    tracing::trace!(argc = ctx.len(), "fl_callback invoked");
    if ctx.len() == 0 {
        return Ok(SqlValue::Null);
    }
    Ok(match ctx.get_raw(0) {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(d) => SqlValue::Real(d),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rusqlite::Connection;

    fn conn_with_fns() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    #[test]
    fn fl_value_reads_property_and_missing() {
        let conn = conn_with_fns();
        let body = Encoder::new()
            .dict_header(1)
            .plain_key("name")
            .string("Alice")
            .into_bytes();

        let name: String = conn
            .query_row("SELECT fl_value(?, 'name')", [body.clone()], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Alice");

        let missing: Option<String> = conn
            .query_row("SELECT fl_value(?, 'nope')", [body], |r| r.get(0))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn fl_exists_distinguishes_null_from_missing() {
        let conn = conn_with_fns();
        let body = Encoder::new()
            .dict_header(1)
            .plain_key("x")
            .null()
            .into_bytes();

        let exists: i64 = conn
            .query_row("SELECT fl_exists(?, 'x')", [body.clone()], |r| r.get(0))
            .unwrap();
        assert_eq!(exists, 1);

        let missing: i64 = conn
            .query_row("SELECT fl_exists(?, 'y')", [body], |r| r.get(0))
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn fl_contains_asymmetric_bool_number() {
        let conn = conn_with_fns();
        let body = Encoder::new()
            .dict_header(1)
            .plain_key("nums")
            .array_header(2)
            .int(0)
            .int(1)
            .into_bytes();

        let bool_hit: i64 = conn
            .query_row("SELECT fl_contains(?, 'nums', 0)", [body.clone()], |r| r.get(0))
            .unwrap();
        assert_eq!(bool_hit, 1);
    }

    #[test]
    fn fl_version_expands_generation_and_digest() {
        let conn = conn_with_fns();
        // generation 3 (single LEB128 byte) followed by a 2-byte digest.
        let revid: Vec<u8> = vec![3, 0xab, 0xcd];
        let version: String = conn
            .query_row("SELECT fl_version(?)", [revid], |r| r.get(0))
            .unwrap();
        assert_eq!(version, "3-abcd");
    }

    #[test]
    fn fl_result_preserves_bool_kind() {
        let conn = conn_with_fns();
        let bool_blob = Encoder::new().bool(true).into_bytes();
        let out: Vec<u8> = conn
            .query_row("SELECT fl_result(?)", [bool_blob], |r| r.get(0))
            .unwrap();
        let v = bindoc::parse(&out, None).unwrap();
        assert_eq!(v.as_bool(), Some(true));
    }

    #[test]
    fn fl_result_wraps_raw_blob_as_data() {
        let conn = conn_with_fns();
        let raw = vec![0xde, 0xad, 0xbe, 0xef];
        let out: Vec<u8> = conn
            .query_row("SELECT fl_result(?)", [raw.clone()], |r| r.get(0))
            .unwrap();
        let v = bindoc::parse(&out, None).unwrap();
        assert_eq!(v.as_data(), Some(raw.as_slice()));
    }

    #[test]
    fn fl_result_passes_sql_null_through() {
        let conn = conn_with_fns();
        let out: Option<Vec<u8>> = conn
            .query_row("SELECT fl_result(NULL)", [], |r| r.get(0))
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn fl_array_packs_arguments() {
        let conn = conn_with_fns();
        let out: Vec<u8> = conn
            .query_row("SELECT fl_array(1, 'two', NULL)", [], |r| r.get(0))
            .unwrap();
        let v = bindoc::parse(&out, None).unwrap();
        let array = v.as_array().unwrap();
        assert_eq!(array.count(), 3);
        assert_eq!(array.get(0).unwrap().as_int(), Some(1));
    }

    #[test]
    fn fl_unnested_value_passes_scalars_through() {
        let conn = conn_with_fns();
        let out: i64 = conn
            .query_row("SELECT fl_unnested_value(42)", [], |r| r.get(0))
            .unwrap();
        assert_eq!(out, 42);

        let blob = Encoder::new().string("hi").into_bytes();
        let out: String = conn
            .query_row("SELECT fl_unnested_value(?)", [blob], |r| r.get(0))
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn fl_is_valued_distinguishes_missing_and_null() {
        let conn = conn_with_fns();
        let present: i64 = conn
            .query_row("SELECT fl_is_valued(1)", [], |r| r.get(0))
            .unwrap();
        assert_eq!(present, 1);

        let missing: i64 = conn
            .query_row("SELECT fl_is_valued(NULL)", [], |r| r.get(0))
            .unwrap();
        assert_eq!(missing, 0);

        let null_marker = Encoder::new().null().into_bytes();
        let fleece_null: i64 = conn
            .query_row("SELECT fl_is_valued(?)", [null_marker], |r| r.get(0))
            .unwrap();
        assert_eq!(fleece_null, 0);
    }

    #[test]
    fn fl_array_contains_matches_semantically() {
        let conn = conn_with_fns();
        let array = Encoder::new().array_header(2).int(0).int(1).into_bytes();
        let hit: i64 = conn
            .query_row("SELECT fl_array_contains(?, 0)", [array], |r| r.get(0))
            .unwrap();
        assert_eq!(hit, 1);
    }

    #[test]
    fn fl_vector_distance_computes_euclidean2() {
        let conn = conn_with_fns();
        let a: Vec<u8> = [0.0f32, 0.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        let b: Vec<u8> = [3.0f32, 4.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        let distance: f64 = conn
            .query_row("SELECT fl_vector_distance(?, ?, 'euclidean2')", [a, b], |r| r.get(0))
            .unwrap();
        assert_eq!(distance, 25.0);
    }

    #[test]
    fn regexp_like_matches_pattern() {
        let conn = conn_with_fns();
        let hit: i64 = conn
            .query_row("SELECT regexp_like('hello world', 'wor.d')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hit, 1);
    }
}
