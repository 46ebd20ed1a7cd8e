//! The value-representation mapping between Binary-Doc's seven kinds and
//! SQLite's dynamic column types.
//!
//! | Binary-Doc       | SQLite                                          |
//! |------------------|--------------------------------------------------|
//! | missing property | `NULL` (not representable as a function result;  |
//! |                   | callers see it as `Ok(None)` before this module)  |
//! | `null`           | `BLOB` — the one-byte Binary-Doc null encoding,  |
//! |                   | so it's distinguishable from a missing property   |
//! | `bool`           | `BLOB` — the one-byte Binary-Doc bool encoding,  |
//! |                   | so it isn't indistinguishable from a plain integer|
//! | `int`/`uint`     | `INTEGER`                                        |
//! | `double`         | `REAL`                                           |
//! | `string`         | `TEXT`                                           |
//! | `data`           | `BLOB` — re-encoded Binary-Doc bytes             |
//! | `array`/`dict`   | `BLOB` — re-encoded Binary-Doc bytes             |

use bindoc::{Encoder, Value};
use rusqlite::types::Value as SqlValue;

/// Converts a parsed Binary-Doc value to the SQLite value an `fl_*` function
/// should return for it.
pub fn value_to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Blob(Encoder::new().null().into_bytes()),
        Value::Bool(b) => SqlValue::Blob(Encoder::new().bool(*b).into_bytes()),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::UInt(u) => {
            if *u <= i64::MAX as u64 {
                SqlValue::Integer(*u as i64)
            } else {
                // Only representable as a float past i64::MAX; documents
                // aren't expected to carry such values in practice.
                SqlValue::Real(*u as f64)
            }
        }
        Value::Double(d) => SqlValue::Real(*d),
        Value::String(s) => SqlValue::Text(s.to_string()),
        Value::Data(d) => SqlValue::Blob(Encoder::new().data(d).into_bytes()),
        Value::Array(_) | Value::Dict(_) => SqlValue::Blob(reencode(v)),
    }
}

/// Re-serializes a (possibly shared-key-encoded) value into standalone
/// Binary-Doc bytes using only plain keys, so the result is self-contained
/// once it leaves the originating Data File's shared-keys scope.
pub fn reencode(v: &Value) -> Vec<u8> {
    let mut enc = Encoder::new();
    reencode_into(v, &mut enc);
    enc.into_bytes()
}

fn reencode_into(v: &Value, enc: &mut Encoder) {
    match v {
        Value::Null => {
            enc.null();
        }
        Value::Bool(b) => {
            enc.bool(*b);
        }
        Value::Int(i) => {
            enc.int(*i);
        }
        Value::UInt(u) => {
            enc.unsigned(*u);
        }
        Value::Double(d) => {
            enc.double(*d);
        }
        Value::String(s) => {
            enc.string(s);
        }
        Value::Data(d) => {
            enc.data(d);
        }
        Value::Array(a) => {
            enc.array_header(a.count());
            for item in a.iter() {
                reencode_into(&item, enc);
            }
        }
        Value::Dict(d) => {
            enc.dict_header(d.count());
            for pair in d.iter() {
                // A malformed key/value pair here would already have failed
                // parsing; `reencode` only ever runs on values this crate
                // itself just parsed successfully.
                if let Ok((key, value)) = pair {
                    enc.plain_key(key);
                    reencode_into(&value, enc);
                }
            }
        }
    }
}

/// `true` if `bytes` is exactly the one-byte Binary-Doc encoding of `null`
/// (as opposed to SQL `NULL`, which means "missing").
pub fn is_null_marker(bytes: &[u8]) -> bool {
    matches!(bindoc::parse(bytes, None), Ok(Value::Null)) && bytes.len() == 1
}

#[cfg(test)]
mod test {
    use super::*;
    use bindoc::parse;

    #[test]
    fn null_value_is_a_distinguishable_blob() {
        let sql = value_to_sql(&Value::Null);
        match sql {
            SqlValue::Blob(bytes) => assert!(is_null_marker(&bytes)),
            other => panic!("expected Blob, got {other:?}"),
        }
    }

    #[test]
    fn scalars_map_to_native_sqlite_types() {
        assert!(matches!(value_to_sql(&Value::Int(-5)), SqlValue::Integer(-5)));
        assert!(matches!(value_to_sql(&Value::Double(1.5)), SqlValue::Real(d) if d == 1.5));
    }

    #[test]
    fn bool_is_a_distinguishable_blob() {
        let sql = value_to_sql(&Value::Bool(true));
        match sql {
            SqlValue::Blob(bytes) => assert_eq!(parse(&bytes, None).unwrap().as_bool(), Some(true)),
            other => panic!("expected Blob, got {other:?}"),
        }
    }

    #[test]
    fn array_reencodes_without_shared_keys() {
        let mut keys = bindoc::SharedKeys::new();
        let id = keys.encode("name", 2048).unwrap();
        let mut enc = Encoder::new();
        enc.dict_header(1);
        enc.shared_key(id);
        enc.string("Bob");
        let bytes = enc.into_bytes();
        let v = parse(&bytes, Some(&keys)).unwrap();

        let sql = value_to_sql(&v);
        let SqlValue::Blob(out) = sql else {
            panic!("expected Blob")
        };
        let reparsed = parse(&out, None).unwrap();
        assert_eq!(
            reparsed.as_dict().unwrap().get("name").unwrap().unwrap().as_string(),
            Some("Bob")
        );
    }
}
