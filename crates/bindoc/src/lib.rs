//! Binary-Doc value accessor: parse the compact,
//! length-prefixed document encoding stored in a record's `body` column,
//! evaluate property paths against it, and compare values with the
//! document model's semantic (rather than byte) equality.
//!
//! This crate has no knowledge of SQLite; `sqlbridge` is the layer that
//! exposes these operations as SQL functions.

pub mod compare;
pub mod error;
pub mod legacy;
pub mod path;
pub mod shared_keys;
mod varint;
pub mod value;

pub use compare::semantically_equal;
pub use error::{Error, Result};
pub use path::Path;
pub use shared_keys::SharedKeys;
pub use value::{parse, Array, Dict, Encoder, Kind, Value};

/// Parse `body`, transparently unwrapping a legacy revision-tree container
/// first if present.
pub fn parse_record_body<'a>(
    body: &'a [u8],
    shared_keys: Option<&'a SharedKeys>,
) -> Result<Value<'a>> {
    if legacy::is_legacy_revision_tree(body) {
        let inner = legacy::extract_current_revision(body)?;
        value::parse(inner, shared_keys)
    } else {
        value::parse(body, shared_keys)
    }
}

/// Evaluate a textual property path directly against `body`, combining
/// [`path::Path::parse`] and [`path::eval`] the way SQL UDFs want to call
/// this in one step.
pub fn eval_path<'a>(
    body: &'a [u8],
    path: &str,
    shared_keys: Option<&'a SharedKeys>,
) -> Result<Option<Value<'a>>> {
    let root = parse_record_body(body, shared_keys)?;
    let parsed = path::Path::parse(path)?;
    Ok(path::eval(&parsed, root))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eval_path_through_legacy_wrapper() {
        let inner = Encoder::new().string("hello").into_bytes();

        let mut legacy_body = Vec::new();
        legacy_body.extend_from_slice(b"RVTR");
        legacy_body.extend_from_slice(&0u32.to_le_bytes());
        legacy_body.extend_from_slice(&1u32.to_le_bytes());
        legacy_body.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        legacy_body.extend_from_slice(&inner);

        let v = eval_path(&legacy_body, "", None).unwrap().unwrap();
        assert_eq!(v.as_string(), Some("hello"));
    }
}
