use crate::value::Value;

/// Semantic equality used by `fl_contains`: "numbers
/// compared as numbers regardless of int/double; booleans compared as
/// integers; strings compared by bytes."
///
/// Per the REDESIGN FLAGS / open-question in §9, the boolean<->number
/// comparison is **deliberately asymmetric**, matching the original: a
/// needle that is a bare `bool` may match a haystack element that is a
/// number equal to 0/1 (an array containing integers is allowed to "contain"
/// `false`/`true`), but a needle that is a number never matches a haystack
/// element that is a `bool` — a document containing literal booleans is not
/// matched by an `ARRAY_CONTAINS(arr, 1)` search for the number one.
pub fn semantically_equal(needle: &Value, candidate: &Value) -> bool {
    match (needle, candidate) {
        (Value::Null, Value::Null) => true,
        (Value::String(a), Value::String(b)) => a.as_bytes() == b.as_bytes(),
        (Value::Data(a), Value::Data(b)) => a == b,

        (Value::Bool(a), Value::Bool(b)) => a == b,
        // Asymmetric: bool needle vs numeric candidate compares as 0/1, but
        // not the reverse (see doc comment above).
        (Value::Bool(a), _) => candidate
            .as_double()
            .map(|d| d == if *a { 1.0 } else { 0.0 })
            .unwrap_or(false),

        (Value::Int(_), _) | (Value::UInt(_), _) | (Value::Double(_), _) => {
            match (needle.as_double(), candidate.as_double()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }

        (Value::Array(a), Value::Array(b)) => {
            a.count() == b.count()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| semantically_equal(&x, &y))
        }
        (Value::Dict(a), Value::Dict(b)) => {
            if a.count() != b.count() {
                return false;
            }
            for pair in a.iter() {
                let Ok((key, value)) = pair else { return false };
                match b.get(key) {
                    Ok(Some(other)) if semantically_equal(&value, &other) => continue,
                    _ => return false,
                }
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::{parse, Encoder};

    fn v(bytes: &[u8]) -> Value<'_> {
        parse(bytes, None).unwrap()
    }

    #[test]
    fn numbers_compare_across_representations() {
        let int_bytes = Encoder::new().int(5).into_bytes();
        let uint_bytes = Encoder::new().unsigned(5).into_bytes();
        let double_bytes = Encoder::new().double(5.0).into_bytes();
        assert!(semantically_equal(&v(&int_bytes), &v(&uint_bytes)));
        assert!(semantically_equal(&v(&int_bytes), &v(&double_bytes)));
    }

    #[test]
    fn bool_vs_number_is_asymmetric() {
        let true_bytes = Encoder::new().bool(true).into_bytes();
        let one_bytes = Encoder::new().int(1).into_bytes();

        // bool needle, numeric candidate: matches.
        assert!(semantically_equal(&v(&true_bytes), &v(&one_bytes)));
        // numeric needle, bool candidate: does not match.
        assert!(!semantically_equal(&v(&one_bytes), &v(&true_bytes)));
    }

    #[test]
    fn strings_compare_by_bytes() {
        let a = Encoder::new().string("abc").into_bytes();
        let b = Encoder::new().string("abc").into_bytes();
        let c = Encoder::new().string("abd").into_bytes();
        assert!(semantically_equal(&v(&a), &v(&b)));
        assert!(!semantically_equal(&v(&a), &v(&c)));
    }
}
