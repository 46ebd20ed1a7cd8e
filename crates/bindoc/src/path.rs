use crate::value::Value;

/// One component of a parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Property(String),
    Index(i64),
}

/// A parsed property path: dot-separated property names with bracketed
/// integer indices, `.` and `[` escaped with a leading backslash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(pub Vec<Component>);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unterminated '[' in property path {path:?}")]
    UnterminatedBracket { path: String },
    #[error("non-numeric index '{text}' in property path {path:?}")]
    NonNumericIndex { path: String, text: String },
    #[error("trailing backslash escape in property path {path:?}")]
    TrailingEscape { path: String },
}

impl Path {
    pub fn parse(path: &str) -> Result<Path, Error> {
        let mut components = Vec::new();
        let mut chars = path.chars().peekable();
        let mut current = String::new();

        // Leading `.` is conventional ("the current value") and optional;
        // both ".foo" and "foo" parse identically.
        if chars.peek() == Some(&'.') {
            chars.next();
        }

        loop {
            match chars.next() {
                None => {
                    if !current.is_empty() {
                        components.push(Component::Property(std::mem::take(&mut current)));
                    }
                    break;
                }
                Some('\\') => match chars.next() {
                    Some(escaped @ ('.' | '[')) => current.push(escaped),
                    Some(other) => current.push(other),
                    None => {
                        return Err(Error::TrailingEscape {
                            path: path.to_string(),
                        })
                    }
                },
                Some('.') => {
                    components.push(Component::Property(std::mem::take(&mut current)));
                }
                Some('[') => {
                    if !current.is_empty() {
                        components.push(Component::Property(std::mem::take(&mut current)));
                    }
                    let mut index_text = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(c) => index_text.push(c),
                            None => {
                                return Err(Error::UnterminatedBracket {
                                    path: path.to_string(),
                                })
                            }
                        }
                    }
                    let index: i64 =
                        index_text.parse().map_err(|_| Error::NonNumericIndex {
                            path: path.to_string(),
                            text: index_text,
                        })?;
                    components.push(Component::Index(index));
                    // A following '.' is optional: "a[0].b" and "a[0]b" both parse,
                    // matching the original's tolerant grammar; consume it if present.
                    if chars.peek() == Some(&'.') {
                        chars.next();
                    }
                }
                Some(other) => current.push(other),
            }
        }

        Ok(Path(components))
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }
}

/// Evaluate `path` against `root`. Returns `Ok(None)` for a missing property
/// — distinct from `Value::Null` —.1's "missing" sentinel.
pub fn eval<'a>(path: &Path, root: Value<'a>) -> Option<Value<'a>> {
    let mut current = root;
    for component in &path.0 {
        current = match (component, current) {
            (Component::Property(name), Value::Dict(dict)) => dict.get(name).ok()??,
            (Component::Index(i), Value::Array(array)) => {
                let len = array.count() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if idx < 0 {
                    return None;
                }
                array.get(idx as usize)?
            }
            // Bracket indices against a dict are permitted (spec §4.1: "bracketed
            // integer indices" are defined generically); try the index as a
            // string property name, mirroring array/dict duality elsewhere in
            // the dialect (e.g. meta `_id` style numeric-looking keys).
            (Component::Index(i), Value::Dict(dict)) => dict.get(&i.to_string()).ok()??,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::{parse, Encoder};

    #[test]
    fn parses_dotted_and_bracketed_paths() {
        assert_eq!(
            Path::parse("a.b[0].c").unwrap().0,
            vec![
                Component::Property("a".to_string()),
                Component::Property("b".to_string()),
                Component::Index(0),
                Component::Property("c".to_string()),
            ]
        );
        assert_eq!(
            Path::parse(".name").unwrap().0,
            vec![Component::Property("name".to_string())]
        );
    }

    #[test]
    fn escapes_dot_and_bracket() {
        assert_eq!(
            Path::parse(r"a\.b\[0\]").unwrap().0,
            vec![Component::Property("a.b[0]".to_string())]
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(Path::parse("a[0").is_err());
        assert!(Path::parse("a[x]").is_err());
        assert!(Path::parse(r"a\").is_err());
    }

    #[test]
    fn eval_navigates_nested_structure() {
        let mut enc = Encoder::new();
        enc.dict_header(1);
        enc.plain_key("tags");
        enc.array_header(2);
        enc.string("red");
        enc.string("green");
        let bytes = enc.into_bytes();
        let root = parse(&bytes, None).unwrap();

        let path = Path::parse("tags[1]").unwrap();
        assert_eq!(eval(&path, root).unwrap().as_string(), Some("green"));

        let missing = Path::parse("tags[5]").unwrap();
        assert!(eval(&missing, root).is_none());

        let missing_prop = Path::parse("nope").unwrap();
        assert!(eval(&missing_prop, root).is_none());
    }

    #[test]
    fn eval_supports_negative_indices() {
        let mut enc = Encoder::new();
        enc.array_header(3);
        enc.int(1);
        enc.int(2);
        enc.int(3);
        let bytes = enc.into_bytes();
        let root = parse(&bytes, None).unwrap();

        let path = Path::parse("[-1]").unwrap();
        assert_eq!(eval(&path, root).unwrap().as_int(), Some(3));
    }
}
