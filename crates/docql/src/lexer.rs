//! Hand-written lexer for the textual query dialect. Kept
//! separate from the parser so the parser reads as pure grammar.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    Param(String),
    /// Punctuation and operators: `( ) , . [ ] = == != <> < <= > >= + - * / %`.
    Symbol(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(src: &str) -> crate::error::Result<Vec<Tok>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            loop {
                if i >= bytes.len() {
                    return Err(crate::error::Error::Syntax {
                        offset: start,
                        message: "unterminated string literal".to_string(),
                    });
                }
                let ch = bytes[i] as char;
                if ch == '\\' && i + 1 < bytes.len() {
                    s.push(bytes[i + 1] as char);
                    i += 2;
                    continue;
                }
                if ch == quote {
                    i += 1;
                    break;
                }
                s.push(ch);
                i += 1;
            }
            out.push(Tok {
                token: Token::Str(s),
                offset: start,
            });
            continue;
        }

        if c == '$' {
            i += 1;
            let name_start = i;
            while i < bytes.len() && (is_ident_char(bytes[i] as char)) {
                i += 1;
            }
            out.push(Tok {
                token: Token::Param(src[name_start..i].to_string()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            let mut is_double = false;
            if i < bytes.len() && bytes[i] as char == '.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit() {
                is_double = true;
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] as char == 'e' || bytes[i] as char == 'E') {
                is_double = true;
                i += 1;
                if i < bytes.len() && (bytes[i] as char == '+' || bytes[i] as char == '-') {
                    i += 1;
                }
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
            }
            let text = &src[start..i];
            let token = if is_double {
                Token::Double(text.parse().map_err(|_| crate::error::Error::Syntax {
                    offset: start,
                    message: format!("invalid number literal {text:?}"),
                })?)
            } else {
                Token::Int(text.parse().map_err(|_| crate::error::Error::Syntax {
                    offset: start,
                    message: format!("invalid number literal {text:?}"),
                })?)
            };
            out.push(Tok { token, offset: start });
            continue;
        }

        if is_ident_start(c) {
            while i < bytes.len() && is_ident_char(bytes[i] as char) {
                i += 1;
            }
            out.push(Tok {
                token: Token::Ident(src[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        // Multi-char symbols first.
        let multi = ["<=", ">=", "!=", "<>", "=="]
            .iter()
            .find(|sym| src[start..].starts_with(*sym));
        if let Some(sym) = multi {
            i += sym.len();
            out.push(Tok {
                token: Token::Symbol(sym.to_string()),
                offset: start,
            });
            continue;
        }

        if "(),.[]=<>+-*/%".contains(c) {
            i += 1;
            out.push(Tok {
                token: Token::Symbol(c.to_string()),
                offset: start,
            });
            continue;
        }

        return Err(crate::error::Error::Syntax {
            offset: start,
            message: format!("unexpected character {c:?}"),
        });
    }

    out.push(Tok {
        token: Token::Eof,
        offset: bytes.len(),
    });
    Ok(out)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokenizes_select_statement() {
        let toks = tokenize("SELECT name, age FROM _ WHERE age >= 21").unwrap();
        let idents: Vec<_> = toks
            .iter()
            .filter_map(|t| match &t.token {
                Token::Ident(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["SELECT", "name", "age", "FROM", "_", "WHERE", "age"]);
        assert!(toks.iter().any(|t| t.token == Token::Symbol(">=".to_string())));
    }

    #[test]
    fn tokenizes_param_and_string() {
        let toks = tokenize("WHERE name = $who AND city = 'SF'").unwrap();
        assert!(toks.contains(&Tok {
            token: Token::Param("who".to_string()),
            offset: 13,
        }));
        assert!(toks
            .iter()
            .any(|t| t.token == Token::Str("SF".to_string())));
    }

    #[test]
    fn tokenizes_numbers() {
        let toks = tokenize("1 2.5 3e10").unwrap();
        assert_eq!(toks[0].token, Token::Int(1));
        assert_eq!(toks[1].token, Token::Double(2.5));
        assert_eq!(toks[2].token, Token::Double(3e10));
    }
}
