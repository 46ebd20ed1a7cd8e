#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("expected an operator name (string) as the first array element, found {found}")]
    ExpectedOperatorName { found: String },

    #[error("{op} expects {expected} argument(s), found {found}")]
    WrongArgCount {
        op: String,
        expected: String,
        found: usize,
    },

    #[error("unsupported JSON value in expression position: {found}")]
    UnsupportedJsonValue { found: String },

    #[error("{0}")]
    InvalidIndexReference(String),

    #[error("query is missing required 'WHAT' clause")]
    MissingWhat,

    #[error("'FROM' entry is missing required 'COLLECTION' field")]
    MissingCollection,

    #[error("invalid property path: {0}")]
    InvalidPath(#[from] bindoc::path::Error),

    #[error("textual query syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unexpected end of input while parsing textual query")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, Error>;
