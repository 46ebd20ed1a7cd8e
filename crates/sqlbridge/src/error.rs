/// Errors raised inside an `fl_*` UDF body, before they're translated to a
/// SQLite result code at the call boundary.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid Binary-Doc value: {0}")]
    Mismatch(#[from] bindoc::Error),

    #[error("invalid property path: {0}")]
    InvalidPath(#[from] bindoc::path::Error),

    #[error("invalid revision id: {0}")]
    InvalidRevisionId(String),

    #[error("out of memory encoding function result")]
    NoMem,
}

pub type Result<T> = std::result::Result<T, Error>;

/// rusqlite has no public API for setting SQLite's extended result codes
/// (`SQLITE_MISMATCH`/`SQLITE_NOMEM`) from a safe scalar function; the
/// category is preserved in the error message instead, and callers that need
/// the original code can downcast `rusqlite::Error::UserFunctionError`.
impl From<Error> for rusqlite::Error {
    fn from(err: Error) -> rusqlite::Error {
        rusqlite::Error::UserFunctionError(Box::new(err))
    }
}
