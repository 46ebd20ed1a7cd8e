//! The canonical error taxonomy. Every fallible operation in
//! this crate returns [`Error`]; hosts match on [`ErrorKind`] rather than
//! parsing message text. `rusqlite` errors are wrapped one variant per
//! failing operation.

/// Kinds, not types — the taxonomy a host can match and dispatch on,
/// independent of the message text or the underlying cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    InvalidParameter,
    NoSuchIndex,
    NotFound,
    Conflict,
    NotInTransaction,
    UnsupportedOperation,
    CorruptData,
    CantUpgradeDatabase,
    Busy,
    Sqlite,
    CantOpenFile,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no such index {name:?}")]
    NoSuchIndex { name: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: expected version does not match current row")]
    Conflict,

    #[error("operation requires an open write transaction")]
    NotInTransaction,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("cannot upgrade database: migration required but handle is read-only")]
    CantUpgradeDatabase,

    #[error("database busy: {0}")]
    Busy(String),

    #[error("sqlite error (code {code:?}): {source}")]
    Sqlite {
        #[source]
        source: rusqlite::Error,
        code: Option<i32>,
    },

    #[error("cannot open database file: {0}")]
    CantOpenFile(String),

    #[error(transparent)]
    Query(#[from] docql::Error),

    #[error(transparent)]
    Bridge(#[from] sqlbridge::Error),

    #[error(transparent)]
    Value(#[from] bindoc::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidQuery(_) | Error::Query(_) => ErrorKind::InvalidQuery,
            Error::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Error::NoSuchIndex { .. } => ErrorKind::NoSuchIndex,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict => ErrorKind::Conflict,
            Error::NotInTransaction => ErrorKind::NotInTransaction,
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Error::CorruptData(_) | Error::Value(_) | Error::Bridge(_) => ErrorKind::CorruptData,
            Error::CantUpgradeDatabase => ErrorKind::CantUpgradeDatabase,
            Error::Busy(_) => ErrorKind::Busy,
            Error::Sqlite { .. } => ErrorKind::Sqlite,
            Error::CantOpenFile(_) => ErrorKind::CantOpenFile,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(source: rusqlite::Error) -> Self {
        let code = match &source {
            rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code),
            _ => None,
        };
        match &source {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                Error::Busy(source.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(source.to_string()),
            _ => Error::Sqlite { source, code },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
