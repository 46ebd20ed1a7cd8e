/// Errors raised while parsing or evaluating Binary-Doc values.
///
/// Two failure modes are deliberately *not* represented here: an invalid
/// path is reported by a distinct error type at the call site (see
/// `path::Error`), and a missing property is not an error at all — callers
/// see `Ok(None)`.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("truncated Binary-Doc value at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid Binary-Doc tag byte {tag} at offset {offset}")]
    InvalidTag { tag: u8, offset: usize },

    #[error("invalid UTF-8 string in Binary-Doc value at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("dict key references shared-key id {id} with no shared-keys table in scope")]
    NoSharedKeysTable { id: u32 },

    #[error("dict key references out-of-range shared-key id {id}")]
    SharedKeyOutOfRange { id: u32 },

    #[error("trailing {remaining} unconsumed bytes after top-level Binary-Doc value")]
    TrailingBytes { remaining: usize },

    #[error("invalid legacy revision-tree body: {0}")]
    LegacyRevisionTree(#[from] crate::legacy::Error),

    #[error("invalid property path: {0}")]
    InvalidPath(#[from] crate::path::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
