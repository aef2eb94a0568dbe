use thiserror::Error;

/// Codec-level errors.
///
/// Any malformed or truncated input aborts the current decode with one of
/// these; partially decoded values never escape the reader.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed item: {0}")]
    Malformed(&'static str),

    #[error("length exceeds supported range")]
    LengthOverflow,

    #[error("integer out of range")]
    IntOverflow,
}
