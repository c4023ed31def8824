//! Error types for encoding and persistence.
//!
//! Decoding never produces an [`Error`]: a failed read is reported as `None` so that callers can
//! treat a truncated stream as the end of the data.

use thiserror::Error;

/// Result type used by fallible [`stripekv`](crate) operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while writing values or dictionaries.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying stream or file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value has no encoding, e.g. a struct whose type name is not registered.
    #[error("value of type `{type_name}` is not supported by the codec")]
    Unsupported { type_name: String },

    /// A string, byte array or collection is too long for a 32-bit length prefix.
    #[error("length {0} exceeds the encodable range")]
    LengthOverflow(usize),

    /// The value is nested deeper than the codec reads back.
    #[error("value is nested deeper than {0} levels")]
    TooDeep(usize),

    /// A remote server address is not an absolute URI.
    #[error("`{0}` is not an absolute URI")]
    InvalidUri(String),

    /// A decoded [`Value`](crate::Value) does not have the requested shape.
    #[error("cannot convert {found} into {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },
}
