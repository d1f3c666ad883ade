use romscope_crypto::EncryptionStatus;
use thiserror::Error;

use crate::fields::FieldKind;

/// Errors raised while reading or parsing a file.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signature or magic mismatch: not this format at all
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The format was recognized but a mandatory header is inconsistent
    #[error("corrupted header: {0}")]
    CorruptedHeader(String),

    /// A structure runs past the end of the stream
    #[error("truncated input: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// An encrypted region could not be made readable
    #[error("encrypted data unavailable: {0}")]
    Encryption(EncryptionStatus),

    /// The stream or parser has been closed (or was never opened)
    #[error("stream is not open")]
    NotOpen,

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A field was pushed with a value of a different kind than declared
    #[error("field '{label}' declared as {expected:?} but given {actual:?}")]
    FieldKindMismatch {
        label: String,
        expected: FieldKind,
        actual: FieldKind,
    },

    #[error("{0}")]
    Other(String),
}

impl RomError {
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub fn corrupted_header(msg: impl Into<String>) -> Self {
        Self::CorruptedHeader(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn truncated(expected: u64, actual: u64) -> Self {
        Self::Truncated { expected, actual }
    }

    /// Whether this error means "the data isn't there" rather than "the
    /// data is wrong". Parsers use this to degrade a field to unknown.
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::Truncated { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
