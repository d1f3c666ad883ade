use thiserror::Error;

/// Errors raised by [`AesCipher`](crate::AesCipher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// AES only accepts 16, 24 or 32 byte keys
    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// IVs and counters are always one block long
    #[error("invalid IV length: {0} bytes")]
    InvalidIvLength(usize),

    /// ECB and CBC operate on whole blocks only
    #[error("buffer length {0} is not a multiple of the block size")]
    Unaligned(usize),

    /// The underlying cipher rejected its parameters
    #[error("cipher initialization failed")]
    InitFailed,

    /// CTR keystream position is out of range for the counter width
    #[error("counter position out of range")]
    CounterOverflow,
}

/// The three distinct failure outcomes of a key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// No entry with this name in the key file (or no key file at all)
    #[error("key '{0}' not found")]
    NotFound(String),

    /// An entry exists but its value cannot be used as a key
    #[error("key '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    /// The key is well-formed but fails its verification vector
    #[error("key '{0}' is incorrect")]
    WrongKey(String),
}

impl KeyError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Name of the key this error refers to.
    pub fn key_name(&self) -> &str {
        match self {
            Self::NotFound(name) | Self::WrongKey(name) => name,
            Self::Invalid { name, .. } => name,
        }
    }
}
