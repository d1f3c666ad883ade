use std::fmt;

use crate::{CryptoError, KeyError};

/// Result of setting up decryption for a partition or container region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionStatus {
    /// The region is readable: either unencrypted or keys were obtained.
    Ok,
    /// A required key is absent from the key store.
    KeyMissing,
    /// A required key is malformed or fails verification.
    KeyInvalid,
    /// The cipher could not be initialized with the derived key material.
    CipherInitFailed,
    /// The container references a key slot this library does not know.
    UnknownKeyIndex,
}

impl EncryptionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::KeyMissing => "Required key is missing",
            Self::KeyInvalid => "Required key is invalid",
            Self::CipherInitFailed => "Cipher initialization failed",
            Self::UnknownKeyIndex => "Unknown key index",
        }
    }
}

impl From<&KeyError> for EncryptionStatus {
    fn from(err: &KeyError) -> Self {
        match err {
            KeyError::NotFound(_) => Self::KeyMissing,
            KeyError::Invalid { .. } | KeyError::WrongKey(_) => Self::KeyInvalid,
        }
    }
}

impl From<&CryptoError> for EncryptionStatus {
    fn from(err: &CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyLength(_) => Self::KeyInvalid,
            _ => Self::CipherInitFailed,
        }
    }
}

impl fmt::Display for EncryptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
