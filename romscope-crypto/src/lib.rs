//! Block-cipher plumbing and key management for encrypted containers.
//!
//! - [`AesCipher`]: AES-128/192/256 with ECB, CBC or CTR chaining, keyed at
//!   runtime from raw bytes.
//! - [`KeyStore`]: named keys loaded from a `keys.conf` text file, reloaded
//!   when the file's modification time changes.
//! - [`EncryptionStatus`]: the outcome a partition reader reports when it
//!   tries to obtain its keys.

pub mod cipher;
pub mod error;
pub mod keystore;
pub mod status;

pub use cipher::{AesCipher, BLOCK_SIZE, ChainingMode};
pub use error::{CryptoError, KeyError};
pub use keystore::{KeySpec, KeyStore, VERIFY_PLAINTEXT};
pub use status::EncryptionStatus;
