//! Named encryption keys loaded from a `keys.conf` text file.
//!
//! ## File format
//!
//! ```text
//! ; comment
//! [Keys]
//! rvl-common=0123456789ABCDEF0123456789ABCDEF
//! ctr-Slot0x2CKeyX=...
//! ```
//!
//! Only entries inside the `[Keys]` section are used. Blank lines and lines
//! starting with `;` or `#` are skipped. A value that is not valid hex, or
//! whose length is not an AES key length, is remembered as *invalid* so that
//! callers can tell a broken entry apart from a missing one.
//!
//! The store is shared (typically behind an `Arc`) and re-reads the file only
//! when its modification time changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::{AesCipher, KeyError};

/// Plaintext produced by ECB-decrypting a key's verification block.
pub const VERIFY_PLAINTEXT: &[u8; 16] = b"AES-128-ECB-TEST";

/// Name of the only section that holds keys.
const KEYS_SECTION: &str = "Keys";

/// A key name together with its optional verification block.
///
/// When `verify` is present, lookups go through
/// [`KeyStore::get_and_verify`]; otherwise the key is accepted as long as it
/// is well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub name: &'static str,
    pub verify: Option<[u8; 16]>,
}

impl KeySpec {
    pub const fn new(name: &'static str) -> Self {
        Self { name, verify: None }
    }

    pub const fn verified(name: &'static str, verify: [u8; 16]) -> Self {
        Self {
            name,
            verify: Some(verify),
        }
    }
}

#[derive(Debug, Clone)]
enum KeyEntry {
    Valid(Vec<u8>),
    Invalid(String),
}

#[derive(Debug, Default)]
struct Cache {
    loaded: bool,
    mtime: Option<SystemTime>,
    keys: HashMap<String, KeyEntry>,
}

/// Process-wide key storage. Construct once and pass by reference.
#[derive(Debug)]
pub struct KeyStore {
    path: Option<PathBuf>,
    cache: Mutex<Cache>,
}

impl KeyStore {
    /// A store backed by the given `keys.conf` path. Nothing is read until
    /// the first lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// A store backed by `<config dir>/romscope/keys.conf`.
    pub fn default_location() -> Self {
        let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(config.join("romscope").join("keys.conf"))
    }

    /// A store with no keys at all.
    pub fn empty() -> Self {
        Self {
            path: None,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// An in-memory store parsed from `keys.conf` text. Never reloads.
    pub fn from_config_text(text: &str) -> Self {
        Self {
            path: None,
            cache: Mutex::new(Cache {
                loaded: true,
                mtime: None,
                keys: parse_config(text),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a key file has been successfully read.
    pub fn is_loaded(&self) -> bool {
        self.refresh().loaded
    }

    /// Look up a key by name.
    pub fn get(&self, name: &str) -> Result<Vec<u8>, KeyError> {
        let cache = self.refresh();
        match cache.keys.get(name) {
            Some(KeyEntry::Valid(bytes)) => Ok(bytes.clone()),
            Some(KeyEntry::Invalid(reason)) => Err(KeyError::invalid(name, reason.clone())),
            None => Err(KeyError::NotFound(name.to_string())),
        }
    }

    /// Look up a key and check it against a verification block.
    ///
    /// `verify` is the ECB encryption of [`VERIFY_PLAINTEXT`] under the
    /// correct key.
    pub fn get_and_verify(&self, name: &str, verify: &[u8; 16]) -> Result<Vec<u8>, KeyError> {
        let key = self.get(name)?;
        let cipher = AesCipher::new(&key).map_err(|e| KeyError::invalid(name, e.to_string()))?;
        let mut block = *verify;
        cipher
            .decrypt(&mut block)
            .map_err(|e| KeyError::invalid(name, e.to_string()))?;
        if &block == VERIFY_PLAINTEXT {
            Ok(key)
        } else {
            Err(KeyError::WrongKey(name.to_string()))
        }
    }

    /// Look up a key described by a [`KeySpec`].
    pub fn get_spec(&self, spec: &KeySpec) -> Result<Vec<u8>, KeyError> {
        match &spec.verify {
            Some(verify) => self.get_and_verify(spec.name, verify),
            None => self.get(spec.name),
        }
    }

    /// Look up a key that must be exactly 16 bytes.
    pub fn get_128(&self, spec: &KeySpec) -> Result<[u8; 16], KeyError> {
        let key = self.get_spec(spec)?;
        key.as_slice()
            .try_into()
            .map_err(|_| KeyError::invalid(spec.name, format!("expected 16 bytes, got {}", key.len())))
    }

    /// Lock the cache, re-reading the backing file if it changed.
    fn refresh(&self) -> MutexGuard<'_, Cache> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let Some(path) = &self.path else {
            return cache;
        };

        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => {
                if cache.loaded {
                    log::debug!("Key file {} is no longer available", path.display());
                }
                *cache = Cache::default();
                return cache;
            }
        };

        if cache.loaded && cache.mtime == Some(mtime) {
            return cache;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => {
                cache.keys = parse_config(&text);
                cache.loaded = true;
                cache.mtime = Some(mtime);
                log::debug!(
                    "Loaded {} key entries from {}",
                    cache.keys.len(),
                    path.display()
                );
            }
            Err(e) => {
                log::warn!("Failed to read key file {}: {e}", path.display());
                *cache = Cache::default();
            }
        }
        cache
    }
}

/// Parse `keys.conf` text into key entries.
fn parse_config(text: &str) -> HashMap<String, KeyEntry> {
    let mut keys = HashMap::new();
    let mut in_keys = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[') {
            in_keys = section
                .strip_suffix(']')
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(KEYS_SECTION));
            continue;
        }
        if !in_keys {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        keys.insert(name.to_string(), parse_key_value(value.trim()));
    }
    keys
}

fn parse_key_value(value: &str) -> KeyEntry {
    match hex::decode(value) {
        Ok(bytes) => match bytes.len() {
            16 | 24 | 32 => KeyEntry::Valid(bytes),
            n => KeyEntry::Invalid(format!("{n}-byte value is not a valid key length")),
        },
        Err(hex::FromHexError::OddLength) => {
            KeyEntry::Invalid("odd number of hex digits".to_string())
        }
        Err(hex::FromHexError::InvalidHexCharacter { c, index }) => {
            KeyEntry::Invalid(format!("invalid hex character '{c}' at position {index}"))
        }
        Err(e) => KeyEntry::Invalid(e.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/keystore_tests.rs"]
mod tests;
