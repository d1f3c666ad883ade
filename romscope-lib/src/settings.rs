//! Session settings shared by every front end.
//!
//! Front ends collect what the user asked for into [`SessionOptions`] and
//! turn it into the one [`ParseContext`] every handle of the session uses,
//! so key-file resolution is the same everywhere.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use romscope_core::{KeyStore, ParseContext};

/// Environment variable naming a key file.
pub const KEYS_ENV: &str = "ROMSCOPE_KEYS";

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Explicit key file.
    pub keys: Option<PathBuf>,
    /// Two-letter display language; the host's when unset.
    pub language: Option<String>,
    pub image_host: Option<String>,
}

/// Pick the key file using a priority chain:
///
/// 1. Explicit override (if `Some`)
/// 2. The `ROMSCOPE_KEYS` environment variable, if non-empty
/// 3. `None`, meaning the default `keys.conf` location
pub fn resolve_keys_path(explicit: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    explicit.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

impl SessionOptions {
    pub fn key_store(&self) -> KeyStore {
        match resolve_keys_path(self.keys.clone(), std::env::var_os(KEYS_ENV)) {
            Some(path) => KeyStore::new(path),
            None => KeyStore::default_location(),
        }
    }

    pub fn parse_context(&self) -> ParseContext {
        let keys = self.key_store();
        if let Some(path) = keys.path() {
            log::debug!("Using key file {}", path.display());
        }
        let mut ctx = ParseContext::new(Arc::new(keys));
        if let Some(lang) = &self.language {
            ctx = ctx.with_language(lang.to_ascii_lowercase());
        }
        if let Some(host) = &self.image_host {
            ctx = ctx.with_image_host(host.as_str());
        }
        ctx
    }
}
