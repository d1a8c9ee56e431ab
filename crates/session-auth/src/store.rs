//! Credential store abstraction
//!
//! Stores named credential values with an absolute expiry and a path scope,
//! mirroring cookie semantics. Two implementations ship with the crate:
//! [`crate::FileStore`] for interactive sessions that outlive the process
//! and [`crate::MemoryStore`] for server-rendering contexts where a store
//! is built fresh per incoming request.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{ACCESS_TOKEN_NAME, DEFAULT_SCOPE, REFRESH_TOKEN_NAME, TOKEN_MAX_AGE};
use crate::error::Result;
use crate::token::Token;

/// One persisted value.
///
/// `expires` is a unix timestamp in milliseconds, computed at write time
/// from the write options' max age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: Token,
    pub expires: u64,
    pub path: String,
}

/// Retention options for a write.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub max_age: Duration,
    pub path: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            max_age: TOKEN_MAX_AGE,
            path: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// Result of reading the credential pair for a scope.
///
/// Either half may be absent: never signed in, expired, or stored under a
/// path that does not cover the requested scope.
#[derive(Debug, Default)]
pub struct StoredCredentials {
    pub access_token: Option<Token>,
    pub refresh_token: Option<Token>,
}

/// Named credential storage with expiry.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`).
pub trait CredentialStore: Send + Sync {
    /// Read the credential pair visible under `scope`, skipping expired
    /// entries and entries stored under a path that does not cover it.
    fn read<'a>(
        &'a self,
        scope: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StoredCredentials>> + Send + 'a>>;

    /// Persist one named value with the given retention.
    fn write<'a>(
        &'a self,
        name: &'a str,
        value: Token,
        options: WriteOptions,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Whether an entry stored under `path` is visible to a read at `scope`.
pub(crate) fn path_covers(path: &str, scope: &str) -> bool {
    scope.starts_with(path)
}

/// Assemble the credential pair from raw entries, applying expiry and
/// scope filtering. Shared by both store implementations.
pub(crate) fn collect(entries: &HashMap<String, StoredValue>, scope: &str) -> StoredCredentials {
    let now = now_millis();
    let fetch = |name: &str| {
        entries
            .get(name)
            .filter(|entry| entry.expires > now && path_covers(&entry.path, scope))
            .map(|entry| entry.value.clone())
    };
    StoredCredentials {
        access_token: fetch(ACCESS_TOKEN_NAME),
        refresh_token: fetch(REFRESH_TOKEN_NAME),
    }
}
