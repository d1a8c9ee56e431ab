//! In-memory credential store
//!
//! Holds entries for the lifetime of one execution context. Server-rendering
//! code builds one of these per incoming request, so one request's
//! credentials (and refresh results) can never leak into another's.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::{ACCESS_TOKEN_NAME, DEFAULT_SCOPE, REFRESH_TOKEN_NAME, TOKEN_MAX_AGE};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::store::{
    CredentialStore, StoredCredentials, StoredValue, WriteOptions, collect, now_millis,
};
use crate::token::Token;

/// Credential store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// An empty store (no session).
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a credential pair under the default scope,
    /// as if sign-in had just written it.
    pub fn with_credentials(credentials: Credentials) -> Self {
        let expires = now_millis() + TOKEN_MAX_AGE.as_millis() as u64;
        let entry = |value: Token| StoredValue {
            value,
            expires,
            path: DEFAULT_SCOPE.to_string(),
        };

        let mut entries = HashMap::new();
        entries.insert(ACCESS_TOKEN_NAME.to_string(), entry(credentials.access));
        entries.insert(REFRESH_TOKEN_NAME.to_string(), entry(credentials.refresh));
        Self {
            state: Mutex::new(entries),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn read<'a>(
        &'a self,
        scope: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StoredCredentials>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(collect(&state, scope))
        })
    }

    fn write<'a>(
        &'a self,
        name: &'a str,
        value: Token,
        options: WriteOptions,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(
                name.to_string(),
                StoredValue {
                    value,
                    expires: now_millis() + options.max_age.as_millis() as u64,
                    path: options.path,
                },
            );
            debug!(name, "stored credential");
            Ok(())
        })
    }
}
