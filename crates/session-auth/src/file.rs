//! File-backed credential store
//!
//! Persists named credential values to a JSON file. All writes use atomic
//! temp-file + rename to prevent corruption on crash, and the file is set
//! to 0600 since it holds session tokens. A tokio Mutex serializes
//! concurrent writes from overlapping refresh cycles.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::{
    CredentialStore, StoredCredentials, StoredValue, WriteOptions, collect, now_millis,
};
use crate::token::Token;

/// Credential store backed by a JSON file.
///
/// The Mutex serializes all access. Reads acquire the lock briefly to
/// assemble the credential pair, so they don't block behind a slow write
/// for long.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredValue>>,
}

impl FileStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (no session yet). A
    /// read against the empty store returns an absent credential pair.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let entries: HashMap<String, StoredValue> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded credential store");
            entries
        } else {
            info!(path = %path.display(), "credential file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Number of stored entries, including expired ones not yet overwritten.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Whether the store holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CredentialStore for FileStore {
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
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write entries to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains session tokens.
async fn write_atomic(path: &Path, entries: &HashMap<String, StoredValue>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Parse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
