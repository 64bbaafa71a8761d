//! On-disk session store: the auth token and signed-in user as one JSON file.
//!
//! This is the only local persistence. Everything else is re-fetched.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::net::types::AuthUser;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Write the session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be written.
    pub async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(session)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Delete the stored session. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for failures other than a missing file.
    pub async fn clear(&self) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}
