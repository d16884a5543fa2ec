// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key/value JSON persistence for client state.

use super::ClientError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key under which the session credential is kept.
pub const AUTH_TOKEN_KEY: &str = "mimo_auth_token";

/// Key under which the signup flow snapshot is kept.
pub const SIGNUP_STATE_KEY: &str = "mimo_signup_state";

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, ClientError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read a value. Missing and unreadable entries both come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read local state");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt local state");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| ClientError::Decode(e.to_string()))?;
        tokio::fs::write(self.path(key), bytes).await?;
        Ok(())
    }

    /// Remove a value. Removing a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), ClientError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get::<String>(AUTH_TOKEN_KEY).await, None);

        store
            .set(AUTH_TOKEN_KEY, &"abc.def".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get::<String>(AUTH_TOKEN_KEY).await.as_deref(),
            Some("abc.def")
        );

        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get::<String>(AUTH_TOKEN_KEY).await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("mimo_signup_state.json"), b"{not json").unwrap();

        assert!(store
            .get::<serde_json::Value>(SIGNUP_STATE_KEY)
            .await
            .is_none());
    }
}
