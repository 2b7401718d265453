//! localStorage persistence of the user data bundle.

use gloo_storage::{LocalStorage, Storage as _};
use gloss_core::{Storage, StorageError};

/// The bundle stored under one localStorage key.
#[derive(Debug, Clone)]
pub struct LocalStore {
    key: String,
}

impl LocalStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Storage for LocalStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        LocalStorage::raw()
            .get_item(&self.key)
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
    }

    fn save(&self, contents: &str) -> Result<(), StorageError> {
        LocalStorage::raw()
            .set_item(&self.key, contents)
            .map_err(|e| StorageError::Write(format!("{e:?}")))?;
        tracing::trace!(key = %self.key, bytes = contents.len(), "user data written");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        LocalStorage::raw()
            .remove_item(&self.key)
            .map_err(|e| StorageError::Write(format!("{e:?}")))
    }
}
