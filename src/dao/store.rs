//! Document store abstraction and the in-memory backend.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::UserDocument;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("document already exists: {0}")]
    Duplicate(String),
    #[error("no document for: {0}")]
    Missing(String),
    /// Contention or a dropped connection; the operation may succeed if retried.
    #[error("storage temporarily unavailable: {0}")]
    Transient(String),
    #[error("corrupt document for {user}: {reason}")]
    Corrupt { user: String, reason: String },
    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Keyed storage of whole user documents.
///
/// `modify` is the single-document atomic update every mutation goes through:
/// the closure sees a private copy of the document, and the copy replaces the
/// stored one only when the closure returns `Ok`. No other update of the same
/// document can interleave between the read and the write.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    fn insert(&self, document: UserDocument) -> Result<(), StoreError>;

    fn find(&self, username: &str) -> Result<Option<UserDocument>, StoreError>;

    /// Fails with [`StoreError::Missing`] (converted into `E`) when there is no such document.
    fn modify<T, E, F>(&self, username: &str, mutate: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut UserDocument) -> Result<T, E>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, UserDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, document: UserDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.lock();
        if documents.contains_key(&document.username) {
            return Err(StoreError::Duplicate(document.username));
        }
        documents.insert(document.username.clone(), document);
        Ok(())
    }

    fn find(&self, username: &str) -> Result<Option<UserDocument>, StoreError> {
        Ok(self.documents.lock().get(username).cloned())
    }

    fn modify<T, E, F>(&self, username: &str, mutate: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut UserDocument) -> Result<T, E>,
    {
        let mut documents = self.documents.lock();
        let stored = documents
            .get_mut(username)
            .ok_or_else(|| StoreError::Missing(username.to_string()))?;
        let mut working = stored.clone();
        let value = mutate(&mut working)?;
        *stored = working;
        Ok(value)
    }
}
