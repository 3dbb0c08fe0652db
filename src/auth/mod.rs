//! Authentication provider trait and the DAO-backed implementation.

pub mod password;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dao::{TodoDao, TodoError};
pub use password::{Argon2PasswordEncoder, PasswordEncoder, PasswordError};

/// Capability tag attached to an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    User,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::User => "USER",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub username: String,
    pub authorities: Vec<Authority>,
    /// A fresh encoding of the presented credential, for callers migrating hash schemes.
    pub credential_hash: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Bad credentials")]
    BadCredentials,
    #[error("Unknown user: {0}")]
    UnknownIdentity(String),
    #[error("{0}")]
    InternalAuthFailure(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// `Ok(None)` when no credential was presented; callers treat that as a failed login.
    async fn authenticate(
        &self,
        username: &str,
        credential: Option<&str>,
    ) -> Result<Option<AuthenticatedIdentity>, AuthError>;
}

/// Checks credentials against the password hashes held by a [`TodoDao`].
pub struct DaoAuthProvider {
    dao: Arc<dyn TodoDao>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl DaoAuthProvider {
    pub fn new(dao: Arc<dyn TodoDao>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { dao, encoder }
    }
}

#[async_trait]
impl AuthProvider for DaoAuthProvider {
    async fn authenticate(
        &self,
        username: &str,
        credential: Option<&str>,
    ) -> Result<Option<AuthenticatedIdentity>, AuthError> {
        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        let stored = match self.dao.get_user_password_hash(username).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                warn!(user = username, "stored password hash is missing");
                return Err(AuthError::InternalAuthFailure(
                    "Cannot use stored password (missing)".to_string(),
                ));
            }
            Err(TodoError::UnknownUser(user)) => return Err(AuthError::UnknownIdentity(user)),
            Err(err) => return Err(AuthError::InternalAuthFailure(err.to_string())),
        };

        // Hash verification is CPU-bound.
        let encoder = Arc::clone(&self.encoder);
        let plaintext = credential.to_string();
        let verdict = tokio::task::spawn_blocking(move || -> Result<Option<String>, PasswordError> {
            if !encoder.matches(&plaintext, &stored)? {
                return Ok(None);
            }
            encoder.encode(&plaintext).map(Some)
        })
        .await
        .map_err(|err| AuthError::InternalAuthFailure(err.to_string()))?;

        match verdict {
            Ok(Some(credential_hash)) => {
                debug!(user = username, "credentials accepted");
                Ok(Some(AuthenticatedIdentity {
                    username: username.to_string(),
                    authorities: vec![Authority::User],
                    credential_hash,
                }))
            }
            Ok(None) => Err(AuthError::BadCredentials),
            Err(PasswordError::Malformed(_)) => {
                warn!(user = username, "stored password hash is malformed");
                Err(AuthError::InternalAuthFailure(
                    "Cannot use stored password".to_string(),
                ))
            }
            Err(err) => Err(AuthError::InternalAuthFailure(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{DocumentStore, DocumentTodoDao, MemoryStore};
    use crate::model::UserDocument;

    async fn provider_with(user: &str, password: &str) -> DaoAuthProvider {
        let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder::new());
        let dao: Arc<dyn TodoDao> = Arc::new(DocumentTodoDao::new(MemoryStore::new()));
        let hash = encoder.encode(password).unwrap();
        dao.register_user(user, &hash).await.unwrap();
        DaoAuthProvider::new(dao, encoder)
    }

    #[tokio::test]
    async fn valid_credentials_yield_user_identity() {
        let provider = provider_with("alice", "secret").await;
        let identity = provider
            .authenticate("alice", Some("secret"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.authorities, vec![Authority::User]);
        let encoder = Argon2PasswordEncoder::new();
        assert!(encoder.matches("secret", &identity.credential_hash).unwrap());
    }

    #[tokio::test]
    async fn wrong_password_is_bad_credentials() {
        let provider = provider_with("alice", "secret").await;
        let err = provider
            .authenticate("alice", Some("guess"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn unknown_user_is_unknown_identity() {
        let provider = provider_with("alice", "secret").await;
        let err = provider
            .authenticate("bob", Some("secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownIdentity(user) if user == "bob"));
    }

    #[tokio::test]
    async fn missing_credential_is_no_result() {
        let provider = provider_with("alice", "secret").await;
        assert!(provider.authenticate("alice", None).await.unwrap().is_none());
        assert!(provider.authenticate("alice", Some("")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_or_absent_hash_is_internal_failure() {
        let store = MemoryStore::new();
        store.insert(UserDocument::new("carol", "garbage")).unwrap();
        store
            .insert(UserDocument {
                username: "dave".to_string(),
                password_hash: None,
                lists: Vec::new(),
            })
            .unwrap();
        let dao: Arc<dyn TodoDao> = Arc::new(DocumentTodoDao::new(store));
        let provider = DaoAuthProvider::new(dao, Arc::new(Argon2PasswordEncoder::new()));

        for user in ["carol", "dave"] {
            let err = provider.authenticate(user, Some("pw")).await.unwrap_err();
            assert!(matches!(err, AuthError::InternalAuthFailure(_)), "{user}");
        }
    }
}
