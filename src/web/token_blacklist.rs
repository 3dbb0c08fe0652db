//! Revoked session tokens, remembered until they would have expired anyway.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct TokenBlacklist {
    // jti -> exp (unix seconds)
    inner: Arc<Mutex<HashMap<String, usize>>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jti: &str, expires_at: usize) {
        self.inner.lock().insert(jti.to_string(), expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.inner.lock().contains_key(jti)
    }

    /// Drops entries whose tokens expired before `now`; returns how many were dropped.
    pub fn prune_expired(&self, now: usize) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|_, expires_at| *expires_at >= now);
        before - inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_tokens_are_reported_until_pruned() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke("a", 100);
        blacklist.revoke("b", 300);
        assert!(blacklist.is_revoked("a"));
        assert!(!blacklist.is_revoked("c"));
        assert_eq!(blacklist.prune_expired(200), 1);
        assert!(!blacklist.is_revoked("a"));
        assert!(blacklist.is_revoked("b"));
    }
}
