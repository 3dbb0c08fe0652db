//! In-memory, thread-safe rate limiter for authentication endpoints.
//! Limits login attempts per IP within a fixed time window.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Window {
    attempts: u32,
    started: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<IpAddr, Window>>>,
    pub max_attempts: u32,
    pub window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Returns true if the IP is allowed to attempt login, false if rate limited.
    pub async fn check_and_increment(&self, ip: IpAddr) -> bool {
        self.check_and_increment_at(ip, Instant::now()).await
    }

    async fn check_and_increment_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut map = self.inner.lock().await;
        let entry = map.entry(ip).or_insert(Window {
            attempts: 0,
            started: now,
        });
        if now.duration_since(entry.started) > self.window {
            *entry = Window {
                attempts: 1,
                started: now,
            };
            return true;
        }
        if entry.attempts < self.max_attempts {
            entry.attempts += 1;
            true
        } else {
            false
        }
    }

    /// Forgets the IP's attempts, e.g. after a successful login.
    pub async fn reset(&self, ip: IpAddr) {
        self.inner.lock().await.remove(&ip);
    }

    /// Clears stale entries to prevent unbounded growth.
    pub async fn cleanup(&self) {
        self.cleanup_at(Instant::now()).await;
    }

    async fn cleanup_at(&self, now: Instant) {
        let mut map = self.inner.lock().await;
        map.retain(|_, window| now.duration_since(window.started) < self.window * 2);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
