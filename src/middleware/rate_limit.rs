//! Simple in-memory sliding-window rate limiter. Keys are caller-chosen:
//! client IP for login attempts, `submit:{user_id}` for answer submissions.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Record one request for `identifier` and report whether it fits in the
    /// window.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests
            .entry(identifier.to_string())
            .or_insert_with(Vec::new);

        history.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Drop identifiers whose whole history fell out of the window; scheduled
    /// hourly so idle keys do not accumulate.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, history| {
            history.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !history.is_empty()
        });

        tracing::debug!("Rate limiter cleanup: {} active identifiers", requests.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_the_window_fills() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("user-a").await);
        assert!(limiter.check("user-a").await);
        assert!(limiter.check("user-a").await);
        assert!(!limiter.check("user-a").await);

        // Other keys have their own window.
        assert!(limiter.check("user-b").await);
    }

    #[tokio::test]
    async fn cleanup_drops_expired_histories() {
        let limiter = RateLimiter::new(5, 1);

        limiter.check("a").await;
        limiter.check("b").await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        limiter.cleanup().await;

        let requests = limiter.requests.read().await;
        assert_eq!(requests.len(), 0);
    }
}
