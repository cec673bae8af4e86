use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use tokio::time::Instant;

/// Per-key pacing: successive callers for the same key are spaced at least
/// `min_interval` apart. Slots are reserved under the lock and slept outside it.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub async fn wait(&self, key: &str) {
        if self.min_interval.is_zero() {
            return;
        }
        let slot = {
            let mut slots = self
                .next_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = match slots.get(key) {
                Some(reserved) if *reserved > now => *reserved,
                _ => now,
            };
            slots.insert(key.to_string(), slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_is_spaced_other_keys_are_not() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait("whois.example").await;
        limiter.wait("whois.other").await;
        assert!(start.elapsed() < Duration::from_millis(40));

        limiter.wait("whois.example").await;
        limiter.wait("whois.example").await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
