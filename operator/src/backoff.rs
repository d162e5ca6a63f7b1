use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Per-cluster exponential retry delays
///
/// Each consecutive failure of the same cluster doubles the delay, up to `max`.
/// A successful reconcile resets the count.
#[derive(Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Arc<Mutex<HashMap<String, u32>>>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one more failure for `key` and return the delay before the retry
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.to_string()).or_insert(0);
        let delay = self
            .base
            .checked_mul(2u32.saturating_pow(*count))
            .map_or(self.max, |d| d.min(self.max));
        *count = count.saturating_add(1);
        delay
    }

    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_up_to_max() {
        let b = Backoff::new(Duration::from_secs(5), Duration::from_secs(30));
        let delays: Vec<u64> = (0..6).map(|_| b.next_delay("east-1").as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30, 30]);
        assert_eq!(b.failures("east-1"), 6);
    }

    #[test]
    fn test_keys_are_independent_and_reset() {
        let b = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        b.next_delay("east-1");
        b.next_delay("east-1");
        assert_eq!(b.next_delay("west-1"), Duration::from_secs(1));
        b.reset("east-1");
        assert_eq!(b.next_delay("east-1"), Duration::from_secs(1));
    }

    #[test]
    fn test_many_failures_do_not_overflow() {
        let b = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));
        for _ in 0..100 {
            assert!(b.next_delay("east-1") <= Duration::from_secs(300));
        }
    }
}
