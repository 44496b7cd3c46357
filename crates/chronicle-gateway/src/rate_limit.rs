use std::sync::Mutex;

use chrono::Utc;

/// Sliding-window token bucket, shared process-wide per provider and
/// protected by a mutex (the gateway's only shared mutable resource).
///
/// Mirrors the accounting rule: admit a request of estimated cost `t` only
/// if `current_window_usage + t <= max_per_minute`; settle with actual
/// provider-reported usage afterwards.
pub struct TokenBucket {
    max_tokens_per_minute: u64,
    window_seconds: i64,
    usage: Mutex<Vec<(i64, u64)>>,
}

impl TokenBucket {
    pub fn new(max_tokens_per_minute: u64) -> Self {
        Self {
            max_tokens_per_minute,
            window_seconds: 60,
            usage: Mutex::new(Vec::new()),
        }
    }

    fn cleanup_locked(&self, usage: &mut Vec<(i64, u64)>) {
        let cutoff = Utc::now().timestamp() - self.window_seconds;
        usage.retain(|&(ts, _)| ts > cutoff);
    }

    pub fn current_usage(&self) -> u64 {
        let mut usage = self.usage.lock().unwrap();
        self.cleanup_locked(&mut usage);
        usage.iter().map(|&(_, tokens)| tokens).sum()
    }

    pub fn can_use(&self, tokens: u64) -> bool {
        self.current_usage() + tokens <= self.max_tokens_per_minute
    }

    pub fn record_usage(&self, tokens: u64) {
        let mut usage = self.usage.lock().unwrap();
        usage.push((Utc::now().timestamp(), tokens));
    }

    /// Seconds until `tokens` more would fit in the window. `0` if it already fits.
    pub fn time_until_available(&self, tokens: u64) -> f64 {
        let mut usage = self.usage.lock().unwrap();
        self.cleanup_locked(&mut usage);
        if usage.is_empty() {
            return 0.0;
        }

        let current: u64 = usage.iter().map(|&(_, t)| t).sum();
        if current + tokens <= self.max_tokens_per_minute {
            return 0.0;
        }

        let needed = (current + tokens) - self.max_tokens_per_minute;
        let mut sorted = usage.clone();
        sorted.sort_by_key(|&(ts, _)| ts);
        let now = Utc::now().timestamp();
        let mut accumulated = 0u64;
        for (ts, tok) in sorted {
            accumulated += tok;
            if accumulated >= needed {
                return ((ts + self.window_seconds) - now).max(0) as f64;
            }
        }
        self.window_seconds as f64
    }
}

/// `len(text) / 4` heuristic, used to estimate request cost before the
/// provider reports actual usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_requests_under_the_cap() {
        let bucket = TokenBucket::new(800_000);
        assert!(bucket.can_use(1_000));
    }

    #[test]
    fn refuses_once_saturated() {
        let bucket = TokenBucket::new(800_000);
        bucket.record_usage(799_500);
        assert!(!bucket.can_use(1_000));
        let retry = bucket.time_until_available(1_000);
        assert!(retry > 0.0 && retry <= 60.0);
    }

    #[test]
    fn records_do_not_change_on_refusal() {
        let bucket = TokenBucket::new(800_000);
        bucket.record_usage(799_500);
        let before = bucket.current_usage();
        let _ = bucket.can_use(1_000);
        assert_eq!(before, bucket.current_usage());
    }
}
