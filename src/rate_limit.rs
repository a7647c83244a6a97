//! In-memory fixed-window submission throttle.
//!
//! State lives only in process memory for the lifetime of the server; a
//! restart clears all counters. The map is guarded by a plain mutex, which
//! is the only shared mutable state besides the message file itself.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Default window length: 15 minutes.
const DEFAULT_WINDOW_MINUTES: i64 = 15;

/// Default cap: 5 submissions per window per client.
const DEFAULT_MAX_REQUESTS: u32 = 5;

struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Per-client fixed-window counter.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    entries: Mutex<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_WINDOW_MINUTES), DEFAULT_MAX_REQUESTS)
    }
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record one call for `key` and report whether it is allowed.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Utc::now())
    }

    /// Like [`RateLimiter::allow`] with a pinned reference time.
    ///
    /// The first call for a key, or the first call after its window has
    /// elapsed, resets the counter to 1 and opens a new window. Once the
    /// counter reaches the cap further calls are rejected without being
    /// counted.
    pub fn allow_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get_mut(key) {
            Some(window) if now <= window.reset_at => {
                if window.count >= self.max_requests {
                    return false;
                }
                window.count += 1;
                true
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}
