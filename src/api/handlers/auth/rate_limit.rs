//! In-process sliding-window rate limiting for auth and mutation flows.
//!
//! Counters are advisory: they live in process memory, so a restart or a
//! horizontal scale-out silently resets them. The store is behind a trait so a
//! shared external counter can be swapped in without touching call sites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

/// Sweep interval for expired windows.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded")]
pub struct RateLimitExceeded;

/// Per-identifier counter with a fixed reset deadline.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at_ms: u64,
}

/// Counter store consulted before rate-limited operations.
///
/// Identifiers are caller-chosen strings combining a purpose tag and a
/// discriminator (e.g. `"register:10.0.0.1"`, `"change-password:a@b.com"`) so
/// different operations keep independent quotas for the same actor.
pub trait RateLimitStore: Send + Sync {
    /// Record an attempt and report whether it is within the ceiling.
    ///
    /// A missing or expired window restarts at `count = 1`. Once the ceiling
    /// is reached further attempts are rejected without mutating state, so
    /// the window expires on schedule rather than sliding forward.
    fn allow(&self, identifier: &str, window: Duration, max_attempts: u32) -> bool;

    /// Throwing variant of [`RateLimitStore::allow`] with identical semantics.
    ///
    /// # Errors
    /// Returns [`RateLimitExceeded`] when the ceiling has been reached.
    fn check(
        &self,
        identifier: &str,
        window: Duration,
        max_attempts: u32,
    ) -> Result<(), RateLimitExceeded> {
        if self.allow(identifier, window, max_attempts) {
            Ok(())
        } else {
            Err(RateLimitExceeded)
        }
    }

    /// Drop windows whose reset deadline has passed.
    fn sweep(&self);
}

type ClockFn = dyn Fn() -> u64 + Send + Sync;

/// Process-wide in-memory store.
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    now_ms: Arc<ClockFn>,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(wall_clock_ms))
    }

    /// Construct with an injected clock; tests use this for determinism.
    #[must_use]
    pub fn with_clock(now_ms: Arc<ClockFn>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            now_ms,
        }
    }

    fn now(&self) -> u64 {
        (self.now_ms)()
    }
}

impl RateLimitStore for MemoryRateLimiter {
    fn allow(&self, identifier: &str, window: Duration, max_attempts: u32) -> bool {
        let now = self.now();
        let Ok(mut windows) = self.windows.lock() else {
            // A poisoned lock means another request panicked mid-update; fail
            // open rather than deny all traffic.
            error!("rate limiter lock poisoned; allowing request");
            return true;
        };

        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        match windows.get_mut(identifier) {
            Some(entry) if now <= entry.reset_at_ms => {
                if entry.count >= max_attempts {
                    return false;
                }
                entry.count += 1;
                true
            }
            _ => {
                windows.insert(
                    identifier.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at_ms: now.saturating_add(window_ms),
                    },
                );
                true
            }
        }
    }

    fn sweep(&self) {
        let now = self.now();
        if let Ok(mut windows) = self.windows.lock() {
            let before = windows.len();
            windows.retain(|_, entry| now <= entry.reset_at_ms);
            let removed = before - windows.len();
            if removed > 0 {
                debug!("rate limiter sweep removed {removed} expired windows");
            }
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

/// Spawn the periodic sweeper that bounds the window map's memory.
pub fn spawn_sweeper(store: Arc<dyn RateLimitStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // First tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fixed_clock(start: u64) -> (Arc<AtomicU64>, Arc<ClockFn>) {
        let time = Arc::new(AtomicU64::new(start));
        let handle = Arc::clone(&time);
        (time, Arc::new(move || handle.load(Ordering::SeqCst)))
    }

    #[test]
    fn ceiling_rejects_fourth_attempt() {
        let (_, clock) = fixed_clock(1_000);
        let limiter = MemoryRateLimiter::with_clock(clock);
        let window = Duration::from_secs(60);

        let decisions: Vec<bool> = (0..4).map(|_| limiter.allow("login:ip", window, 3)).collect();
        assert_eq!(decisions, vec![true, true, true, false]);
    }

    #[test]
    fn window_expiry_resets_counter() {
        let (time, clock) = fixed_clock(1_000);
        let limiter = MemoryRateLimiter::with_clock(clock);
        let window = Duration::from_millis(500);

        for _ in 0..3 {
            assert!(limiter.allow("login:ip", window, 3));
        }
        assert!(!limiter.allow("login:ip", window, 3));

        // Past the reset deadline the fifth call is admitted again.
        time.store(1_000 + 501, Ordering::SeqCst);
        assert!(limiter.allow("login:ip", window, 3));
    }

    #[test]
    fn rejected_attempts_do_not_extend_the_window() {
        let (time, clock) = fixed_clock(0);
        let limiter = MemoryRateLimiter::with_clock(clock);
        let window = Duration::from_millis(100);

        for _ in 0..2 {
            assert!(limiter.allow("key", window, 2));
        }
        // Hammering past the ceiling must not push reset_at forward.
        for _ in 0..10 {
            assert!(!limiter.allow("key", window, 2));
        }
        time.store(101, Ordering::SeqCst);
        assert!(limiter.allow("key", window, 2));
    }

    #[test]
    fn identifiers_are_independent() {
        let (_, clock) = fixed_clock(0);
        let limiter = MemoryRateLimiter::with_clock(clock);
        let window = Duration::from_secs(60);

        assert!(!(0..4).all(|_| limiter.allow("register:1.2.3.4", window, 3)));
        // A different purpose tag for the same actor has its own quota.
        assert!(limiter.allow("step-up:1.2.3.4", window, 3));
    }

    #[test]
    fn check_matches_allow_semantics() {
        let (_, clock) = fixed_clock(0);
        let limiter = MemoryRateLimiter::with_clock(clock);
        let window = Duration::from_secs(60);

        assert!(limiter.check("id", window, 1).is_ok());
        assert_eq!(limiter.check("id", window, 1), Err(RateLimitExceeded));
    }

    #[test]
    fn sweep_drops_only_expired_windows() {
        let (time, clock) = fixed_clock(0);
        let limiter = MemoryRateLimiter::with_clock(clock);

        assert!(limiter.allow("short", Duration::from_millis(10), 3));
        assert!(limiter.allow("long", Duration::from_secs(60), 3));

        time.store(1_000, Ordering::SeqCst);
        limiter.sweep();

        let windows = limiter.windows.lock().expect("lock");
        assert!(!windows.contains_key("short"));
        assert!(windows.contains_key("long"));
    }
}
