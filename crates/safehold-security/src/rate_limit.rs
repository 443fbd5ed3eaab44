// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-side fixed-window rate limiter.
//
// Each limiter key owns one `RateLimitWindow` stored through the secure store
// in plain integrity-checked mode, so editing the counter in storage purges it
// rather than resetting it to a chosen value.  The record's TTL always ends at
// the end of the window.
//
// Failure policy: if the store errors (storage disabled, quota exceeded) the
// limiter fails open by default.  This is a defence-in-depth control; the
// authoritative limit lives on the server.  `RateLimitFailurePolicy::FailClosed`
// flips that trade-off.
//
// Concurrent calls on the same limiter key race between read and write and
// may lose increments.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use safehold_core::error::{Result, SafeholdError};
use safehold_core::types::{RateLimitFailurePolicy, StorageMode, StorageScope};

use crate::audit::SecurityEvent;
use crate::store::{GetOptions, PutOptions, SecureStore, ceil_to_micros};

/// Namespace for limiter records inside the store.
const KEY_NAMESPACE: &str = "ratelimit:";

/// Counter state for one limiter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub count: u32,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub window_start: DateTime<Utc>,
}

/// Outcome of a [`RateLimiter::check_and_increment`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Time until the current window closes; set only when denied.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// Read-only view of a limiter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Attempts left in the current window.
    pub remaining: u32,
    /// Time until the current window closes, if one is open.
    pub retry_after: Option<Duration>,
}

/// Fixed-window limiter built on a [`SecureStore`].
pub struct RateLimiter {
    store: Arc<SecureStore>,
    policy: RateLimitFailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<SecureStore>, policy: RateLimitFailurePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RateLimitFailurePolicy {
        self.policy
    }

    fn storage_key(limiter_key: &str) -> String {
        format!("{KEY_NAMESPACE}{limiter_key}")
    }

    fn get_options() -> GetOptions {
        GetOptions::default()
            .mode(StorageMode::PlainIntegrityChecked)
            .scope(StorageScope::Persistent)
    }

    fn put_options(ttl: Duration) -> PutOptions {
        PutOptions::default()
            .mode(StorageMode::PlainIntegrityChecked)
            .scope(StorageScope::Persistent)
            .ttl(ttl)
    }

    /// Count one attempt against `limiter_key` and decide whether it may
    /// proceed.  Never returns an error: store failures are resolved by the
    /// configured failure policy.
    #[instrument(skip(self), fields(policy = ?self.policy))]
    pub fn check_and_increment(
        &self,
        limiter_key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> RateLimitDecision {
        match self.try_check_and_increment(limiter_key, max_attempts, window) {
            Ok(decision) => {
                if !decision.allowed {
                    self.audit(SecurityEvent::RateLimited, limiter_key, None);
                }
                decision
            }
            Err(e) => {
                let detail = e.to_string();
                self.audit(SecurityEvent::RateLimiterDegraded, limiter_key, Some(&detail));
                match self.policy {
                    RateLimitFailurePolicy::FailOpen => {
                        warn!(error = %e, "rate limiter store failed; failing open");
                        RateLimitDecision::allow()
                    }
                    RateLimitFailurePolicy::FailClosed => {
                        warn!(error = %e, "rate limiter store failed; failing closed");
                        RateLimitDecision::deny(window)
                    }
                }
            }
        }
    }

    /// Convenience form taking the window in milliseconds.
    pub fn check_client_rate_limit(
        &self,
        limiter_key: &str,
        max_attempts: u32,
        window_ms: u64,
    ) -> RateLimitDecision {
        self.check_and_increment(limiter_key, max_attempts, Duration::from_millis(window_ms))
    }

    fn try_check_and_increment(
        &self,
        limiter_key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateLimitDecision> {
        if max_attempts == 0 {
            return Ok(RateLimitDecision::deny(window));
        }

        let now = self.store.clock().now();
        let key = Self::storage_key(limiter_key);
        let window_len = window_delta(window)?;

        let current: Option<RateLimitWindow> = self.store.get_item(&key, Self::get_options())?;

        let Some(current) = current.filter(|w| elapsed(w, now) <= window_len) else {
            let fresh = RateLimitWindow {
                count: 1,
                window_start: ceil_to_micros(now),
            };
            self.store.set_item(&key, &fresh, Self::put_options(window))?;
            debug!("new rate limit window opened");
            return Ok(RateLimitDecision::allow());
        };

        let remaining = remaining_in_window(&current, now, window_len);

        if current.count >= max_attempts {
            debug!(count = current.count, "rate limit reached");
            return Ok(RateLimitDecision::deny(remaining));
        }

        let next = RateLimitWindow {
            count: current.count + 1,
            window_start: current.window_start,
        };
        let ttl = remaining.max(Duration::from_millis(1));
        self.store.set_item(&key, &next, Self::put_options(ttl))?;
        debug!(count = next.count, "rate limit attempt counted");
        Ok(RateLimitDecision::allow())
    }

    /// Inspect a limiter key without counting an attempt.
    pub fn status(&self, limiter_key: &str, max_attempts: u32, window: Duration) -> Result<RateLimitStatus> {
        let now = self.store.clock().now();
        let window_len = window_delta(window)?;
        let current: Option<RateLimitWindow> = self
            .store
            .get_item(&Self::storage_key(limiter_key), Self::get_options())?;

        Ok(match current.filter(|w| elapsed(w, now) <= window_len) {
            Some(w) => RateLimitStatus {
                remaining: max_attempts.saturating_sub(w.count),
                retry_after: Some(remaining_in_window(&w, now, window_len)),
            },
            None => RateLimitStatus {
                remaining: max_attempts,
                retry_after: None,
            },
        })
    }

    /// Forget all attempts for `limiter_key` (e.g. after a successful login).
    pub fn reset(&self, limiter_key: &str) -> Result<()> {
        self.store
            .remove_item(&Self::storage_key(limiter_key), StorageScope::Persistent)
    }

    fn audit(&self, event: SecurityEvent, subject: &str, details: Option<&str>) {
        if let Some(audit) = self.store.audit() {
            if let Err(e) = audit.record(event, subject, details) {
                error!(error = %e, "failed to record rate limit event");
            }
        }
    }
}

/// Count one attempt against `limiter_key` in `store`, with the window in
/// milliseconds and the default fail-open policy.
pub fn check_client_rate_limit(
    store: &Arc<SecureStore>,
    limiter_key: &str,
    max_attempts: u32,
    window_ms: u64,
) -> RateLimitDecision {
    RateLimiter::new(Arc::clone(store), RateLimitFailurePolicy::default())
        .check_client_rate_limit(limiter_key, max_attempts, window_ms)
}

fn window_delta(window: Duration) -> Result<TimeDelta> {
    TimeDelta::from_std(window)
        .map_err(|_| SafeholdError::InvalidConfig(format!("rate limit window too large: {window:?}")))
}

/// Time since the window opened; a window stamped in the future counts as
/// just opened.
fn elapsed(window: &RateLimitWindow, now: DateTime<Utc>) -> TimeDelta {
    (now - window.window_start).max(TimeDelta::zero())
}

fn remaining_in_window(window: &RateLimitWindow, now: DateTime<Utc>, window_len: TimeDelta) -> Duration {
    (window_len - elapsed(window, now)).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::fingerprint::EnvironmentFingerprint;
    use safehold_bridge::{KeyValueSurface, MemorySurface, StorageSurfaces, UnavailableSurface};
    use safehold_core::clock::ManualClock;
    use safehold_core::config::SecurityConfig;

    const T0: i64 = 1_700_000_000_000;
    const WINDOW: Duration = Duration::from_millis(1_000);

    struct Harness {
        limiter: RateLimiter,
        persistent: Arc<MemorySurface>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(persistent: Arc<MemorySurface>, audit: Option<Arc<AuditLog>>) -> Harness {
        let clock = Arc::new(ManualClock::at_millis(T0));
        let mut store = SecureStore::new(
            StorageSurfaces::new(persistent.clone(), Arc::new(MemorySurface::new())),
            EnvironmentFingerprint::new("limiter-test"),
            &SecurityConfig::default(),
        )
        .with_clock(clock.clone());
        if let Some(audit) = audit {
            store = store.with_audit(audit);
        }
        Harness {
            limiter: RateLimiter::new(Arc::new(store), RateLimitFailurePolicy::FailOpen),
            persistent,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemorySurface::new()), None)
    }

    #[test]
    fn fixed_window_semantics() {
        let h = harness();

        for attempt in 1..=3 {
            let decision = h.limiter.check_and_increment("login", 3, WINDOW);
            assert!(decision.allowed, "attempt {attempt} should be allowed");
            assert_eq!(decision.retry_after, None);
        }

        h.clock.advance(Duration::from_millis(500));
        let denied = h.limiter.check_and_increment("login", 3, WINDOW);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(Duration::from_millis(500)));

        h.clock.advance(Duration::from_millis(501));
        let reopened = h.limiter.check_and_increment("login", 3, WINDOW);
        assert!(reopened.allowed);
    }

    #[test]
    fn new_window_counts_from_one() {
        let h = harness();
        for _ in 0..3 {
            h.limiter.check_and_increment("k", 3, WINDOW);
        }
        h.clock.advance(Duration::from_millis(1_001));

        assert!(h.limiter.check_and_increment("k", 3, WINDOW).allowed);
        assert!(h.limiter.check_and_increment("k", 3, WINDOW).allowed);
        assert!(h.limiter.check_and_increment("k", 3, WINDOW).allowed);
        assert!(!h.limiter.check_and_increment("k", 3, WINDOW).allowed);
    }

    #[test]
    fn increments_keep_window_start() {
        let h = harness();
        h.limiter.check_and_increment("k", 5, WINDOW);
        h.clock.advance(Duration::from_millis(600));
        h.limiter.check_and_increment("k", 5, WINDOW);

        let status = h.limiter.status("k", 5, WINDOW).unwrap();
        assert_eq!(status.remaining, 3);
        assert_eq!(status.retry_after, Some(Duration::from_millis(400)));

        // The window still closes 1000ms after the first attempt.
        h.clock.advance(Duration::from_millis(400));
        assert_eq!(h.limiter.status("k", 5, WINDOW).unwrap().remaining, 5);
    }

    #[test]
    fn keys_are_independent() {
        let h = harness();
        assert!(h.limiter.check_and_increment("a", 1, WINDOW).allowed);
        assert!(!h.limiter.check_and_increment("a", 1, WINDOW).allowed);
        assert!(h.limiter.check_and_increment("b", 1, WINDOW).allowed);
    }

    #[test]
    fn reset_clears_the_window() {
        let h = harness();
        h.limiter.check_and_increment("k", 1, WINDOW);
        assert!(!h.limiter.check_and_increment("k", 1, WINDOW).allowed);

        h.limiter.reset("k").unwrap();
        assert!(h.limiter.check_and_increment("k", 1, WINDOW).allowed);
    }

    #[test]
    fn status_does_not_count() {
        let h = harness();
        assert_eq!(h.limiter.status("k", 2, WINDOW).unwrap().remaining, 2);
        h.limiter.status("k", 2, WINDOW).unwrap();
        assert!(h.limiter.check_and_increment("k", 2, WINDOW).allowed);
        assert!(h.limiter.check_and_increment("k", 2, WINDOW).allowed);
        assert!(!h.limiter.check_and_increment("k", 2, WINDOW).allowed);
    }

    #[test]
    fn zero_max_attempts_always_denies() {
        let h = harness();
        let decision = h.limiter.check_and_increment("k", 0, WINDOW);
        assert!(!decision.allowed);
        assert!(h.persistent.is_empty());
    }

    #[test]
    fn millisecond_convenience_form() {
        let h = harness();
        assert!(h.limiter.check_client_rate_limit("k", 1, 1_000).allowed);
        let denied = h.limiter.check_client_rate_limit("k", 1, 1_000);
        assert_eq!(denied.retry_after, Some(WINDOW));
    }

    #[test]
    fn tampered_counter_starts_over_rather_than_trusting_edit() {
        let h = harness();
        h.limiter.check_and_increment("k", 2, WINDOW);
        h.limiter.check_and_increment("k", 2, WINDOW);

        let raw = h.persistent.get("sh:ratelimit:k").unwrap().unwrap();
        h.persistent
            .set("sh:ratelimit:k", &raw.replace("\\\"count\\\":2", "\\\"count\\\":0"))
            .unwrap();

        // The edited record is purged; the next attempt opens a new window
        // and the one after that is counted normally.
        assert!(h.limiter.check_and_increment("k", 2, WINDOW).allowed);
        assert_eq!(h.limiter.status("k", 2, WINDOW).unwrap().remaining, 1);
    }

    #[test]
    fn fails_open_when_storage_unavailable() {
        let store = SecureStore::new(
            StorageSurfaces::new(Arc::new(UnavailableSurface), Arc::new(MemorySurface::new())),
            EnvironmentFingerprint::default(),
            &SecurityConfig::default(),
        );
        let limiter = RateLimiter::new(Arc::new(store), RateLimitFailurePolicy::FailOpen);
        for _ in 0..10 {
            assert!(limiter.check_and_increment("k", 1, WINDOW).allowed);
        }
    }

    #[test]
    fn fails_closed_when_configured() {
        let store = SecureStore::new(
            StorageSurfaces::new(Arc::new(UnavailableSurface), Arc::new(MemorySurface::new())),
            EnvironmentFingerprint::default(),
            &SecurityConfig::default(),
        );
        let limiter = RateLimiter::new(Arc::new(store), RateLimitFailurePolicy::FailClosed);
        let decision = limiter.check_and_increment("k", 5, WINDOW);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(WINDOW));
    }

    #[test]
    fn quota_exceeded_fails_open() {
        let h = harness_with(Arc::new(MemorySurface::with_quota(8)), None);
        assert!(h.limiter.check_and_increment("k", 1, WINDOW).allowed);
        assert!(h.limiter.check_and_increment("k", 1, WINDOW).allowed);
    }

    #[test]
    fn denials_are_audited() {
        let audit = Arc::new(AuditLog::open_in_memory().unwrap());
        let h = harness_with(Arc::new(MemorySurface::new()), Some(audit.clone()));

        h.limiter.check_and_increment("login", 1, WINDOW);
        h.limiter.check_and_increment("login", 1, WINDOW);

        let entries = audit.entries_for_subject("login").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "rate_limited");
    }

    #[test]
    fn storage_failure_is_audited_as_degraded() {
        let audit = Arc::new(AuditLog::open_in_memory().unwrap());
        let store = SecureStore::new(
            StorageSurfaces::new(Arc::new(UnavailableSurface), Arc::new(MemorySurface::new())),
            EnvironmentFingerprint::default(),
            &SecurityConfig::default(),
        )
        .with_audit(audit.clone());
        let limiter = RateLimiter::new(Arc::new(store), RateLimitFailurePolicy::FailOpen);

        assert!(limiter.check_and_increment("upload", 1, WINDOW).allowed);

        let entries = audit.entries_for_subject("upload").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "rate_limiter_degraded");
        assert!(entries[0].details.is_some());
    }

    #[test]
    fn sub_millisecond_window_remainder_is_honoured() {
        let h = harness();
        let window = Duration::from_micros(2_500);
        assert!(h.limiter.check_and_increment("k", 2, window).allowed);

        h.clock.advance(Duration::from_micros(2_200));
        assert!(h.limiter.check_and_increment("k", 2, window).allowed);

        let denied = h.limiter.check_and_increment("k", 2, window);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(Duration::from_micros(300)));
    }

    #[test]
    fn free_function_shares_state_with_limiter() {
        let h = harness();
        let store = Arc::clone(&h.limiter.store);

        assert!(check_client_rate_limit(&store, "login", 2, 1_000).allowed);
        assert!(h.limiter.check_client_rate_limit("login", 2, 1_000).allowed);

        let denied = check_client_rate_limit(&store, "login", 2, 1_000);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(WINDOW));
    }
}
