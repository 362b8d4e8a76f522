//! Per-credential rate-limit bookkeeping for the upstream API.
//!
//! Tracks the request budget the upstream advertises through response
//! headers, plus cooldowns imposed by 429 responses. State is keyed by a
//! truncated credential hash and lives for the process lifetime.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

/// Truncated hash identifying a credential in state keys and logs.
///
/// The raw key never leaves the request path.
pub fn credential_hash(server_key: &str) -> String {
    let digest = Sha256::digest(server_key.as_bytes());
    format!("{digest:x}")[..12].to_string()
}

/// Rate-limit view of a single credential.
#[derive(Debug, Clone)]
pub struct RateState {
    /// Requests left in the current window, per upstream headers.
    pub remaining: i64,
    /// When the window resets (epoch milliseconds).
    pub reset_time: i64,
    /// Cooldown from a prior 429 (epoch milliseconds). 0 when clear.
    pub blocked_until: i64,
    /// When the last operational alert for this credential fired
    /// (epoch milliseconds).
    pub last_alert_time: i64,
}

/// What a caller must do before issuing the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPlan {
    /// Proceed immediately.
    Clear,
    /// Sleep out a 429 cooldown first.
    Cooldown {
        /// Epoch milliseconds.
        until: i64,
    },
    /// Budget exhausted; sleep until the window resets, then take an
    /// optimistic budget.
    BudgetExhausted {
        /// Epoch milliseconds, reset buffer included.
        until: i64,
    },
}

/// Registry of per-credential [`RateState`].
///
/// Constructed once and shared; state entries are created lazily on first
/// use.
///
/// # Example
///
/// ```
/// use warden::gateway::{RateLimitRegistry, WaitPlan};
///
/// let registry = RateLimitRegistry::new(35, 500);
/// assert_eq!(registry.plan_wait("abc123", 1_000), WaitPlan::Clear);
///
/// registry.note_429("abc123", 5, 1_000);
/// assert_eq!(
///     registry.plan_wait("abc123", 2_000),
///     WaitPlan::Cooldown { until: 6_000 }
/// );
/// ```
#[derive(Debug)]
pub struct RateLimitRegistry {
    /// Budget assumed after an optimistic reset.
    default_budget: i64,
    /// Safety margin added to reset waits, in milliseconds.
    reset_buffer_ms: i64,
    /// Per-credential state, keyed by truncated hash.
    states: Mutex<HashMap<String, RateState>>,
}

impl RateLimitRegistry {
    pub fn new(default_budget: i64, reset_buffer_ms: i64) -> Self {
        Self {
            default_budget,
            reset_buffer_ms,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn with_state<R>(&self, key_hash: &str, f: impl FnOnce(&mut RateState) -> R) -> R {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(key_hash.to_string())
            .or_insert_with(|| RateState {
                remaining: self.default_budget,
                reset_time: 0,
                blocked_until: 0,
                last_alert_time: 0,
            });
        f(state)
    }

    /// Decide what must happen before the next request for this credential.
    ///
    /// Does not mutate state; a budget wait is followed by
    /// [`optimistic_reset`](Self::optimistic_reset) once the caller has
    /// slept.
    pub fn plan_wait(&self, key_hash: &str, now_ms: i64) -> WaitPlan {
        self.with_state(key_hash, |state| {
            if now_ms < state.blocked_until {
                WaitPlan::Cooldown {
                    until: state.blocked_until,
                }
            } else if state.remaining <= 0 && state.reset_time > now_ms {
                WaitPlan::BudgetExhausted {
                    until: state.reset_time + self.reset_buffer_ms,
                }
            } else {
                WaitPlan::Clear
            }
        })
    }

    /// Refresh budget state from upstream rate-limit headers.
    ///
    /// Headers are authoritative; absent headers leave the prior view
    /// untouched.
    pub fn observe_headers(
        &self,
        key_hash: &str,
        remaining: Option<i64>,
        reset_epoch_secs: Option<i64>,
    ) {
        self.with_state(key_hash, |state| {
            if let Some(remaining) = remaining {
                state.remaining = remaining;
            }
            if let Some(reset) = reset_epoch_secs {
                state.reset_time = reset.saturating_mul(1000);
            }
        });
    }

    /// Record a 429 cooldown.
    pub fn note_429(&self, key_hash: &str, retry_after_secs: u64, now_ms: i64) {
        self.with_state(key_hash, |state| {
            state.blocked_until = now_ms + (retry_after_secs as i64).saturating_mul(1000);
        });
    }

    /// Assume a fresh budget after sleeping out a reset window.
    ///
    /// The next response's headers will correct the guess.
    pub fn optimistic_reset(&self, key_hash: &str) {
        let default_budget = self.default_budget;
        self.with_state(key_hash, |state| {
            state.remaining = default_budget;
        });
    }

    /// Claim the right to fire an operational alert for this credential.
    ///
    /// Returns true at most once per `min_interval_ms`, and records the
    /// claim.
    pub fn try_claim_alert(&self, key_hash: &str, now_ms: i64, min_interval_ms: i64) -> bool {
        self.with_state(key_hash, |state| {
            if now_ms - state.last_alert_time >= min_interval_ms {
                state.last_alert_time = now_ms;
                true
            } else {
                false
            }
        })
    }

    /// Current state of a credential.
    pub fn snapshot(&self, key_hash: &str) -> RateState {
        self.with_state(key_hash, |state| state.clone())
    }
}
