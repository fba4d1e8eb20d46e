//! Per-identifier rate limiting with an explicit block list.
//!
//! Each identifier carries two fixed windows, one minute and one hour long.
//! Windows reset lazily on the first check after their reset time has
//! passed. Blocked identifiers are denied before any counter is touched.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{category, AuditLog};
use crate::clock::Clock;
use crate::error::SecurityError;
use crate::Result;

/// Length of the short window in milliseconds.
pub const MINUTE_MS: i64 = 60_000;
/// Length of the long window in milliseconds.
pub const HOUR_MS: i64 = 3_600_000;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per identifier per minute.
    pub max_per_minute: u32,
    /// Maximum requests per identifier per hour.
    pub max_per_hour: u32,
    /// Duration of a timed block in milliseconds.
    pub block_duration_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 100,
            max_per_hour: 1000,
            block_duration_ms: HOUR_MS,
        }
    }
}

impl RateLimitConfig {
    /// Custom per-minute and per-hour limits.
    pub fn custom(max_per_minute: u32, max_per_hour: u32) -> Self {
        Self {
            max_per_minute,
            max_per_hour,
            ..Default::default()
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Identifier is on the block list.
    Blocked,
    /// Per-minute limit reached.
    MinuteLimit,
    /// Per-hour limit reached.
    HourLimit,
}

impl DenyReason {
    /// Machine-readable reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::MinuteLimit => "rate:minute",
            Self::HourLimit => "rate:hour",
        }
    }

    fn audit_action(&self) -> &'static str {
        match self {
            Self::Blocked => "Blocked identifier attempted access",
            Self::MinuteLimit => "Rate limit exceeded (minute)",
            Self::HourLimit => "Rate limit exceeded (hour)",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied(DenyReason),
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Counter for one fixed window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: i64,
}

impl Window {
    fn starting_at(now: i64, length: i64) -> Self {
        Self {
            count: 0,
            reset_at: now + length,
        }
    }

    fn roll(&mut self, now: i64, length: i64) {
        if now > self.reset_at {
            *self = Self::starting_at(now, length);
        }
    }
}

/// Minute and hour windows for one identifier.
#[derive(Debug, Clone, Copy)]
struct RateTracker {
    minute: Window,
    hour: Window,
}

impl RateTracker {
    fn new(now: i64) -> Self {
        Self {
            minute: Window::starting_at(now, MINUTE_MS),
            hour: Window::starting_at(now, HOUR_MS),
        }
    }
}

/// Trackers and block list, guarded together.
#[derive(Debug, Default)]
struct LimiterState {
    trackers: HashMap<String, RateTracker>,
    /// Blocked identifiers mapped to an optional expiry (Unix millis).
    blocked: HashMap<String, Option<i64>>,
}

impl LimiterState {
    fn is_blocked(&mut self, identifier: &str, now: i64) -> bool {
        match self.blocked.get(identifier) {
            Some(None) => true,
            Some(Some(until)) if now <= *until => true,
            Some(Some(_)) => {
                self.blocked.remove(identifier);
                false
            }
            None => false,
        }
    }
}

/// Thread-safe rate limiter.
pub struct RateLimiter {
    state: RwLock<LimiterState>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditLog>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>, audit: Arc<AuditLog>) -> Self {
        Self {
            state: RwLock::new(LimiterState::default()),
            config,
            clock,
            audit,
        }
    }

    /// Check whether a request from `identifier` may proceed.
    ///
    /// An allowed request is counted against both windows. A denied one is
    /// not counted and is recorded in the audit log.
    pub fn check(&self, identifier: &str) -> Result<RateDecision> {
        let now = self.clock.now_millis();

        let decision = {
            let mut state = self
                .state
                .write()
                .map_err(|_| SecurityError::LockPoisoned)?;

            if state.is_blocked(identifier, now) {
                RateDecision::Denied(DenyReason::Blocked)
            } else {
                let tracker = state
                    .trackers
                    .entry(identifier.to_string())
                    .or_insert_with(|| RateTracker::new(now));

                tracker.minute.roll(now, MINUTE_MS);
                tracker.hour.roll(now, HOUR_MS);

                if tracker.minute.count >= self.config.max_per_minute {
                    RateDecision::Denied(DenyReason::MinuteLimit)
                } else if tracker.hour.count >= self.config.max_per_hour {
                    RateDecision::Denied(DenyReason::HourLimit)
                } else {
                    tracker.minute.count += 1;
                    tracker.hour.count += 1;
                    RateDecision::Allowed
                }
            }
        };

        if let RateDecision::Denied(reason) = decision {
            warn!(identifier, reason = %reason, "request denied");
            self.audit.record(
                category::SECURITY,
                reason.audit_action(),
                json!({ "ip": identifier, "reason": reason.as_str() }),
            );
        }

        Ok(decision)
    }

    /// Block `identifier` until explicitly unblocked.
    pub fn block_identifier(&self, identifier: &str, reason: &str) -> Result<()> {
        self.insert_block(identifier, None)?;
        info!(identifier, reason, "identifier blocked");
        self.audit.record(
            category::SECURITY,
            "IP blocked",
            json!({ "ip": identifier, "reason": reason }),
        );
        Ok(())
    }

    /// Block `identifier` for the configured block duration.
    pub fn block_temporarily(&self, identifier: &str, reason: &str) -> Result<()> {
        let until = self
            .clock
            .now_millis()
            .saturating_add(self.config.block_duration_ms);
        self.insert_block(identifier, Some(until))?;
        info!(identifier, reason, until, "identifier blocked temporarily");
        self.audit.record(
            category::SECURITY,
            "IP blocked",
            json!({ "ip": identifier, "reason": reason, "until": until }),
        );
        Ok(())
    }

    fn insert_block(&self, identifier: &str, until: Option<i64>) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| SecurityError::LockPoisoned)?;
        state.blocked.insert(identifier.to_string(), until);
        Ok(())
    }

    /// Remove `identifier` from the block list and forget its counters.
    pub fn unblock_identifier(&self, identifier: &str) -> Result<()> {
        {
            let mut state = self
                .state
                .write()
                .map_err(|_| SecurityError::LockPoisoned)?;
            state.blocked.remove(identifier);
            state.trackers.remove(identifier);
        }
        info!(identifier, "identifier unblocked");
        self.audit.record(
            category::SECURITY,
            "IP unblocked",
            json!({ "ip": identifier }),
        );
        Ok(())
    }

    /// Whether `identifier` is currently blocked.
    pub fn is_blocked(&self, identifier: &str) -> bool {
        let now = self.clock.now_millis();
        self.state
            .read()
            .map(|s| match s.blocked.get(identifier) {
                Some(None) => true,
                Some(Some(until)) => now <= *until,
                None => false,
            })
            .unwrap_or(false)
    }

    /// Evict trackers idle for more than an hour past their hour window and
    /// lift expired timed blocks.
    ///
    /// Returns the number of evicted trackers.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut state = self
            .state
            .write()
            .map_err(|_| SecurityError::LockPoisoned)?;

        let before = state.trackers.len();
        state
            .trackers
            .retain(|_, tracker| now <= tracker.hour.reset_at + HOUR_MS);
        state
            .blocked
            .retain(|_, until| until.map_or(true, |t| now <= t));

        let evicted = before - state.trackers.len();
        debug!(evicted, remaining = state.trackers.len(), "rate tracker sweep");
        Ok(evicted)
    }

    /// Current limiter configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get current stats.
    pub fn stats(&self) -> RateLimitStats {
        let (tracked, blocked) = self
            .state
            .read()
            .map(|s| (s.trackers.len(), s.blocked.len()))
            .unwrap_or((0, 0));
        RateLimitStats {
            tracked_identifiers: tracked,
            blocked_identifiers: blocked,
            max_per_minute: self.config.max_per_minute,
            max_per_hour: self.config.max_per_hour,
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rate limit statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    pub tracked_identifiers: usize,
    pub blocked_identifiers: usize,
    pub max_per_minute: u32,
    pub max_per_hour: u32,
}
