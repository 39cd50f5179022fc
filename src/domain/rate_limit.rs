//! Refresh gating for external resources.
//!
//! Each external resource (spot-price feed, commentary) gets its own
//! [`RateController`] with a minimum interval between requests and a quota per
//! window. The controller is a two-state machine:
//!
//! - `Ready`: a request may be issued now
//! - `Cooldown`: the caller should serve its last cached result instead
//!
//! All operations take `now` explicitly; the controller owns no timers. An
//! external scheduler calls [`RateController::tick`] to roll the quota window.

use crate::domain::error::MetalwatchError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const PRICE_FEED: &str = "price_feed";
pub const COMMENTARY: &str = "commentary";

/// Persisted quota counters. Timestamps are Unix milliseconds; 0 means never.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaState {
    pub last_request: i64,
    pub request_count: u32,
    pub window_started: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub interval: Duration,
    pub quota: u32,
    pub window: Duration,
}

impl RatePolicy {
    /// Spreads `requests` evenly across `window`.
    pub fn per_window(requests: u32, window: Duration) -> Result<Self, MetalwatchError> {
        if requests == 0 {
            return Err(MetalwatchError::invalid_parameter(
                "requests_per_window",
                "must be at least 1",
            ));
        }
        if window <= Duration::zero() {
            return Err(MetalwatchError::invalid_parameter(
                "window",
                "must be positive",
            ));
        }
        Ok(Self {
            interval: Duration::milliseconds(window.num_milliseconds() / i64::from(requests)),
            quota: requests,
            window,
        })
    }

    /// 7 requests per hour, one every ~8.57 minutes.
    pub fn price_feed() -> Self {
        Self {
            interval: Duration::milliseconds(3_600_000 / 7),
            quota: 7,
            window: Duration::hours(1),
        }
    }

    /// One request per hour.
    pub fn commentary() -> Self {
        Self {
            interval: Duration::hours(1),
            quota: 1,
            window: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Ready,
    Cooldown { remaining: Duration },
}

impl RefreshDecision {
    pub fn is_ready(&self) -> bool {
        matches!(self, RefreshDecision::Ready)
    }
}

/// What a caller should do about a refresh right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Fetch,
    UseCached { remaining: Duration },
    /// Cooling down but nothing is cached; fetch anyway rather than stall.
    ForcedFetch,
}

#[derive(Debug, Clone)]
pub struct RateController {
    resource: String,
    policy: RatePolicy,
    state: QuotaState,
}

impl RateController {
    pub fn new(resource: &str, policy: RatePolicy) -> Self {
        Self::restore(resource, policy, QuotaState::default())
    }

    pub fn restore(resource: &str, policy: RatePolicy, state: QuotaState) -> Self {
        Self {
            resource: resource.to_string(),
            policy,
            state,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    pub fn should_refresh(&self, now: DateTime<Utc>) -> RefreshDecision {
        if self.state.last_request == 0 {
            return RefreshDecision::Ready;
        }

        let now_ms = now.timestamp_millis();
        let interval_ms = self.policy.interval.num_milliseconds();
        let elapsed = now_ms - self.state.last_request;
        if elapsed < interval_ms {
            // A clock that moved backwards never extends the wait past one interval.
            let remaining = (interval_ms - elapsed).min(interval_ms);
            return RefreshDecision::Cooldown {
                remaining: Duration::milliseconds(remaining),
            };
        }

        let window_ms = self.policy.window.num_milliseconds();
        let window_end = self.state.window_started + window_ms;
        if self.state.request_count >= self.policy.quota && now_ms < window_end {
            return RefreshDecision::Cooldown {
                remaining: Duration::milliseconds(window_end - now_ms),
            };
        }

        RefreshDecision::Ready
    }

    pub fn record_request(&mut self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        if self.state.window_started == 0 {
            self.state.window_started = now_ms;
        }
        self.state.last_request = now_ms;
        self.state.request_count = self.state.request_count.saturating_add(1);
        tracing::debug!(
            resource = %self.resource,
            count = self.state.request_count,
            quota = self.policy.quota,
            "request recorded"
        );
    }

    /// Starts a new quota window. `last_request` is left untouched.
    pub fn reset_window(&mut self, now: DateTime<Utc>) {
        self.state.request_count = 0;
        self.state.window_started = now.timestamp_millis();
    }

    /// Rolls the quota window if a full window has elapsed. Returns true on reset.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.window_started == 0 {
            return false;
        }
        let elapsed = now.timestamp_millis() - self.state.window_started;
        if elapsed >= self.policy.window.num_milliseconds() {
            self.reset_window(now);
            tracing::debug!(resource = %self.resource, "quota window reset");
            return true;
        }
        false
    }

    pub fn admit(&self, now: DateTime<Utc>, has_cached: bool) -> Admission {
        match self.should_refresh(now) {
            RefreshDecision::Ready => Admission::Fetch,
            RefreshDecision::Cooldown { remaining } if has_cached => {
                Admission::UseCached { remaining }
            }
            RefreshDecision::Cooldown { .. } => Admission::ForcedFetch,
        }
    }
}
