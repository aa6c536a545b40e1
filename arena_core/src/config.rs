use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ZoneLocation;

/// Which corner zones exist in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneFlags {
    pub top_left: bool,
    pub top_right: bool,
    pub bottom_left: bool,
    pub bottom_right: bool,
}

impl Default for ZoneFlags {
    fn default() -> Self {
        ZoneFlags {
            top_left: true,
            top_right: true,
            bottom_left: true,
            bottom_right: true,
        }
    }
}

impl ZoneFlags {
    pub fn is_enabled(&self, location: ZoneLocation) -> bool {
        match location {
            ZoneLocation::TopLeft => self.top_left,
            ZoneLocation::TopRight => self.top_right,
            ZoneLocation::BottomRight => self.bottom_right,
            ZoneLocation::BottomLeft => self.bottom_left,
        }
    }

    /// Enabled locations in their fixed order.
    pub fn enabled(&self) -> impl Iterator<Item = ZoneLocation> + '_ {
        ZoneLocation::ALL
            .into_iter()
            .filter(|location| self.is_enabled(*location))
    }
}

/// Bounded retry with exponential backoff for backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Per-attempt timeout.
    pub call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            multiplier: 2.0,
            call_timeout_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let millis = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Top-level arena configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Seed for every procedural choice (cluster colours, placements).
    pub random_seed: u64,
    pub zones: ZoneFlags,
    pub tick_period_ms: u64,
    /// Upper bound on rejection-sampling attempts per placement.
    pub placement_max_attempts: u32,
    pub retry: RetryPolicy,
}

impl ArenaConfig {
    pub fn with_seed(random_seed: u64) -> Self {
        ArenaConfig {
            random_seed,
            ..ArenaConfig::default()
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            random_seed: 0,
            zones: ZoneFlags::default(),
            tick_period_ms: 100,
            placement_max_attempts: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}
