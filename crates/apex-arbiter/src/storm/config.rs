use apex_time::ms;

use crate::config::ArbiterConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StormMode {
    /// Apex: requests are sequenced, granted one at a time and retired through the ROB.
    #[default]
    Arbitrated,
    /// Pre-Apex architectures: every SM races straight to L2 and results land in whatever order
    /// the L2 lock releases them.
    RawBus,
}

/// Half-open `[lo, hi)` range of virtual nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsRange {
    pub lo: u64,
    pub hi: u64,
}

impl NsRange {
    pub const fn ms(lo: u64, hi: u64) -> Self {
        Self {
            lo: ms(lo),
            hi: ms(hi),
        }
    }

    fn is_valid(self) -> bool {
        self.lo < self.hi
    }
}

/// Timing and sizing for an atomic storm. All durations are cosmetic virtual time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormConfig {
    pub mode: StormMode,
    pub sm_count: u32,
    pub arbiter: ArbiterConfig,
    /// Grants allowed through the arbiter body at once.
    pub max_grants_in_flight: usize,
    pub launch_stagger_ns: u64,
    /// Extra launch delay drawn uniformly from `[0, launch_jitter_ns)`.
    pub launch_jitter_ns: u64,
    pub travel_to_arbiter_ns: u64,
    pub grant_travel_ns: u64,
    pub arbiter_body_ns: u64,
    pub to_l2_ns: u64,
    pub l2_fast: NsRange,
    pub l2_slow: NsRange,
    /// Probability that an RMW lands on a fast L2 bank.
    pub l2_fast_probability: f64,
    pub ack_travel_ns: u64,
    pub data_travel_ns: u64,
    /// Delay before a stalled SM retries admission.
    pub retry_backoff_ns: u64,
    pub raw_launch_jitter_ns: u64,
    pub raw_lock: NsRange,
    pub seed: u64,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            mode: StormMode::Arbitrated,
            sm_count: 4,
            arbiter: ArbiterConfig {
                settle_delay_ns: ms(600),
                ..ArbiterConfig::default()
            },
            max_grants_in_flight: 1,
            launch_stagger_ns: ms(18),
            launch_jitter_ns: ms(25),
            travel_to_arbiter_ns: ms(120),
            grant_travel_ns: ms(90),
            arbiter_body_ns: ms(40),
            to_l2_ns: ms(60),
            l2_fast: NsRange::ms(50, 180),
            l2_slow: NsRange::ms(320, 600),
            l2_fast_probability: 0.6,
            ack_travel_ns: ms(100),
            data_travel_ns: ms(110),
            retry_backoff_ns: ms(200),
            raw_launch_jitter_ns: ms(600),
            raw_lock: NsRange::ms(100, 700),
            seed: 0,
        }
    }
}

impl StormConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arbiter.validate()?;
        if self.sm_count == 0 {
            return Err(ConfigError::InvalidStorm("sm_count must be non-zero"));
        }
        if self.max_grants_in_flight == 0 {
            return Err(ConfigError::InvalidStorm(
                "max_grants_in_flight must be non-zero",
            ));
        }
        if self.mode == StormMode::Arbitrated && !self.arbiter.enabled {
            return Err(ConfigError::InvalidStorm(
                "an arbitrated storm needs an enabled arbiter",
            ));
        }
        if !self.l2_fast.is_valid() || !self.l2_slow.is_valid() || !self.raw_lock.is_valid() {
            return Err(ConfigError::InvalidStorm("latency ranges must be non-empty"));
        }
        if !(0.0..=1.0).contains(&self.l2_fast_probability) {
            return Err(ConfigError::InvalidStorm(
                "l2_fast_probability must be within [0, 1]",
            ));
        }
        if self.retry_backoff_ns == 0 {
            return Err(ConfigError::InvalidStorm("retry_backoff must be non-zero"));
        }
        Ok(())
    }
}
