use crate::error::ConfigError;

/// Reference admission queue depth of the Apex arbiter.
pub const QUEUE_CAPACITY: usize = 6;

/// Number of grants kept in [`crate::ArbiterSnapshot::recent_grants`].
pub const RECENT_GRANTS_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterConfig {
    /// Admission queue depth; admissions beyond it are rejected.
    pub capacity: usize,
    /// How long a retired slot stays at the ROB head before it is removed. Zero removes it
    /// immediately and lets the drain cascade within the same call.
    pub settle_delay_ns: u64,
    /// The arbiter only exists on the Apex architecture. A disabled arbiter refuses admission
    /// and delivers completion callbacks immediately.
    pub enabled: bool,
    /// Seed for the cosmetic grant latency estimate.
    pub seed: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            capacity: QUEUE_CAPACITY,
            settle_delay_ns: 0,
            enabled: true,
            seed: 0,
        }
    }
}

impl ArbiterConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
