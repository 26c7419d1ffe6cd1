use std::time::Duration;

use crate::sample_source::StallPolicy;
use crate::trigger::TriggerLevel;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Trigger level {0} out of range (max 1023)")]
    LevelOutOfRange(u16),

    #[error("Burst pacing interval must be at least one sample")]
    ZeroPacingInterval,
}

/// Short pauses inserted while a burst is being sent.
///
/// Some Bluetooth serial bridges drop bytes when fed a full frame without a
/// break. A pause follows every `every`-th sample, except within the last
/// `every` samples of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstPacing {
    every: usize,
    pause: Duration,
}

impl BurstPacing {
    pub const DEFAULT_EVERY: usize = 50;
    pub const DEFAULT_PAUSE: Duration = Duration::from_millis(1);

    pub fn new(every: usize, pause: Duration) -> Result<Self, ConfigError> {
        if every == 0 {
            return Err(ConfigError::ZeroPacingInterval);
        }
        Ok(Self { every, pause })
    }

    /// Whether to pause after sample `index` of a burst of `len` samples.
    pub fn pause_after(&self, index: usize, len: usize) -> bool {
        index + self.every < len && index % self.every == self.every - 1
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }
}

impl Default for BurstPacing {
    fn default() -> Self {
        Self {
            every: Self::DEFAULT_EVERY,
            pause: Self::DEFAULT_PAUSE,
        }
    }
}

/// Settings fixed for the lifetime of an [`AcquisitionStateMachine`](crate::AcquisitionStateMachine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    pub trigger_level: TriggerLevel,
    /// Samples inspected per trigger wait before giving up.
    pub trigger_retry_limit: u32,
    pub stall_policy: StallPolicy,
    pub burst_pacing: Option<BurstPacing>,
    pub baud_rate: u32,
}

impl ScopeConfig {
    pub const DEFAULT_RETRY_LIMIT: u32 = 10_000;
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger_level(mut self, level: TriggerLevel) -> Self {
        self.trigger_level = level;
        self
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.trigger_retry_limit = limit;
        self
    }

    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    pub fn with_burst_pacing(mut self, pacing: Option<BurstPacing>) -> Self {
        self.burst_pacing = pacing;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            trigger_level: TriggerLevel::CENTER,
            trigger_retry_limit: Self::DEFAULT_RETRY_LIMIT,
            stall_policy: StallPolicy::Block,
            burst_pacing: Some(BurstPacing::default()),
            baud_rate: Self::DEFAULT_BAUD_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pacing_points() {
        let pacing = BurstPacing::default();
        let pauses: Vec<usize> = (0..480).filter(|&i| pacing.pause_after(i, 480)).collect();

        assert_eq!(pauses, vec![49, 99, 149, 199, 249, 299, 349, 399]);
    }

    #[test]
    fn test_short_burst_never_pauses() {
        let pacing = BurstPacing::default();
        assert!((0..50).all(|i| !pacing.pause_after(i, 50)));
        assert!((0..10).all(|i| !pacing.pause_after(i, 10)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            BurstPacing::new(0, Duration::ZERO),
            Err(ConfigError::ZeroPacingInterval)
        ));
    }

    #[test]
    fn test_builder() {
        let config = ScopeConfig::new()
            .with_trigger_level(TriggerLevel::new(300).unwrap())
            .with_retry_limit(5)
            .with_stall_policy(StallPolicy::SpinLimit(1_000))
            .with_burst_pacing(None)
            .with_baud_rate(9_600);

        assert_eq!(config.trigger_level.value(), 300);
        assert_eq!(config.trigger_retry_limit, 5);
        assert_eq!(config.stall_policy, StallPolicy::SpinLimit(1_000));
        assert_eq!(config.burst_pacing, None);
        assert_eq!(config.baud_rate, 9_600);
    }
}
