//! Engine configuration

use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Global concurrent-execution bound across a whole wave
    pub max_concurrency: usize,
    /// Per-atom attempt cap
    pub max_attempts: u32,
    /// Base retry backoff delay
    pub retry_base_delay: Duration,
    /// Ceiling on the backoff delay
    pub retry_max_delay: Duration,
    /// Confidence below this routes a result to human review
    pub confidence_threshold: f64,
    /// Atomicity below this flags a fragment at decomposition
    pub atomicity_threshold: f64,
    /// Target fragment granularity in lines
    pub granularity: usize,
    /// Invalid validation results block wave progression
    pub strict_validation: bool,
    /// Progress event channel capacity
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// With per-atom attempt cap
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, cap: u32) -> Self {
        self.max_attempts = cap.max(1);
        self
    }

    /// With retry backoff bounds
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    /// With review confidence threshold
    #[inline]
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// With atomicity threshold
    #[inline]
    #[must_use]
    pub fn with_atomicity_threshold(mut self, threshold: f64) -> Self {
        self.atomicity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// With fragment granularity
    #[inline]
    #[must_use]
    pub fn with_granularity(mut self, lines: usize) -> Self {
        self.granularity = lines.max(1);
        self
    }

    /// With strict validation gating
    #[inline]
    #[must_use]
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 100,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            confidence_threshold: 0.85,
            atomicity_threshold: 0.85,
            granularity: 10,
            strict_validation: false,
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = EngineConfig::new();
        assert_eq!(config.max_concurrency, 100);
        assert_eq!(config.max_attempts, 3);
        assert!((config.confidence_threshold - 0.85).abs() < f64::EPSILON);
        assert!(!config.strict_validation);
    }

    #[test]
    fn builders_clamp_degenerate_values() {
        let config = EngineConfig::new()
            .with_max_concurrency(0)
            .with_max_attempts(0)
            .with_confidence_threshold(2.0);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.max_attempts, 1);
        assert!((config.confidence_threshold - 1.0).abs() < f64::EPSILON);
    }
}
