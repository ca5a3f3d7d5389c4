//! Enrollment protocol configuration.

use ridgeline_core::{
    Error, Result,
    constants::{
        DEFAULT_CAPTURE_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_CONSECUTIVE_FAILURES,
        DEFAULT_QUALITY_THRESHOLD, MAX_QUALITY_SCORE,
    },
};
use ridgeline_session::SessionConfig;
use std::time::Duration;

/// Tuning knobs for one enrollment.
///
/// The defaults come from [`ridgeline_core::constants`] and match the
/// behavior described there.
///
/// # Example
///
/// ```
/// use ridgeline_enroll::EnrollmentConfig;
/// use std::time::Duration;
///
/// let config = EnrollmentConfig {
///     quality_threshold: 60,
///     capture_timeout: Duration::from_secs(2),
///     ..EnrollmentConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentConfig {
    /// Minimum quality score for an accepted sample.
    pub quality_threshold: u8,

    /// Consecutive failed cycles (timeouts or quality rejects) before the
    /// enrollment fails.
    pub max_consecutive_failures: u32,

    /// How long to wait for the device to answer a connect attempt.
    pub connect_timeout: Duration,

    /// Per-sample capture timeout.
    pub capture_timeout: Duration,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            capture_timeout: Duration::from_millis(DEFAULT_CAPTURE_TIMEOUT_MS),
        }
    }
}

impl EnrollmentConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidData` if the quality threshold exceeds the
    /// maximum score or the retry budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.quality_threshold > MAX_QUALITY_SCORE {
            return Err(Error::invalid_data(format!(
                "Quality threshold must be 0-{}, got {}",
                MAX_QUALITY_SCORE, self.quality_threshold
            )));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::invalid_data(
                "Retry budget must allow at least one attempt",
            ));
        }
        Ok(())
    }

    /// Derive the session timing configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: self.connect_timeout,
            capture_timeout: self.capture_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EnrollmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
        assert_eq!(
            config.max_consecutive_failures,
            DEFAULT_MAX_CONSECUTIVE_FAILURES
        );
    }

    #[test]
    fn test_threshold_bound() {
        let config = EnrollmentConfig {
            quality_threshold: 101,
            ..EnrollmentConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EnrollmentConfig {
            quality_threshold: 100,
            ..EnrollmentConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retry_budget_rejected() {
        let config = EnrollmentConfig {
            max_consecutive_failures: 0,
            ..EnrollmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_carries_timeouts() {
        let config = EnrollmentConfig {
            connect_timeout: Duration::from_millis(123),
            capture_timeout: Duration::from_millis(456),
            ..EnrollmentConfig::default()
        };

        let session = config.session_config();
        assert_eq!(session.connect_timeout, Duration::from_millis(123));
        assert_eq!(session.capture_timeout, Duration::from_millis(456));
    }
}
