use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for enrollment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the enrollment core.
#[derive(Debug, Error)]
pub enum Error {
    /// No device responded at the address within the connect timeout.
    #[error("Device unavailable: {address}")]
    DeviceUnavailable { address: String },

    /// The device is already claimed by another session.
    #[error("Device busy: {address}")]
    DeviceBusy { address: String },

    /// Transport-reported device fault.
    #[error("Device error: {message}")]
    DeviceError { message: String },

    /// A capture cycle timed out. Retryable up to the configured budget.
    #[error("Capture timeout after {duration_ms}ms")]
    CaptureTimeout { duration_ms: u64 },

    /// The consecutive-failure budget was exhausted on low-quality captures.
    #[error("Quality threshold not met after {attempts} consecutive attempts")]
    QualityThresholdExceeded { attempts: u32 },

    /// A request with this identifier is already known to the coordinator.
    #[error("Duplicate request: {request_id}")]
    DuplicateRequest { request_id: String },

    /// The request identifier is unknown, or its enrollment did not complete.
    #[error("Request not found: {request_id}")]
    NotFound { request_id: String },

    /// The enrollment is still in progress.
    #[error("Result not ready: {request_id}")]
    NotReady { request_id: String },

    /// The capture protocol attempted an illegal state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Invalid caller- or device-supplied data.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl Error {
    /// Create a new device-unavailable error.
    pub fn device_unavailable(address: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            address: address.into(),
        }
    }

    /// Create a new device-busy error.
    pub fn device_busy(address: impl Into<String>) -> Self {
        Self::DeviceBusy {
            address: address.into(),
        }
    }

    /// Create a new device error.
    pub fn device(message: impl Into<String>) -> Self {
        Self::DeviceError {
            message: message.into(),
        }
    }

    /// Create a new capture-timeout error.
    pub fn capture_timeout(duration_ms: u64) -> Self {
        Self::CaptureTimeout { duration_ms }
    }

    /// Create a new quality-threshold error.
    pub fn quality_threshold(attempts: u32) -> Self {
        Self::QualityThresholdExceeded { attempts }
    }

    /// Create a new duplicate-request error.
    pub fn duplicate_request(request_id: impl Into<String>) -> Self {
        Self::DuplicateRequest {
            request_id: request_id.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found(request_id: impl Into<String>) -> Self {
        Self::NotFound {
            request_id: request_id.into(),
        }
    }

    /// Create a new not-ready error.
    pub fn not_ready(request_id: impl Into<String>) -> Self {
        Self::NotReady {
            request_id: request_id.into(),
        }
    }

    /// Create a new invalid-data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Map this error to the terminal-failure taxonomy, if it has one.
    ///
    /// Caller-facing validation errors (`DuplicateRequest`, `NotFound`,
    /// `NotReady`, `InvalidData`, `InvalidStateTransition`) never become a
    /// recorded failure reason and return `None`.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::DeviceUnavailable { .. } => Some(ErrorKind::DeviceUnavailable),
            Self::DeviceBusy { .. } => Some(ErrorKind::DeviceBusy),
            Self::DeviceError { .. } => Some(ErrorKind::DeviceError),
            Self::CaptureTimeout { .. } => Some(ErrorKind::CaptureTimeout),
            Self::QualityThresholdExceeded { .. } => Some(ErrorKind::QualityThresholdExceeded),
            _ => None,
        }
    }
}

/// Terminal failure reason recorded on a failed enrollment.
///
/// This is the subset of [`Error`] that can end an enrollment, reduced to a
/// copyable tag so it can be stored on the session record and surfaced
/// through `status()` after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No device responded within the connect timeout.
    DeviceUnavailable,

    /// The device was claimed by another session.
    DeviceBusy,

    /// Transport-reported fault during the protocol.
    DeviceError,

    /// Capture retry budget exhausted on timeouts.
    CaptureTimeout,

    /// Capture retry budget exhausted on low-quality samples.
    QualityThresholdExceeded,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ErrorKind::DeviceUnavailable => "DeviceUnavailable",
            ErrorKind::DeviceBusy => "DeviceBusy",
            ErrorKind::DeviceError => "DeviceError",
            ErrorKind::CaptureTimeout => "CaptureTimeout",
            ErrorKind::QualityThresholdExceeded => "QualityThresholdExceeded",
        };
        write!(f, "{}", kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_error() {
        let error = Error::device_unavailable("usb:0/1");
        assert!(matches!(error, Error::DeviceUnavailable { .. }));
        assert_eq!(error.to_string(), "Device unavailable: usb:0/1");
        assert_eq!(error.kind(), Some(ErrorKind::DeviceUnavailable));
    }

    #[test]
    fn test_capture_timeout_error() {
        let error = Error::capture_timeout(5000);
        assert_eq!(error.to_string(), "Capture timeout after 5000ms");
        assert_eq!(error.kind(), Some(ErrorKind::CaptureTimeout));
    }

    #[test]
    fn test_quality_threshold_error() {
        let error = Error::quality_threshold(10);
        assert_eq!(
            error.to_string(),
            "Quality threshold not met after 10 consecutive attempts"
        );
        assert_eq!(error.kind(), Some(ErrorKind::QualityThresholdExceeded));
    }

    #[test]
    fn test_caller_errors_have_no_kind() {
        assert_eq!(Error::duplicate_request("req1").kind(), None);
        assert_eq!(Error::not_found("req1").kind(), None);
        assert_eq!(Error::not_ready("req1").kind(), None);
        assert_eq!(Error::invalid_data("bad").kind(), None);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::DeviceError.to_string(), "DeviceError");
        assert_eq!(
            ErrorKind::QualityThresholdExceeded.to_string(),
            "QualityThresholdExceeded"
        );
    }

    #[test]
    fn test_error_kind_serialization() {
        let serialized = serde_json::to_string(&ErrorKind::DeviceUnavailable).unwrap();
        assert_eq!(serialized, "\"device_unavailable\"");

        let deserialized: ErrorKind = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, ErrorKind::DeviceUnavailable);
    }
}
