use crate::{
    Result,
    constants::{MAX_DEVICE_ADDRESS_LENGTH, MAX_REQUEST_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-supplied enrollment request identifier.
///
/// Request identifiers name one enrollment for its whole lifetime and must
/// be unique among the requests a coordinator currently retains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new request identifier with validation.
    ///
    /// The identifier is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidData` if the identifier is empty, longer than
    /// [`MAX_REQUEST_ID_LENGTH`] characters, or contains non-ASCII characters.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::invalid_data("Request ID cannot be empty"));
        }
        if id.len() > MAX_REQUEST_ID_LENGTH {
            return Err(Error::invalid_data(format!(
                "Request ID must be at most {MAX_REQUEST_ID_LENGTH} chars, got {}",
                id.len()
            )));
        }
        if !id.is_ascii() {
            return Err(Error::invalid_data("Request ID must be ASCII"));
        }

        Ok(RequestId(id.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RequestId::new(s)
    }
}

/// Address of a physical capture device.
///
/// Opaque to the core; the transport decides what it means (a serial port,
/// a USB path, a network endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a new device address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidData` if the address is empty, longer than
    /// [`MAX_DEVICE_ADDRESS_LENGTH`] characters, or contains non-ASCII
    /// characters.
    pub fn new(address: &str) -> Result<Self> {
        let address = address.trim();

        if address.is_empty() {
            return Err(Error::invalid_data("Device address cannot be empty"));
        }
        if address.len() > MAX_DEVICE_ADDRESS_LENGTH {
            return Err(Error::invalid_data(format!(
                "Device address must be at most {MAX_DEVICE_ADDRESS_LENGTH} chars, got {}",
                address.len()
            )));
        }
        if !address.is_ascii() {
            return Err(Error::invalid_data("Device address must be ASCII"));
        }

        Ok(DeviceAddress(address.to_string()))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceAddress::new(s)
    }
}

/// Unique identifier of a finalized template.
///
/// Generated fresh at finalization; never derived from the sample data, so
/// two enrollments of the same finger still get distinct identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(Uuid);

impl TemplateId {
    /// Generate a new random template identifier.
    #[must_use]
    pub fn generate() -> Self {
        TemplateId(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable status of one enrollment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Accepted but not yet capturing.
    Pending,

    /// Driving capture cycles against the device.
    Capturing,

    /// All samples accepted; deriving the template.
    Finalizing,

    /// Template derived; result available.
    Complete,

    /// Terminal failure; the reason is recorded alongside.
    Failed,

    /// Cancelled by the caller.
    Cancelled,
}

impl EnrollmentStatus {
    /// Returns `true` for states that end an enrollment.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self {
            EnrollmentStatus::Pending => "Pending",
            EnrollmentStatus::Capturing => "Capturing",
            EnrollmentStatus::Finalizing => "Finalizing",
            EnrollmentStatus::Complete => "Complete",
            EnrollmentStatus::Failed => "Failed",
            EnrollmentStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("req1", "req1")]
    #[case("  padded  ", "padded")]
    #[case("enroll-2026-08-07/0042", "enroll-2026-08-07/0042")]
    fn test_request_id_valid(#[case] input: &str, #[case] expected: &str) {
        let id: RequestId = input.parse().unwrap();
        assert_eq!(id.as_str(), expected);
    }

    #[rstest]
    #[case("")] // empty
    #[case("   ")] // whitespace only
    #[case("réq")] // non-ASCII
    fn test_request_id_invalid(#[case] input: &str) {
        let result: Result<RequestId> = input.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_request_id_too_long() {
        let long = "r".repeat(MAX_REQUEST_ID_LENGTH + 1);
        assert!(RequestId::new(&long).is_err());

        let max = "r".repeat(MAX_REQUEST_ID_LENGTH);
        assert!(RequestId::new(&max).is_ok());
    }

    #[rstest]
    #[case("dev-0")]
    #[case("/dev/ttyUSB0")]
    #[case("usb:1/4")]
    fn test_device_address_valid(#[case] input: &str) {
        let address = DeviceAddress::new(input).unwrap();
        assert_eq!(address.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("dévice")]
    fn test_device_address_invalid(#[case] input: &str) {
        assert!(DeviceAddress::new(input).is_err());
    }

    #[test]
    fn test_template_id_unique() {
        let a = TemplateId::generate();
        let b = TemplateId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_enrollment_status_terminal() {
        assert!(!EnrollmentStatus::Pending.is_terminal());
        assert!(!EnrollmentStatus::Capturing.is_terminal());
        assert!(!EnrollmentStatus::Finalizing.is_terminal());
        assert!(EnrollmentStatus::Complete.is_terminal());
        assert!(EnrollmentStatus::Failed.is_terminal());
        assert!(EnrollmentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_enrollment_status_serialization() {
        let serialized = serde_json::to_string(&EnrollmentStatus::Capturing).unwrap();
        assert_eq!(serialized, "\"capturing\"");

        let deserialized: EnrollmentStatus = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, EnrollmentStatus::Capturing);
    }

    #[test]
    fn test_enrollment_status_display() {
        assert_eq!(EnrollmentStatus::Pending.to_string(), "Pending");
        assert_eq!(EnrollmentStatus::Complete.to_string(), "Complete");
        assert_eq!(EnrollmentStatus::Cancelled.to_string(), "Cancelled");
    }
}
