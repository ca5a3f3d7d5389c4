//! Core constants for the enrollment protocol.
//!
//! These values define the default timing, quality, and retry behavior of
//! the capture protocol. They can be overridden per enrollment through the
//! configuration layer; the defaults here match the behavior of the vendor
//! reference scanners this core was written against.

// ============================================================================
// Quality Gating
// ============================================================================

/// Minimum quality score for an acceptable capture.
///
/// Captures scoring below this threshold are discarded and retried.
/// Values 0-49 are considered poor quality, 50-100 are acceptable.
pub const DEFAULT_QUALITY_THRESHOLD: u8 = 50;

/// Maximum quality score.
///
/// Quality scores range from 0 (lowest) to 100 (highest). A capture
/// reporting a score above this value is invalid data, not a good capture.
pub const MAX_QUALITY_SCORE: u8 = 100;

// ============================================================================
// Timeout Configuration
// ============================================================================

/// Default timeout for device connect attempts (milliseconds).
///
/// If no device responds within this window, the connect attempt fails
/// with `DeviceUnavailable`. A late response after the window is discarded.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Default per-sample capture timeout (milliseconds).
///
/// Each capture cycle waits this long for the device to produce a raw
/// capture before yielding a retryable `CaptureTimeout`.
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Retry Budget
// ============================================================================

/// Maximum consecutive failed capture cycles before an enrollment fails.
///
/// Both low-quality rejects and per-sample timeouts consume this budget;
/// an accepted sample resets it.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

// ============================================================================
// Sample Count Bounds
// ============================================================================

/// Minimum target sample count for an enrollment.
pub const MIN_TARGET_SAMPLES: u32 = 1;

/// Maximum target sample count for an enrollment.
///
/// Vendor scanners cap multi-sample enrollment well below this; the bound
/// exists to reject nonsense requests before a device is claimed.
pub const MAX_TARGET_SAMPLES: u32 = 16;

// ============================================================================
// Identifier Constraints
// ============================================================================

/// Maximum length of a caller-supplied request identifier (characters).
pub const MAX_REQUEST_ID_LENGTH: usize = 64;

/// Maximum length of a device address (characters).
pub const MAX_DEVICE_ADDRESS_LENGTH: usize = 128;
