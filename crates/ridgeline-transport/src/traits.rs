//! Transport trait definitions.
//!
//! These traits establish the contract between the enrollment core and the
//! physical capture device. They use native `async fn` methods (Rust 1.90 +
//! Edition 2024 RPITIT), so they are not object-safe; the core is generic
//! over the concrete transport type instead of boxing it.

#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use ridgeline_core::{DeviceAddress, Error, Result, constants::MAX_QUALITY_SCORE};
use serde::{Deserialize, Serialize};

/// One raw capture attempt as reported by the device.
///
/// The payload format is device-specific and opaque to the core; it is only
/// ever aggregated byte-for-byte into the final template. Quality is the
/// device's own suitability estimate for this single capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapture {
    /// Opaque template fragment produced by the device.
    pub data: Vec<u8>,

    /// Quality score of the capture (0-100, higher is better).
    pub quality: u8,

    /// When the device reported the capture.
    pub captured_at: DateTime<Utc>,
}

impl RawCapture {
    /// Create a new raw capture with the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the quality score is greater than 100 or the
    /// payload is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ridgeline_transport::RawCapture;
    ///
    /// let capture = RawCapture::new(vec![0u8; 512], 75).unwrap();
    /// assert_eq!(capture.quality, 75);
    ///
    /// assert!(RawCapture::new(vec![0u8; 512], 101).is_err());
    /// assert!(RawCapture::new(vec![], 75).is_err());
    /// ```
    pub fn new(data: Vec<u8>, quality: u8) -> Result<Self> {
        if quality > MAX_QUALITY_SCORE {
            return Err(Error::invalid_data(format!(
                "Capture quality must be 0-{}, got {}",
                MAX_QUALITY_SCORE, quality
            )));
        }
        if data.is_empty() {
            return Err(Error::invalid_data("Capture payload cannot be empty"));
        }

        Ok(Self {
            data,
            quality,
            captured_at: Utc::now(),
        })
    }

    /// Check if the capture quality meets or exceeds a threshold.
    ///
    /// # Examples
    ///
    /// ```
    /// use ridgeline_transport::RawCapture;
    ///
    /// let capture = RawCapture::new(vec![1, 2, 3], 65).unwrap();
    /// assert!(capture.meets_threshold(60));
    /// assert!(!capture.meets_threshold(70));
    /// ```
    #[must_use]
    pub fn meets_threshold(&self, threshold: u8) -> bool {
        self.quality >= threshold
    }
}

/// Capture device transport abstraction.
///
/// Implementations own the wire-level details (serial, USB, network) of one
/// device connection. The session layer wraps every call in a bounded timer,
/// so implementations are free to wait as long as the device does.
pub trait DeviceTransport: Send {
    /// Establish a connection to the device at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No device answers at the address
    /// - The device rejects the connection
    /// - A wire-level fault occurs
    fn connect(
        &mut self,
        address: &DeviceAddress,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Produce one raw capture.
    ///
    /// Resolves when the device reports a capture, which may require a user
    /// to present a finger first. The session layer bounds the wait.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transport is not connected
    /// - The device reports a capture fault
    /// - A wire-level fault occurs
    fn capture_once(&mut self) -> impl std::future::Future<Output = Result<RawCapture>> + Send;

    /// Tear down the connection.
    ///
    /// Must be idempotent: disconnecting an already-disconnected transport
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only on wire-level faults during teardown.
    fn disconnect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Factory for opening fresh, unconnected transports.
///
/// The coordinator opens one transport per enrollment; the factory decides
/// what backs it (a real driver in production, [`MockTransport`] in tests).
///
/// [`MockTransport`]: crate::mock::MockTransport
pub trait TransportFactory: Send + Sync {
    /// The transport type this factory produces.
    type Transport: DeviceTransport + Send + 'static;

    /// Open a new, unconnected transport.
    fn open(&self) -> Self::Transport;
}
