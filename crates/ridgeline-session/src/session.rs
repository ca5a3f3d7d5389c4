//! Device session lifecycle.
//!
//! A session binds one claimed device address to one transport instance and
//! enforces the bounded timers the transport itself is not trusted with.

use crate::claim::DeviceClaim;
use ridgeline_core::{DeviceAddress, Error, ErrorKind, Result};
use ridgeline_transport::{DeviceTransport, RawCapture};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Timing configuration for a device session.
///
/// # Example
///
/// ```
/// use ridgeline_session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig {
///     connect_timeout: Duration::from_millis(1000),
///     capture_timeout: Duration::from_secs(5),
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a device to answer a connect attempt.
    pub connect_timeout: Duration,

    /// How long each capture cycle may take before it is retried.
    pub capture_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(
                ridgeline_core::constants::DEFAULT_CONNECT_TIMEOUT_MS,
            ),
            capture_timeout: Duration::from_millis(
                ridgeline_core::constants::DEFAULT_CAPTURE_TIMEOUT_MS,
            ),
        }
    }
}

/// Connection state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection to the device.
    Disconnected,

    /// Connect attempt in flight.
    Connecting,

    /// Connected and ready to capture.
    Ready,

    /// The transport reported an unrecoverable fault.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Ready => "Ready",
            ConnectionState::Error => "Error",
        };
        write!(f, "{}", state)
    }
}

/// One connection to a physical capture device.
///
/// Created around an unconnected transport and an exclusive claim on the
/// device address; destroyed on disconnect or fatal error, releasing the
/// claim either way.
///
/// # Connection Lifecycle
///
/// 1. Create session with `new()` around a claimed address
/// 2. Establish the connection with `connect()`
/// 3. Capture with `capture_once()`
/// 4. Tear down with `disconnect()` (idempotent)
///
/// # Thread Safety
///
/// A session is owned by a single driver task; all mutation happens on that
/// task between suspension points, never concurrently with itself.
#[derive(Debug)]
pub struct DeviceSession<T: DeviceTransport> {
    /// Session identifier, unique per connection attempt.
    id: Uuid,

    /// Address of the device this session is bound to.
    address: DeviceAddress,

    /// Current connection state.
    state: ConnectionState,

    /// Failure recorded by the last unrecoverable error, if any.
    last_error: Option<ErrorKind>,

    /// Timing configuration.
    config: SessionConfig,

    /// Underlying transport.
    transport: T,

    /// Exclusive claim on the device address. `None` once released.
    claim: Option<DeviceClaim>,
}

impl<T: DeviceTransport> DeviceSession<T> {
    /// Create a disconnected session around a claimed device address.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidData` if the claim is for a different address
    /// than the session is being created for.
    pub fn new(
        transport: T,
        address: DeviceAddress,
        claim: DeviceClaim,
        config: SessionConfig,
    ) -> Result<Self> {
        if claim.address() != &address {
            return Err(Error::invalid_data(format!(
                "Claim for {} does not match session address {}",
                claim.address(),
                address
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            address,
            state: ConnectionState::Disconnected,
            last_error: None,
            config,
            transport,
            claim: Some(claim),
        })
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bound device address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Current connection state. Side-effect-free.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.state
    }

    /// Failure recorded by the last unrecoverable error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Establish the connection, bounded by the connect timeout.
    ///
    /// A device that does not answer within the window counts as
    /// unavailable; if it answers late, the response is discarded along
    /// with the timed-out connect future. Connecting an already-ready
    /// session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No device answers within the connect timeout (`DeviceUnavailable`)
    /// - The transport refuses or faults (`DeviceUnavailable`/`DeviceError`)
    ///
    /// Either failure releases the device claim and leaves the session in
    /// the `Error` state.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Ready {
            return Ok(());
        }
        // A session whose claim is gone (disconnected or failed) is spent;
        // reconnecting it would bypass device exclusivity.
        if self.claim.is_none() {
            return Err(Error::device(
                "Session claim released; create a new session to reconnect",
            ));
        }

        info!(session = %self.id, address = %self.address, "connecting to device");
        self.state = ConnectionState::Connecting;

        match tokio::time::timeout(
            self.config.connect_timeout,
            self.transport.connect(&self.address),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(session = %self.id, "device ready");
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(session = %self.id, error = %e, "device connect failed");
                self.fail(&e);
                Err(e)
            }
            Err(_) => {
                let timeout_ms = self.config.connect_timeout.as_millis() as u64;
                warn!(session = %self.id, timeout_ms, "device connect timed out");
                let e = Error::device_unavailable(self.address.as_str());
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Request one raw capture, bounded by the per-sample timeout.
    ///
    /// A timeout is retryable: the session stays `Ready` and the timed-out
    /// capture future is dropped, discarding any late device response. A
    /// transport fault is not: the session enters the `Error` state and the
    /// claim is released.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session is not `Ready` (`DeviceError`)
    /// - The capture does not complete in time (`CaptureTimeout`)
    /// - The transport faults (`DeviceError`)
    pub async fn capture_once(&mut self) -> Result<RawCapture> {
        if self.state != ConnectionState::Ready {
            return Err(Error::device(format!(
                "Capture on session in state {}",
                self.state
            )));
        }

        match tokio::time::timeout(self.config.capture_timeout, self.transport.capture_once())
            .await
        {
            Ok(Ok(capture)) => {
                debug!(
                    session = %self.id,
                    quality = capture.quality,
                    bytes = capture.data.len(),
                    "capture received"
                );
                Ok(capture)
            }
            Ok(Err(e)) => {
                warn!(session = %self.id, error = %e, "capture failed");
                self.fail(&e);
                Err(e)
            }
            Err(_) => {
                let timeout_ms = self.config.capture_timeout.as_millis() as u64;
                debug!(session = %self.id, timeout_ms, "capture timed out");
                Err(Error::capture_timeout(timeout_ms))
            }
        }
    }

    /// Tear down the connection. Idempotent.
    ///
    /// Always leaves the session `Disconnected` and releases the claim; a
    /// transport fault during teardown is logged and swallowed so the
    /// contract holds.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        if let Err(e) = self.transport.disconnect().await {
            warn!(session = %self.id, error = %e, "transport teardown failed");
        }

        info!(session = %self.id, address = %self.address, "device disconnected");
        self.state = ConnectionState::Disconnected;
        self.claim = None;
    }

    /// Record an unrecoverable failure and release the device.
    fn fail(&mut self, error: &Error) {
        self.state = ConnectionState::Error;
        self.last_error = error.kind();
        self.claim = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimRegistry;
    use ridgeline_transport::{ConnectBehavior, MockTransport, MockTransportHandle};

    fn address() -> DeviceAddress {
        DeviceAddress::new("dev-0").unwrap()
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_millis(50),
            capture_timeout: Duration::from_millis(50),
        }
    }

    fn session_with(
        registry: &ClaimRegistry,
        config: SessionConfig,
    ) -> (DeviceSession<MockTransport>, MockTransportHandle) {
        let (transport, handle) = MockTransport::new();
        let claim = registry.claim(&address()).unwrap();
        let session = DeviceSession::new(transport, address(), claim, config).unwrap();
        (session, handle)
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let registry = ClaimRegistry::new();
        let (session, _handle) = session_with(&registry, SessionConfig::default());

        assert_eq!(session.status(), ConnectionState::Disconnected);
        assert_eq!(session.last_error(), None);
        assert_eq!(session.address(), &address());
    }

    #[test]
    fn test_new_rejects_mismatched_claim() {
        let registry = ClaimRegistry::new();
        let (transport, _handle) = MockTransport::new();
        let other = DeviceAddress::new("dev-1").unwrap();
        let claim = registry.claim(&other).unwrap();

        let result = DeviceSession::new(transport, address(), claim, SessionConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_ready() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        assert_eq!(session.status(), ConnectionState::Ready);
        assert!(registry.is_claimed(&address()));
    }

    #[tokio::test]
    async fn test_connect_is_noop_when_ready() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(session.status(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_connect_timeout_is_unavailable() {
        let registry = ClaimRegistry::new();
        let (mut session, handle) = session_with(&registry, fast_config());
        handle.set_connect_behavior(ConnectBehavior::Silent);

        let result = session.connect().await;
        assert!(matches!(result, Err(Error::DeviceUnavailable { .. })));
        assert_eq!(session.status(), ConnectionState::Error);
        assert_eq!(session.last_error(), Some(ErrorKind::DeviceUnavailable));

        // Fatal connect failure releases the device for other sessions.
        assert!(!registry.is_claimed(&address()));
    }

    #[tokio::test]
    async fn test_connect_refused_is_unavailable() {
        let registry = ClaimRegistry::new();
        let (mut session, handle) = session_with(&registry, fast_config());
        handle.set_connect_behavior(ConnectBehavior::Refuse);

        let result = session.connect().await;
        assert!(matches!(result, Err(Error::DeviceUnavailable { .. })));
        assert!(!registry.is_claimed(&address()));
    }

    #[tokio::test]
    async fn test_capture_roundtrip() {
        let registry = ClaimRegistry::new();
        let (mut session, handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        handle.queue_capture(vec![9, 9, 9], 85).await.unwrap();

        let capture = session.capture_once().await.unwrap();
        assert_eq!(capture.quality, 85);
        assert_eq!(session.status(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_capture_timeout_is_retryable() {
        let registry = ClaimRegistry::new();
        let (mut session, handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();

        // Nothing queued: the capture times out but the session stays usable.
        let result = session.capture_once().await;
        assert!(matches!(result, Err(Error::CaptureTimeout { .. })));
        assert_eq!(session.status(), ConnectionState::Ready);
        assert!(registry.is_claimed(&address()));

        handle.queue_capture(vec![1], 70).await.unwrap();
        assert_eq!(session.capture_once().await.unwrap().quality, 70);
    }

    #[tokio::test]
    async fn test_capture_fault_is_fatal() {
        let registry = ClaimRegistry::new();
        let (mut session, handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        handle.queue_fault("sensor desync").await.unwrap();

        let result = session.capture_once().await;
        assert!(matches!(result, Err(Error::DeviceError { .. })));
        assert_eq!(session.status(), ConnectionState::Error);
        assert_eq!(session.last_error(), Some(ErrorKind::DeviceError));
        assert!(!registry.is_claimed(&address()));
    }

    #[tokio::test]
    async fn test_capture_requires_ready_session() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        let result = session.capture_once().await;
        assert!(matches!(result, Err(Error::DeviceError { .. })));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();

        session.disconnect().await;
        assert_eq!(session.status(), ConnectionState::Disconnected);
        assert!(!registry.is_claimed(&address()));

        // Second disconnect has no effect and still succeeds.
        session.disconnect().await;
        assert_eq!(session.status(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_spent_session_cannot_reconnect() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        session.disconnect().await;

        // The claim went with the disconnect; this session is one-shot.
        let result = session.connect().await;
        assert!(matches!(result, Err(Error::DeviceError { .. })));
    }

    #[tokio::test]
    async fn test_disconnect_releases_claim_for_reconnect() {
        let registry = ClaimRegistry::new();
        let (mut session, _handle) = session_with(&registry, fast_config());

        session.connect().await.unwrap();
        session.disconnect().await;

        // The same address can be claimed and connected again.
        let (mut second, _handle2) = session_with(&registry, fast_config());
        second.connect().await.unwrap();
        assert_eq!(second.status(), ConnectionState::Ready);
    }
}
