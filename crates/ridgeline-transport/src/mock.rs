//! Mock capture device transport for testing and development.
//!
//! This module provides a simulated capture device that can be controlled
//! programmatically for testing without requiring physical hardware.

use crate::traits::{DeviceTransport, RawCapture, TransportFactory};
use ridgeline_core::{DeviceAddress, Error, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

/// How a [`MockTransport`] answers connect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    /// Connect succeeds immediately.
    #[default]
    Accept,

    /// Connect fails as if no device answered at the address.
    Refuse,

    /// Connect never resolves, like an unplugged device. The session layer's
    /// connect timeout is the only way out.
    Silent,
}

/// Internal event type for the mock transport.
#[derive(Debug, Clone)]
enum CaptureEvent {
    Captured(RawCapture),
    Fault(String),
}

/// Shared control state between transport instances and their handle.
#[derive(Debug)]
struct MockShared {
    connect_behavior: Mutex<ConnectBehavior>,
}

/// Mock capture device transport.
///
/// The transport consumes a queue of scripted capture events fed through a
/// [`MockTransportHandle`]. If the queue is empty, `capture_once` waits,
/// which is exactly how a real scanner behaves while no finger is presented;
/// the session layer's per-sample timeout bounds the wait.
///
/// # Examples
///
/// ```
/// use ridgeline_core::DeviceAddress;
/// use ridgeline_transport::{DeviceTransport, MockTransport};
///
/// #[tokio::main]
/// async fn main() -> ridgeline_core::Result<()> {
///     let (mut transport, handle) = MockTransport::new();
///
///     handle.queue_capture(vec![1, 2, 3, 4, 5], 75).await?;
///
///     transport.connect(&DeviceAddress::new("dev-0")?).await?;
///     let capture = transport.capture_once().await?;
///     assert_eq!(capture.data, vec![1, 2, 3, 4, 5]);
///     assert_eq!(capture.quality, 75);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    /// Scripted capture events. Shared so a factory can hand every opened
    /// transport the same script.
    event_rx: Arc<AsyncMutex<mpsc::Receiver<CaptureEvent>>>,

    /// Control state shared with the handle.
    shared: Arc<MockShared>,

    /// Address of the currently connected device, if any.
    connected: Option<DeviceAddress>,
}

impl MockTransport {
    /// Create a new mock transport.
    ///
    /// Returns a tuple of (MockTransport, MockTransportHandle) where the
    /// handle is used to script captures, faults, and connect behavior.
    pub fn new() -> (Self, MockTransportHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let shared = Arc::new(MockShared {
            connect_behavior: Mutex::new(ConnectBehavior::Accept),
        });

        let transport = Self {
            event_rx: Arc::new(AsyncMutex::new(event_rx)),
            shared: Arc::clone(&shared),
            connected: None,
        };

        let handle = MockTransportHandle { event_tx, shared };

        (transport, handle)
    }

    /// Address of the connected device, if connected.
    pub fn connected_address(&self) -> Option<&DeviceAddress> {
        self.connected.as_ref()
    }

    fn connect_behavior(&self) -> ConnectBehavior {
        *self
            .shared
            .connect_behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceTransport for MockTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<()> {
        match self.connect_behavior() {
            ConnectBehavior::Accept => {
                self.connected = Some(address.clone());
                Ok(())
            }
            ConnectBehavior::Refuse => Err(Error::device_unavailable(address.as_str())),
            ConnectBehavior::Silent => std::future::pending().await,
        }
    }

    async fn capture_once(&mut self) -> Result<RawCapture> {
        if self.connected.is_none() {
            return Err(Error::device("capture on disconnected transport"));
        }

        let mut rx = self.event_rx.lock().await;
        let event = rx
            .recv()
            .await
            .ok_or_else(|| Error::device("capture event channel closed"))?;

        match event {
            CaptureEvent::Captured(capture) => Ok(capture),
            CaptureEvent::Fault(message) => Err(Error::device(message)),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = None;
        Ok(())
    }
}

/// Handle for controlling a [`MockTransport`].
///
/// The handle survives the transport and can be cloned freely; all clones
/// feed the same script queue.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    event_tx: mpsc::Sender<CaptureEvent>,
    shared: Arc<MockShared>,
}

impl MockTransportHandle {
    /// Queue one capture with the given payload and quality.
    ///
    /// The capture is returned by the next `capture_once()` call.
    ///
    /// # Errors
    ///
    /// Returns an error if the quality or payload is invalid, or if the
    /// transport has been dropped and the channel is closed.
    pub async fn queue_capture(&self, data: Vec<u8>, quality: u8) -> Result<()> {
        let capture = RawCapture::new(data, quality)?;

        self.event_tx
            .send(CaptureEvent::Captured(capture))
            .await
            .map_err(|_| Error::device("capture event channel closed"))
    }

    /// Queue a transport fault.
    ///
    /// The next `capture_once()` call fails with a device error carrying
    /// this message.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped and the channel
    /// is closed.
    pub async fn queue_fault(&self, message: impl Into<String>) -> Result<()> {
        self.event_tx
            .send(CaptureEvent::Fault(message.into()))
            .await
            .map_err(|_| Error::device("capture event channel closed"))
    }

    /// Set how subsequent connect attempts behave.
    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        *self
            .shared
            .connect_behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = behavior;
    }
}

/// Factory producing [`MockTransport`] instances that share one script.
///
/// Every transport opened by this factory consumes the same capture queue
/// and honors the same connect behavior, so a test can script a sequence of
/// enrollments up front through a single handle.
#[derive(Debug)]
pub struct MockTransportFactory {
    event_rx: Arc<AsyncMutex<mpsc::Receiver<CaptureEvent>>>,
    shared: Arc<MockShared>,
}

impl MockTransportFactory {
    /// Create a new factory and its controlling handle.
    pub fn new() -> (Self, MockTransportHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let shared = Arc::new(MockShared {
            connect_behavior: Mutex::new(ConnectBehavior::Accept),
        });

        let factory = Self {
            event_rx: Arc::new(AsyncMutex::new(event_rx)),
            shared: Arc::clone(&shared),
        };

        let handle = MockTransportHandle { event_tx, shared };

        (factory, handle)
    }
}

impl TransportFactory for MockTransportFactory {
    type Transport = MockTransport;

    fn open(&self) -> MockTransport {
        MockTransport {
            event_rx: Arc::clone(&self.event_rx),
            shared: Arc::clone(&self.shared),
            connected: None,
        }
    }
}
