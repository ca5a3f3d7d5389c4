//! Device transport abstraction for the Ridgeline enrollment core.
//!
//! This crate defines the narrow interface the core expects from a capture
//! device transport: connect to an addressed device, produce one raw capture
//! at a time, and disconnect. Any transport implementing [`DeviceTransport`]
//! is compatible; the core never looks inside the capture payload.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all I/O operations are asynchronous using native
//!   `async fn` in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Caller-owned timing**: the transport may block indefinitely; bounded
//!   timeouts are enforced one layer up, in the device session. A transport
//!   that never resolves must not be able to hang the core.
//! - **Error-aware**: all operations return `Result<T>` from
//!   `ridgeline-core`'s taxonomy.
//!
//! # Mock Transport
//!
//! [`MockTransport`] is a channel-scripted device for development and tests:
//! captures are queued with chosen quality and payload, transport faults can
//! be injected, and connect behavior (accept / refuse / never respond) is
//! programmable.
//!
//! ```
//! use ridgeline_core::DeviceAddress;
//! use ridgeline_transport::{DeviceTransport, MockTransport};
//!
//! #[tokio::main]
//! async fn main() -> ridgeline_core::Result<()> {
//!     let (mut transport, handle) = MockTransport::new();
//!     handle.queue_capture(vec![1, 2, 3], 80).await?;
//!
//!     let address = DeviceAddress::new("dev-0")?;
//!     transport.connect(&address).await?;
//!
//!     let capture = transport.capture_once().await?;
//!     assert_eq!(capture.quality, 80);
//!     Ok(())
//! }
//! ```

pub mod mock;
pub mod traits;

pub use mock::{ConnectBehavior, MockTransport, MockTransportFactory, MockTransportHandle};
pub use traits::{DeviceTransport, RawCapture, TransportFactory};
