//! Device session management for the Ridgeline enrollment core.
//!
//! A [`DeviceSession`] owns the connection lifecycle to a single capture
//! device: connect with a bounded timeout, produce raw captures with a
//! per-sample timeout, and disconnect idempotently. Sessions hold an
//! exclusive [`DeviceClaim`] on their device address for their whole
//! lifetime, so no two sessions can drive the same device at once.
//!
//! Timers are enforced here, independent of transport I/O completion:
//! whichever resolves first wins, and a late transport response after a
//! timeout is discarded with the timed-out future.

pub mod claim;
pub mod session;

pub use claim::{ClaimRegistry, DeviceClaim};
pub use session::{ConnectionState, DeviceSession, SessionConfig};
