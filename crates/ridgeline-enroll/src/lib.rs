//! Capture protocol state machine for the Ridgeline enrollment core.
//!
//! This crate drives one enrollment against a bound device session: repeated
//! capture/quality-check cycles with a bounded retry budget, cooperative
//! cancellation observed at every transition boundary, and deterministic
//! template finalization from the ordered accepted samples.
//!
//! # States
//!
//! - `Idle`: created, not yet capturing
//! - `Capturing`: one raw capture requested from the device
//! - `Evaluating`: quality-gating the received capture
//! - `Finalizing`: deriving the template from the accepted samples
//! - `Complete` / `Failed` / `Cancelled`: terminal
//!
//! # Valid Transitions
//!
//! - Idle → Capturing
//! - Capturing → Evaluating → (Capturing | Finalizing | Failed)
//! - Finalizing → Complete | Failed
//! - any non-terminal state → Cancelled

pub mod config;
pub mod events;
pub mod protocol;
pub mod state;
pub mod template;

pub use config::EnrollmentConfig;
pub use events::{EnrollmentEvent, EventSink};
pub use protocol::{CaptureProtocol, ProtocolOutcome};
pub use state::{EnrollState, StateMachine, StateTransition};
pub use template::{CaptureSample, EnrollmentResult, derive_template};
