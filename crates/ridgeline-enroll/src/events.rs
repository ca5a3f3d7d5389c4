//! Progress events emitted while an enrollment runs.
//!
//! Events are advisory: a slow or absent consumer never blocks the capture
//! protocol, so emission uses `try_send` and silently drops on a full or
//! closed channel.

use crate::state::EnrollState;
use ridgeline_core::{EnrollmentStatus, ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// One observable step of an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    /// The protocol state machine moved.
    StateChanged { from: EnrollState, to: EnrollState },

    /// A capture met the quality threshold and was appended.
    SampleAccepted { index: u32, quality: u8 },

    /// A capture was discarded for low quality.
    SampleRejected { quality: u8 },

    /// A capture cycle timed out and will be retried.
    CaptureTimedOut { consecutive_failures: u32 },

    /// The enrollment finished with a result.
    Completed { sample_count: u32 },

    /// The enrollment failed terminally.
    Failed { kind: ErrorKind },

    /// The enrollment was cancelled.
    Cancelled,
}

/// Where the protocol reports progress.
///
/// Bundles the optional event stream with the optional status publisher so
/// the protocol has a single reporting surface. The default sink is silent,
/// which is what direct protocol tests use.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    events: Option<mpsc::Sender<EnrollmentEvent>>,
    status: Option<Arc<watch::Sender<EnrollmentStatus>>>,
}

impl EventSink {
    /// Create a sink feeding an event channel and a status watch.
    #[must_use]
    pub fn new(
        events: mpsc::Sender<EnrollmentEvent>,
        status: Arc<watch::Sender<EnrollmentStatus>>,
    ) -> Self {
        Self {
            events: Some(events),
            status: Some(status),
        }
    }

    /// Emit one event. Never blocks; drops the event if nobody can take it.
    pub fn emit(&self, event: EnrollmentEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }

    /// Publish a caller-facing status.
    pub fn publish_status(&self, status: EnrollmentStatus) {
        if let Some(sender) = &self.status {
            let _ = sender.send(status);
        }
    }

    /// Report a state transition.
    ///
    /// Terminal statuses are not published here: the session driver
    /// publishes them after the device has been released, so a terminal
    /// status is never observable while the device is still claimed.
    pub fn state_changed(&self, from: EnrollState, to: EnrollState) {
        self.emit(EnrollmentEvent::StateChanged { from, to });

        let status = to.as_status();
        if !status.is_terminal() {
            self.publish_status(status);
        }
    }
}
