//! Caller-side handle for one enrollment.

use ridgeline_core::{EnrollmentStatus, RequestId};
use ridgeline_enroll::EnrollmentEvent;
use tokio::sync::{mpsc, watch};

/// Handle returned by `start_enrollment`.
///
/// The handle observes one enrollment: its coarse status through a watch
/// channel and its fine-grained progress through an event stream. Dropping
/// the handle does not cancel the enrollment; cancellation goes through the
/// coordinator.
#[derive(Debug)]
pub struct EnrollmentHandle {
    request_id: RequestId,
    status_rx: watch::Receiver<EnrollmentStatus>,
    event_rx: mpsc::Receiver<EnrollmentEvent>,
}

impl EnrollmentHandle {
    pub(crate) fn new(
        request_id: RequestId,
        status_rx: watch::Receiver<EnrollmentStatus>,
        event_rx: mpsc::Receiver<EnrollmentEvent>,
    ) -> Self {
        Self {
            request_id,
            status_rx,
            event_rx,
        }
    }

    /// The request this handle observes.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        *self.status_rx.borrow()
    }

    /// Wait until the enrollment reaches a terminal status and return it.
    pub async fn wait_terminal(&mut self) -> EnrollmentStatus {
        loop {
            let status = *self.status_rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if self.status_rx.changed().await.is_err() {
                // Driver gone; the last published status is all there is.
                return *self.status_rx.borrow();
            }
        }
    }

    /// Receive the next progress event.
    ///
    /// Returns `None` once the driver has finished and the buffered events
    /// are drained. Events are advisory and may be dropped if this handle
    /// falls far behind.
    pub async fn next_event(&mut self) -> Option<EnrollmentEvent> {
        self.event_rx.recv().await
    }

    /// Drain whatever events are buffered right now without waiting.
    pub fn drain_events(&mut self) -> Vec<EnrollmentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}
