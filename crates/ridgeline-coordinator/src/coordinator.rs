//! The enrollment coordinator and its per-request driver tasks.
//!
//! # Architecture
//!
//! ```text
//! start_enrollment ──► claim device ──► spawn driver task
//!                                            │
//!                        DeviceSession ◄─────┤ connect / capture
//!                        CaptureProtocol ◄───┤ drive state machine
//!                                            │
//!     EnrollmentHandle ◄── events ───────────┤
//!     status()/get_result() ◄── record ──────┘
//! ```
//!
//! Each enrollment gets exactly one driver task, which owns the device
//! session and performs every mutation of that enrollment's record. The
//! coordinator itself only does synchronous bookkeeping: validation,
//! duplicate detection, claim acquisition, and map maintenance.

use crate::handle::EnrollmentHandle;
use ridgeline_core::{
    DeviceAddress, EnrollmentStatus, Error, ErrorKind, RequestId, Result,
    constants::{MAX_TARGET_SAMPLES, MIN_TARGET_SAMPLES},
};
use ridgeline_enroll::{
    CaptureProtocol, EnrollmentConfig, EnrollmentEvent, EnrollmentResult, EventSink,
    ProtocolOutcome,
};
use ridgeline_session::{ClaimRegistry, DeviceClaim, DeviceSession};
use ridgeline_transport::{DeviceTransport, TransportFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of each enrollment's progress event channel.
///
/// A full three-sample enrollment with a handful of retries emits well
/// under this many events; overflow drops events rather than blocking the
/// protocol.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Terminal bookkeeping for one enrollment.
#[derive(Debug, Default)]
struct EnrollmentRecord {
    /// Failure reason, set before the status becomes `Failed`.
    failure: Option<ErrorKind>,

    /// Result, set before the status becomes `Complete`.
    result: Option<EnrollmentResult>,
}

type SharedRecord = Arc<RwLock<EnrollmentRecord>>;

/// Coordinator-side view of one request.
#[derive(Debug)]
struct RequestEntry {
    record: SharedRecord,
    status_rx: watch::Receiver<EnrollmentStatus>,
    cancel: CancellationToken,
}

/// Public-facing orchestrator for concurrent enrollments.
///
/// # Request Lifecycle
///
/// 1. `start_enrollment()` validates synchronously, claims the device, and
///    spawns a driver task
/// 2. The caller observes progress through the returned handle or by
///    polling `status()`
/// 3. On a terminal transition the driver releases the device *before*
///    publishing the terminal status
/// 4. Terminal records stay queryable until `remove()`
///
/// # Thread Safety
///
/// The coordinator is cheap to share: all methods take `&self` and the
/// internal maps are behind locks held only for bookkeeping.
pub struct EnrollmentCoordinator<F: TransportFactory> {
    factory: Arc<F>,
    claims: ClaimRegistry,
    config: EnrollmentConfig,
    requests: Arc<Mutex<HashMap<RequestId, RequestEntry>>>,
}

impl<F: TransportFactory + 'static> EnrollmentCoordinator<F> {
    /// Create a coordinator with the default configuration.
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, EnrollmentConfig::default())
    }

    /// Create a coordinator with a custom configuration.
    pub fn with_config(factory: F, config: EnrollmentConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            claims: ClaimRegistry::new(),
            config,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start an enrollment and return immediately with a handle.
    ///
    /// Validation, duplicate detection, and the device claim all happen
    /// synchronously; everything that can wait (connect, capture) runs on
    /// the spawned driver task and is observed asynchronously.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `target_sample_count` is out of bounds or the coordinator
    ///   configuration is invalid (`InvalidData`)
    /// - the request id is already retained, active or terminal
    ///   (`DuplicateRequest`)
    /// - the device is claimed by another enrollment (`DeviceBusy`)
    pub fn start_enrollment(
        &self,
        request_id: RequestId,
        device_address: DeviceAddress,
        target_sample_count: u32,
    ) -> Result<EnrollmentHandle> {
        if !(MIN_TARGET_SAMPLES..=MAX_TARGET_SAMPLES).contains(&target_sample_count) {
            return Err(Error::invalid_data(format!(
                "Target sample count must be {MIN_TARGET_SAMPLES}-{MAX_TARGET_SAMPLES}, got {target_sample_count}"
            )));
        }
        self.config.validate()?;

        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());

        if requests.contains_key(&request_id) {
            return Err(Error::duplicate_request(request_id.as_str()));
        }

        let claim = self.claims.claim(&device_address)?;

        let (status_tx, status_rx) = watch::channel(EnrollmentStatus::Pending);
        let status_tx = Arc::new(status_tx);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let record: SharedRecord = Arc::default();
        let cancel = CancellationToken::new();

        info!(
            request = %request_id,
            address = %device_address,
            target = target_sample_count,
            "enrollment started"
        );

        let driver = SessionDriver {
            request_id: request_id.clone(),
            transport: self.factory.open(),
            address: device_address,
            claim,
            target: target_sample_count,
            config: self.config,
            record: Arc::clone(&record),
            status: Arc::clone(&status_tx),
            events: event_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        requests.insert(
            request_id.clone(),
            RequestEntry {
                record,
                status_rx: status_rx.clone(),
                cancel,
            },
        );

        Ok(EnrollmentHandle::new(request_id, status_rx, event_rx))
    }

    /// Signal cancellation to an active enrollment.
    ///
    /// Cancellation is cooperative: the driver observes the flag at its
    /// next transition boundary and discards any in-flight capture result.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the request id is unknown or the
    /// enrollment is already terminal.
    pub fn cancel_enrollment(&self, request_id: &RequestId) -> Result<()> {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let entry = requests
            .get(request_id)
            .ok_or_else(|| Error::not_found(request_id.as_str()))?;

        if entry.status_rx.borrow().is_terminal() {
            return Err(Error::not_found(request_id.as_str()));
        }

        debug!(request = %request_id, "cancellation requested");
        entry.cancel.cancel();
        Ok(())
    }

    /// Fetch the result of a completed enrollment.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotReady` while the enrollment is in progress and
    /// `Error::NotFound` if the request id is unknown or the enrollment
    /// failed or was cancelled. For failed enrollments the recorded reason
    /// is surfaced through [`status`](Self::status).
    pub fn get_result(&self, request_id: &RequestId) -> Result<EnrollmentResult> {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let entry = requests
            .get(request_id)
            .ok_or_else(|| Error::not_found(request_id.as_str()))?;

        match *entry.status_rx.borrow() {
            EnrollmentStatus::Complete => entry
                .record
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .result
                .clone()
                .ok_or_else(|| Error::not_found(request_id.as_str())),
            EnrollmentStatus::Pending
            | EnrollmentStatus::Capturing
            | EnrollmentStatus::Finalizing => Err(Error::not_ready(request_id.as_str())),
            EnrollmentStatus::Failed | EnrollmentStatus::Cancelled => {
                Err(Error::not_found(request_id.as_str()))
            }
        }
    }

    /// Current status of a request, with the failure reason when `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the request id is unknown.
    pub fn status(&self, request_id: &RequestId) -> Result<(EnrollmentStatus, Option<ErrorKind>)> {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let entry = requests
            .get(request_id)
            .ok_or_else(|| Error::not_found(request_id.as_str()))?;

        let status = *entry.status_rx.borrow();
        let failure = if status == EnrollmentStatus::Failed {
            entry
                .record
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .failure
        } else {
            None
        };

        Ok((status, failure))
    }

    /// Drop a terminal request record, freeing its id for reuse.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the request id is unknown and
    /// `Error::NotReady` if the enrollment has not reached a terminal
    /// state.
    pub fn remove(&self, request_id: &RequestId) -> Result<()> {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let entry = requests
            .get(request_id)
            .ok_or_else(|| Error::not_found(request_id.as_str()))?;

        if !entry.status_rx.borrow().is_terminal() {
            return Err(Error::not_ready(request_id.as_str()));
        }

        requests.remove(request_id);
        Ok(())
    }

    /// Number of enrollments that have not yet reached a terminal state.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|entry| !entry.status_rx.borrow().is_terminal())
            .count()
    }

    /// Signal cancellation to every active enrollment.
    ///
    /// Cancelling an already-terminal enrollment is a no-op, so this is
    /// safe to call during shutdown regardless of what is running.
    pub fn cancel_all(&self) {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        for (request_id, entry) in requests.iter() {
            if !entry.status_rx.borrow().is_terminal() {
                debug!(request = %request_id, "cancelling on shutdown");
                entry.cancel.cancel();
            }
        }
    }
}

/// Owns one enrollment from connect to terminal publication.
struct SessionDriver<T: DeviceTransport> {
    request_id: RequestId,
    transport: T,
    address: DeviceAddress,
    claim: DeviceClaim,
    target: u32,
    config: EnrollmentConfig,
    record: SharedRecord,
    status: Arc<watch::Sender<EnrollmentStatus>>,
    events: mpsc::Sender<EnrollmentEvent>,
    cancel: CancellationToken,
}

impl<T: DeviceTransport> SessionDriver<T> {
    async fn run(self) {
        let sink = EventSink::new(self.events.clone(), Arc::clone(&self.status));

        let session = DeviceSession::new(
            self.transport,
            self.address.clone(),
            self.claim,
            self.config.session_config(),
        );
        let mut session = match session {
            Ok(session) => session,
            Err(error) => {
                Self::finish_failed(&self.request_id, &self.record, &sink, &error);
                return;
            }
        };

        // Connect, racing the cancel flag so a caller can abandon a slow
        // device before it ever answers.
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = session.connect() => Some(result),
        };
        let Some(connect_result) = connected else {
            session.disconnect().await;
            Self::finish_cancelled(&self.request_id, &sink);
            return;
        };
        if let Err(error) = connect_result {
            // The session released the claim when the connect failed.
            Self::finish_failed(&self.request_id, &self.record, &sink, &error);
            return;
        }

        let protocol = CaptureProtocol::new(
            &mut session,
            self.target,
            self.config,
            self.cancel.clone(),
            sink.clone(),
        );
        let protocol = match protocol {
            Ok(protocol) => protocol,
            Err(error) => {
                session.disconnect().await;
                Self::finish_failed(&self.request_id, &self.record, &sink, &error);
                return;
            }
        };

        let outcome = protocol.run().await;

        // Release the device before the terminal status is observable, so
        // a caller that sees Cancelled/Complete can immediately reconnect.
        session.disconnect().await;

        match outcome {
            ProtocolOutcome::Complete(result) => {
                let sample_count = result.sample_count;
                self.record
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .result = Some(result);
                // Queue the event before the status flips, so a caller woken
                // by the terminal status sees the full event history.
                sink.emit(EnrollmentEvent::Completed { sample_count });
                sink.publish_status(EnrollmentStatus::Complete);
                info!(request = %self.request_id, samples = sample_count, "enrollment delivered");
            }
            ProtocolOutcome::Failed(error) => {
                Self::finish_failed(&self.request_id, &self.record, &sink, &error);
            }
            ProtocolOutcome::Cancelled => {
                Self::finish_cancelled(&self.request_id, &sink);
            }
        }
    }

    fn finish_failed(request_id: &RequestId, record: &SharedRecord, sink: &EventSink, error: &Error) {
        // Anything without a kind is an internal invariant breach; report
        // it as a device-level fault rather than losing the failure.
        let kind = error.kind().unwrap_or(ErrorKind::DeviceError);
        warn!(request = %request_id, error = %error, "enrollment failed");

        record.write().unwrap_or_else(|e| e.into_inner()).failure = Some(kind);
        sink.emit(EnrollmentEvent::Failed { kind });
        sink.publish_status(EnrollmentStatus::Failed);
    }

    fn finish_cancelled(request_id: &RequestId, sink: &EventSink) {
        info!(request = %request_id, "enrollment cancelled");
        sink.emit(EnrollmentEvent::Cancelled);
        sink.publish_status(EnrollmentStatus::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_transport::MockTransportFactory;

    fn request(id: &str) -> RequestId {
        RequestId::new(id).unwrap()
    }

    fn device(address: &str) -> DeviceAddress {
        DeviceAddress::new(address).unwrap()
    }

    #[tokio::test]
    async fn test_target_bounds_checked_synchronously() {
        let (factory, _handle) = MockTransportFactory::new();
        let coordinator = EnrollmentCoordinator::new(factory);

        let zero = coordinator.start_enrollment(request("req-1"), device("dev-0"), 0);
        assert!(matches!(zero, Err(Error::InvalidData { .. })));

        let huge =
            coordinator.start_enrollment(request("req-1"), device("dev-0"), MAX_TARGET_SAMPLES + 1);
        assert!(matches!(huge, Err(Error::InvalidData { .. })));

        // Nothing was registered or claimed by the failed attempts.
        assert_eq!(coordinator.active_count(), 0);
        let ok = coordinator.start_enrollment(request("req-1"), device("dev-0"), 1);
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected_while_active() {
        let (factory, _handle) = MockTransportFactory::new();
        let coordinator = EnrollmentCoordinator::new(factory);

        let _handle1 = coordinator
            .start_enrollment(request("req-1"), device("dev-0"), 3)
            .unwrap();

        let second = coordinator.start_enrollment(request("req-1"), device("dev-1"), 3);
        assert!(matches!(second, Err(Error::DuplicateRequest { .. })));
    }

    #[tokio::test]
    async fn test_second_enrollment_on_same_device_is_busy() {
        let (factory, _handle) = MockTransportFactory::new();
        let coordinator = EnrollmentCoordinator::new(factory);

        let _handle1 = coordinator
            .start_enrollment(request("req-1"), device("dev-0"), 3)
            .unwrap();

        let second = coordinator.start_enrollment(request("req-2"), device("dev-0"), 3);
        assert!(matches!(second, Err(Error::DeviceBusy { .. })));
    }

    #[tokio::test]
    async fn test_unknown_request_queries() {
        let (factory, _handle) = MockTransportFactory::new();
        let coordinator = EnrollmentCoordinator::new(factory);
        let unknown = request("nope");

        assert!(matches!(
            coordinator.status(&unknown),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            coordinator.get_result(&unknown),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            coordinator.cancel_enrollment(&unknown),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            coordinator.remove(&unknown),
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_result_not_ready_while_capturing() {
        let (factory, _handle) = MockTransportFactory::new();
        let coordinator = EnrollmentCoordinator::new(factory);
        let id = request("req-1");

        // No captures queued: the enrollment waits on the device.
        let _handle1 = coordinator
            .start_enrollment(id.clone(), device("dev-0"), 3)
            .unwrap();

        assert!(matches!(
            coordinator.get_result(&id),
            Err(Error::NotReady { .. })
        ));
        assert!(matches!(
            coordinator.remove(&id),
            Err(Error::NotReady { .. })
        ));
    }
}
