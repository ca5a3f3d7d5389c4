//! The capture protocol drive loop.

use crate::{
    config::EnrollmentConfig,
    events::{EnrollmentEvent, EventSink},
    state::{EnrollState, StateMachine},
    template::{CaptureSample, EnrollmentResult, derive_template},
};
use ridgeline_core::{
    Error, TemplateId,
    constants::{MAX_TARGET_SAMPLES, MIN_TARGET_SAMPLES},
};
use ridgeline_session::DeviceSession;
use ridgeline_transport::{DeviceTransport, RawCapture};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How one protocol run ended.
#[derive(Debug)]
pub enum ProtocolOutcome {
    /// All samples accepted and the template derived.
    Complete(EnrollmentResult),

    /// Terminal failure with the causing error.
    Failed(Error),

    /// Cancellation observed; partial samples were discarded.
    Cancelled,
}

/// Drives one enrollment over a connected device session.
///
/// The protocol owns all per-enrollment capture state (accepted samples,
/// retry budget, state machine) and borrows the session for the duration of
/// the run. Cancellation is cooperative: the token is observed at the start
/// of every state transition and while waiting on capture I/O; an in-flight
/// capture is not aborted on the device, but its result is discarded.
///
/// # Examples
///
/// ```no_run
/// use ridgeline_enroll::{CaptureProtocol, EnrollmentConfig, EventSink, ProtocolOutcome};
/// use ridgeline_session::DeviceSession;
/// use ridgeline_transport::DeviceTransport;
/// use tokio_util::sync::CancellationToken;
///
/// async fn enroll<T: DeviceTransport>(
///     session: &mut DeviceSession<T>,
/// ) -> ridgeline_core::Result<()> {
///     let protocol = CaptureProtocol::new(
///         session,
///         3,
///         EnrollmentConfig::default(),
///         CancellationToken::new(),
///         EventSink::default(),
///     )?;
///
///     match protocol.run().await {
///         ProtocolOutcome::Complete(result) => {
///             println!("enrolled {} samples as {}", result.sample_count, result.template_id);
///         }
///         ProtocolOutcome::Failed(error) => eprintln!("enrollment failed: {error}"),
///         ProtocolOutcome::Cancelled => eprintln!("enrollment cancelled"),
///     }
///     Ok(())
/// }
/// ```
pub struct CaptureProtocol<'a, T: DeviceTransport> {
    session: &'a mut DeviceSession<T>,
    target: u32,
    config: EnrollmentConfig,
    machine: StateMachine,
    samples: Vec<CaptureSample>,
    pending: Option<RawCapture>,
    consecutive_failures: u32,
    cancel: CancellationToken,
    sink: EventSink,
}

impl<'a, T: DeviceTransport> CaptureProtocol<'a, T> {
    /// Create a protocol over a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidData` if the target sample count is out of
    /// bounds or the configuration is invalid.
    pub fn new(
        session: &'a mut DeviceSession<T>,
        target: u32,
        config: EnrollmentConfig,
        cancel: CancellationToken,
        sink: EventSink,
    ) -> ridgeline_core::Result<Self> {
        if !(MIN_TARGET_SAMPLES..=MAX_TARGET_SAMPLES).contains(&target) {
            return Err(Error::invalid_data(format!(
                "Target sample count must be {MIN_TARGET_SAMPLES}-{MAX_TARGET_SAMPLES}, got {target}"
            )));
        }
        config.validate()?;

        Ok(Self {
            session,
            target,
            config,
            machine: StateMachine::new(),
            samples: Vec::with_capacity(target as usize),
            pending: None,
            consecutive_failures: 0,
            cancel,
            sink,
        })
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> &EnrollState {
        self.machine.current_state()
    }

    /// Run the protocol to a terminal outcome.
    pub async fn run(mut self) -> ProtocolOutcome {
        debug!(
            session = %self.session.id(),
            target = self.target,
            threshold = self.config.quality_threshold,
            "starting capture protocol"
        );

        if let Some(outcome) = self.transition(EnrollState::Capturing) {
            return outcome;
        }

        loop {
            let state = *self.machine.current_state();
            match state {
                EnrollState::Capturing => {
                    if let Some(outcome) = self.capture_cycle().await {
                        return outcome;
                    }
                }
                EnrollState::Evaluating => {
                    if let Some(outcome) = self.evaluate_cycle() {
                        return outcome;
                    }
                }
                EnrollState::Finalizing => return self.finalize(),
                other => {
                    // The loop only ever leaves through a terminal outcome,
                    // so reaching any other state here is a protocol bug.
                    return self.failed(Error::invalid_data(format!(
                        "Protocol loop reached state {other}"
                    )));
                }
            }
        }
    }

    /// One capture attempt. Returns a terminal outcome, or `None` to keep
    /// looping.
    async fn capture_cycle(&mut self) -> Option<ProtocolOutcome> {
        let cancel = self.cancel.clone();
        let captured = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.session.capture_once() => Some(result),
        };

        // A None here means the cancel branch won: the in-flight capture
        // future was dropped and whatever the device produces is discarded.
        let Some(captured) = captured else {
            return Some(self.cancelled());
        };

        match captured {
            Ok(raw) => {
                self.pending = Some(raw);
                self.transition(EnrollState::Evaluating)
            }
            Err(Error::CaptureTimeout { duration_ms }) => {
                self.consecutive_failures += 1;
                self.sink.emit(EnrollmentEvent::CaptureTimedOut {
                    consecutive_failures: self.consecutive_failures,
                });
                debug!(
                    session = %self.session.id(),
                    failures = self.consecutive_failures,
                    "capture timed out, retrying"
                );

                if self.consecutive_failures >= self.config.max_consecutive_failures {
                    return Some(self.failed(Error::capture_timeout(duration_ms)));
                }
                // Stay in Capturing; cancellation is observed again on the
                // next select.
                None
            }
            Err(error) => Some(self.failed(error)),
        }
    }

    /// Quality-gate the pending capture. Returns a terminal outcome, or
    /// `None` to keep looping.
    fn evaluate_cycle(&mut self) -> Option<ProtocolOutcome> {
        let Some(raw) = self.pending.take() else {
            return Some(self.failed(Error::device("Evaluating without a pending capture")));
        };

        if raw.meets_threshold(self.config.quality_threshold) {
            let index = self.samples.len() as u32;
            self.sink.emit(EnrollmentEvent::SampleAccepted {
                index,
                quality: raw.quality,
            });
            debug!(
                session = %self.session.id(),
                index,
                quality = raw.quality,
                "sample accepted"
            );

            self.samples.push(CaptureSample::from_raw(index, raw));
            self.consecutive_failures = 0;

            if (self.samples.len() as u32) < self.target {
                self.transition(EnrollState::Capturing)
            } else {
                self.transition(EnrollState::Finalizing)
            }
        } else {
            self.sink.emit(EnrollmentEvent::SampleRejected {
                quality: raw.quality,
            });
            self.consecutive_failures += 1;
            debug!(
                session = %self.session.id(),
                quality = raw.quality,
                threshold = self.config.quality_threshold,
                failures = self.consecutive_failures,
                "sample rejected"
            );

            if self.consecutive_failures >= self.config.max_consecutive_failures {
                return Some(self.failed(Error::quality_threshold(self.consecutive_failures)));
            }
            self.transition(EnrollState::Capturing)
        }
    }

    /// Derive the template and complete.
    fn finalize(&mut self) -> ProtocolOutcome {
        let template = derive_template(&self.samples);
        let result = EnrollmentResult {
            template_id: TemplateId::generate(),
            template,
            sample_count: self.samples.len() as u32,
        };

        if let Some(outcome) = self.transition(EnrollState::Complete) {
            return outcome;
        }

        info!(
            session = %self.session.id(),
            template_id = %result.template_id,
            samples = result.sample_count,
            "enrollment complete"
        );
        ProtocolOutcome::Complete(result)
    }

    /// Attempt a transition, observing cancellation first.
    ///
    /// Returns a terminal outcome when the transition ends the run (the
    /// cancel flag was set, or the move was illegal), `None` otherwise.
    fn transition(&mut self, to: EnrollState) -> Option<ProtocolOutcome> {
        if self.cancel.is_cancelled() {
            return Some(self.cancelled());
        }

        match self.machine.transition_to(to) {
            Ok(transition) => {
                self.sink.state_changed(transition.from, transition.to);
                None
            }
            Err(error) => Some(self.failed(error)),
        }
    }

    /// Move to `Failed` and produce the failure outcome.
    fn failed(&mut self, error: Error) -> ProtocolOutcome {
        warn!(session = %self.session.id(), error = %error, "enrollment failed");
        if let Ok(transition) = self.machine.transition_to(EnrollState::Failed) {
            self.sink.state_changed(transition.from, transition.to);
        }
        ProtocolOutcome::Failed(error)
    }

    /// Move to `Cancelled`, discarding partial samples.
    fn cancelled(&mut self) -> ProtocolOutcome {
        debug!(session = %self.session.id(), "cancellation observed");
        self.samples.clear();
        self.pending = None;
        if let Ok(transition) = self.machine.transition_to(EnrollState::Cancelled) {
            self.sink.state_changed(transition.from, transition.to);
        }
        ProtocolOutcome::Cancelled
    }
}
