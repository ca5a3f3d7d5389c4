//! Enrollment protocol states and the validated transition machine.

use ridgeline_core::{EnrollmentStatus, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Maximum number of state transitions to keep in history.
///
/// A full successful three-sample enrollment produces around a dozen
/// transitions; the cap bounds memory on pathological retry loops while
/// keeping enough context to reconstruct a failed run.
const MAX_HISTORY_SIZE: usize = 64;

/// States of the capture protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollState {
    /// Created, not yet capturing.
    Idle,

    /// One raw capture requested from the bound device session.
    Capturing,

    /// Quality-gating the capture just received.
    Evaluating,

    /// All samples accepted; deriving the template.
    Finalizing,

    /// Template derived and result produced.
    Complete,

    /// Terminal failure; the error kind is recorded by the owner.
    Failed,

    /// Cancelled by the caller; partial samples discarded.
    Cancelled,
}

impl EnrollState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use ridgeline_enroll::EnrollState;
    ///
    /// assert!(EnrollState::Idle.can_transition_to(&EnrollState::Capturing));
    /// assert!(!EnrollState::Idle.can_transition_to(&EnrollState::Finalizing));
    /// ```
    #[must_use]
    pub fn can_transition_to(&self, target: &EnrollState) -> bool {
        // Cancellation is legal from any non-terminal state.
        if *target == EnrollState::Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (EnrollState::Idle, EnrollState::Capturing)
                | (EnrollState::Capturing, EnrollState::Evaluating | EnrollState::Failed)
                | (
                    EnrollState::Evaluating,
                    EnrollState::Capturing | EnrollState::Finalizing | EnrollState::Failed
                )
                | (EnrollState::Finalizing, EnrollState::Complete | EnrollState::Failed)
        )
    }

    /// Returns `true` for states that end the protocol.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnrollState::Complete | EnrollState::Failed | EnrollState::Cancelled
        )
    }

    /// Map this protocol state to the caller-facing enrollment status.
    ///
    /// `Capturing` and `Evaluating` are internal phases of the same
    /// observable activity and both map to `Capturing`.
    #[must_use]
    pub fn as_status(&self) -> EnrollmentStatus {
        match self {
            EnrollState::Idle => EnrollmentStatus::Pending,
            EnrollState::Capturing | EnrollState::Evaluating => EnrollmentStatus::Capturing,
            EnrollState::Finalizing => EnrollmentStatus::Finalizing,
            EnrollState::Complete => EnrollmentStatus::Complete,
            EnrollState::Failed => EnrollmentStatus::Failed,
            EnrollState::Cancelled => EnrollmentStatus::Cancelled,
        }
    }
}

impl fmt::Display for EnrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            EnrollState::Idle => "Idle",
            EnrollState::Capturing => "Capturing",
            EnrollState::Evaluating => "Evaluating",
            EnrollState::Finalizing => "Finalizing",
            EnrollState::Complete => "Complete",
            EnrollState::Failed => "Failed",
            EnrollState::Cancelled => "Cancelled",
        };
        write!(f, "{}", state)
    }
}

/// One recorded state transition.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: EnrollState,

    /// The state transitioned to.
    pub to: EnrollState,

    /// When the transition occurred.
    pub timestamp: Instant,
}

impl StateTransition {
    fn new(from: EnrollState, to: EnrollState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Elapsed time since this transition occurred.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine enforcing the valid protocol transitions.
///
/// Not thread-safe by design: one machine belongs to one protocol driver.
///
/// # Examples
///
/// ```
/// use ridgeline_enroll::{EnrollState, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.transition_to(EnrollState::Capturing).unwrap();
/// assert_eq!(machine.current_state(), &EnrollState::Capturing);
///
/// assert!(machine.transition_to(EnrollState::Complete).is_err());
/// ```
#[derive(Debug)]
pub struct StateMachine {
    current_state: EnrollState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new machine in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_state: EnrollState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Current state of the machine.
    #[must_use]
    pub fn current_state(&self) -> &EnrollState {
        &self.current_state
    }

    /// Time elapsed in the current state.
    #[must_use]
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recorded transitions, oldest first, capped at a fixed size.
    #[must_use]
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to `new_state`, validating the move.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the move is not legal
    /// from the current state.
    pub fn transition_to(&mut self, new_state: EnrollState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);

        self.current_state = new_state;
        self.state_entered_at = Instant::now();

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.current_state(), &EnrollState::Idle);
        assert_eq!(machine.history().len(), 0);
    }

    #[test]
    fn test_successful_enrollment_path() {
        let mut machine = StateMachine::new();

        machine.transition_to(EnrollState::Capturing).unwrap();
        machine.transition_to(EnrollState::Evaluating).unwrap();
        machine.transition_to(EnrollState::Capturing).unwrap();
        machine.transition_to(EnrollState::Evaluating).unwrap();
        machine.transition_to(EnrollState::Finalizing).unwrap();
        machine.transition_to(EnrollState::Complete).unwrap();

        assert_eq!(machine.current_state(), &EnrollState::Complete);
        assert_eq!(machine.history().len(), 6);
    }

    #[test]
    fn test_failure_paths() {
        let mut machine = StateMachine::new();
        machine.transition_to(EnrollState::Capturing).unwrap();
        machine.transition_to(EnrollState::Failed).unwrap();
        assert_eq!(machine.current_state(), &EnrollState::Failed);

        let mut machine = StateMachine::new();
        machine.transition_to(EnrollState::Capturing).unwrap();
        machine.transition_to(EnrollState::Evaluating).unwrap();
        machine.transition_to(EnrollState::Failed).unwrap();

        let mut machine = StateMachine::new();
        machine.transition_to(EnrollState::Capturing).unwrap();
        machine.transition_to(EnrollState::Evaluating).unwrap();
        machine.transition_to(EnrollState::Finalizing).unwrap();
        machine.transition_to(EnrollState::Failed).unwrap();
    }

    #[test]
    fn test_cancelled_from_every_non_terminal_state() {
        for setup in [
            vec![],
            vec![EnrollState::Capturing],
            vec![EnrollState::Capturing, EnrollState::Evaluating],
            vec![
                EnrollState::Capturing,
                EnrollState::Evaluating,
                EnrollState::Finalizing,
            ],
        ] {
            let mut machine = StateMachine::new();
            for state in setup {
                machine.transition_to(state).unwrap();
            }
            machine.transition_to(EnrollState::Cancelled).unwrap();
            assert_eq!(machine.current_state(), &EnrollState::Cancelled);
        }
    }

    #[test]
    fn test_terminal_states_allow_nothing() {
        for terminal in [
            EnrollState::Complete,
            EnrollState::Failed,
            EnrollState::Cancelled,
        ] {
            for target in [
                EnrollState::Idle,
                EnrollState::Capturing,
                EnrollState::Evaluating,
                EnrollState::Finalizing,
                EnrollState::Complete,
                EnrollState::Failed,
                EnrollState::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(&target),
                    "{terminal} -> {target} should be invalid"
                );
            }
        }
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut machine = StateMachine::new();

        let result = machine.transition_to(EnrollState::Evaluating);
        assert!(result.is_err());
        assert_eq!(machine.current_state(), &EnrollState::Idle);

        assert!(!EnrollState::Idle.can_transition_to(&EnrollState::Finalizing));
        assert!(!EnrollState::Capturing.can_transition_to(&EnrollState::Finalizing));
        assert!(!EnrollState::Capturing.can_transition_to(&EnrollState::Capturing));
        assert!(!EnrollState::Finalizing.can_transition_to(&EnrollState::Capturing));
    }

    #[test]
    fn test_transition_record() {
        let mut machine = StateMachine::new();
        let transition = machine.transition_to(EnrollState::Capturing).unwrap();

        assert_eq!(transition.from, EnrollState::Idle);
        assert_eq!(transition.to, EnrollState::Capturing);
    }

    #[test]
    fn test_history_size_limit() {
        let mut machine = StateMachine::new();
        machine.transition_to(EnrollState::Capturing).unwrap();

        // Bounce between Capturing and Evaluating far past the cap.
        for _ in 0..100 {
            machine.transition_to(EnrollState::Evaluating).unwrap();
            machine.transition_to(EnrollState::Capturing).unwrap();
        }

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_status_mapping() {
        use ridgeline_core::EnrollmentStatus;

        assert_eq!(EnrollState::Idle.as_status(), EnrollmentStatus::Pending);
        assert_eq!(
            EnrollState::Capturing.as_status(),
            EnrollmentStatus::Capturing
        );
        assert_eq!(
            EnrollState::Evaluating.as_status(),
            EnrollmentStatus::Capturing
        );
        assert_eq!(
            EnrollState::Finalizing.as_status(),
            EnrollmentStatus::Finalizing
        );
        assert_eq!(
            EnrollState::Complete.as_status(),
            EnrollmentStatus::Complete
        );
        assert_eq!(EnrollState::Failed.as_status(), EnrollmentStatus::Failed);
        assert_eq!(
            EnrollState::Cancelled.as_status(),
            EnrollmentStatus::Cancelled
        );
    }

    #[test]
    fn test_state_serialization() {
        let serialized = serde_json::to_string(&EnrollState::Evaluating).unwrap();
        assert_eq!(serialized, "\"evaluating\"");

        let deserialized: EnrollState = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, EnrollState::Evaluating);
    }
}
