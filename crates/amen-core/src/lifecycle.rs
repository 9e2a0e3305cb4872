//! Intent lifecycle state machine.
//!
//! All state changes of an [`Intent`](crate::Intent) go through [`next_state`].
//!
//! | From                               | Event                | To       |
//! |------------------------------------|----------------------|----------|
//! | Draft, Planned, Approved, Failed   | `PlanAccepted`       | Planned  |
//! | Draft, Planned, Approved, Failed   | `PlanBlocked`        | Draft    |
//! | Draft, Planned, Approved, Failed   | `Iterated`           | Draft    |
//! | Planned                            | `Approved`           | Approved |
//! | Approved                           | `ExecutionSucceeded` | Executed |
//! | Approved                           | `ExecutionFailed`    | Failed   |
//!
//! Every other pair is rejected. `Executed` is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Draft,
    Planned,
    Approved,
    Executed,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Planned => write!(f, "planned"),
            Self::Approved => write!(f, "approved"),
            Self::Executed => write!(f, "executed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A plan without Error diagnostics was recorded.
    PlanAccepted,
    /// A plan with at least one Error diagnostic was recorded.
    PlanBlocked,
    /// An iteration diff was applied.
    Iterated,
    /// The AMEN gate granted approval.
    Approved,
    ExecutionSucceeded,
    ExecutionFailed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanAccepted => write!(f, "plan_accepted"),
            Self::PlanBlocked => write!(f, "plan_blocked"),
            Self::Iterated => write!(f, "iterated"),
            Self::Approved => write!(f, "approved"),
            Self::ExecutionSucceeded => write!(f, "execution_succeeded"),
            Self::ExecutionFailed => write!(f, "execution_failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply '{event}' to an intent in state '{from}'")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub event: LifecycleEvent,
}

/// Compute the state reached by applying `event` in state `from`.
pub fn next_state(
    from: LifecycleState,
    event: LifecycleEvent,
) -> Result<LifecycleState, TransitionError> {
    use LifecycleEvent as E;
    use LifecycleState as S;

    match (from, event) {
        (S::Draft | S::Planned | S::Approved | S::Failed, E::PlanAccepted) => Ok(S::Planned),
        (S::Draft | S::Planned | S::Approved | S::Failed, E::PlanBlocked) => Ok(S::Draft),
        (S::Draft | S::Planned | S::Approved | S::Failed, E::Iterated) => Ok(S::Draft),
        (S::Planned, E::Approved) => Ok(S::Approved),
        (S::Approved, E::ExecutionSucceeded) => Ok(S::Executed),
        (S::Approved, E::ExecutionFailed) => Ok(S::Failed),

        (S::Draft | S::Approved | S::Failed, E::Approved)
        | (S::Draft | S::Planned | S::Failed, E::ExecutionSucceeded | E::ExecutionFailed)
        | (
            S::Executed,
            E::PlanAccepted
            | E::PlanBlocked
            | E::Iterated
            | E::Approved
            | E::ExecutionSucceeded
            | E::ExecutionFailed,
        ) => Err(TransitionError { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    const STATES: [S; 5] = [S::Draft, S::Planned, S::Approved, S::Executed, S::Failed];
    const EVENTS: [E; 6] = [
        E::PlanAccepted,
        E::PlanBlocked,
        E::Iterated,
        E::Approved,
        E::ExecutionSucceeded,
        E::ExecutionFailed,
    ];

    #[test]
    fn happy_path() {
        let s = next_state(S::Draft, E::PlanAccepted).unwrap();
        let s = next_state(s, E::Approved).unwrap();
        assert_eq!(next_state(s, E::ExecutionSucceeded).unwrap(), S::Executed);
        assert_eq!(next_state(s, E::ExecutionFailed).unwrap(), S::Failed);
    }

    #[test]
    fn executed_is_terminal() {
        for event in EVENTS {
            assert!(next_state(S::Executed, event).is_err(), "{}", event);
        }
    }

    #[test]
    fn approval_requires_planned() {
        for state in STATES {
            let result = next_state(state, E::Approved);
            assert_eq!(result.is_ok(), state == S::Planned, "{}", state);
        }
    }

    #[test]
    fn execution_requires_approved() {
        for state in STATES {
            for event in [E::ExecutionSucceeded, E::ExecutionFailed] {
                assert_eq!(
                    next_state(state, event).is_ok(),
                    state == S::Approved,
                    "{} {}",
                    state,
                    event
                );
            }
        }
    }

    #[test]
    fn iteration_from_any_non_terminal_state_lands_in_draft() {
        for state in [S::Draft, S::Planned, S::Approved, S::Failed] {
            assert_eq!(next_state(state, E::Iterated).unwrap(), S::Draft);
            assert_eq!(next_state(state, E::PlanBlocked).unwrap(), S::Draft);
            assert_eq!(next_state(state, E::PlanAccepted).unwrap(), S::Planned);
        }
    }

    #[test]
    fn error_names_the_pair() {
        let err = next_state(S::Draft, E::Approved).unwrap_err();
        assert_eq!(err.to_string(), "cannot apply 'approved' to an intent in state 'draft'");
    }
}
