// Generation run state machine with validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase of a single generation run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Classifying,
    Templating,
    Chatting,
    Generating,
    Validating,
    Repairing,
    Complete,
    Error,
}

#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Invalid generation transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: GenerationState,
        to: GenerationState,
    },

    #[error("Generation already in terminal state: {0:?}")]
    AlreadyTerminal(GenerationState),
}

/// Validates if a run can move from one state to another
pub fn can_transition(from: GenerationState, to: GenerationState) -> bool {
    use GenerationState::*;

    match (from, to) {
        // Any live state can fail
        (from, Error) => !is_terminal_state(from),

        (Classifying, Templating) => true,
        (Classifying, Chatting) => true,
        (Classifying, Generating) => true,

        // Templates and chat answers skip validation
        (Templating, Complete) => true,
        (Chatting, Complete) => true,

        (Generating, Validating) => true,
        (Validating, Repairing) => true,
        (Repairing, Complete) => true,

        _ => false,
    }
}

/// Validates and performs a state transition
pub fn transition_state(
    current: GenerationState,
    target: GenerationState,
) -> Result<GenerationState, StateTransitionError> {
    if is_terminal_state(current) {
        return Err(StateTransitionError::AlreadyTerminal(current));
    }
    if !can_transition(current, target) {
        return Err(StateTransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

/// Check if a state ends the run
pub fn is_terminal_state(state: GenerationState) -> bool {
    matches!(state, GenerationState::Complete | GenerationState::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use GenerationState::*;

    #[test]
    fn test_generation_path() {
        let mut state = Classifying;
        for next in [Generating, Validating, Repairing, Complete] {
            state = transition_state(state, next).unwrap();
        }
        assert_eq!(state, Complete);
    }

    #[test]
    fn test_template_and_chat_paths() {
        assert!(can_transition(Classifying, Templating));
        assert!(can_transition(Templating, Complete));
        assert!(can_transition(Classifying, Chatting));
        assert!(can_transition(Chatting, Complete));
    }

    #[test]
    fn test_error_reachable_from_live_states() {
        for state in [Classifying, Templating, Chatting, Generating, Validating, Repairing] {
            assert!(can_transition(state, Error), "{:?} -> Error", state);
        }
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        assert!(matches!(
            transition_state(Complete, Error),
            Err(StateTransitionError::AlreadyTerminal(Complete))
        ));
        assert!(matches!(
            transition_state(Error, Classifying),
            Err(StateTransitionError::AlreadyTerminal(Error))
        ));
    }

    #[test]
    fn test_cannot_skip_validation() {
        assert!(!can_transition(Generating, Complete));
        assert!(!can_transition(Generating, Repairing));
        let result = transition_state(Classifying, Validating);
        assert!(matches!(
            result,
            Err(StateTransitionError::InvalidTransition { .. })
        ));
    }
}
