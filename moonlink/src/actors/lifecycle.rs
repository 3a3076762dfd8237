//! Activation lifecycle state machine and deactivation reasons.

use serde::{Deserialize, Serialize};

/// Lifecycle of one activation.
///
/// # State Transitions
///
/// ```text
/// Unloaded → Activating → Active → Deactivating → Unloaded
///                 ↓                      ↑
///                 └──────────────────────┘ (activation failed or lost race)
/// ```
///
/// Only `Active` accepts operations. Operations queued while `Activating`
/// wait for the transition; operations that meet `Deactivating` are
/// answered with a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    /// No in-memory instance.
    Unloaded,
    /// Loading prior state and registering in the directory.
    Activating,
    /// Processing operations.
    Active,
    /// Flushing state and unregistering.
    Deactivating,
}

impl ActivationState {
    /// Check if transition to `next` is valid.
    pub fn can_transition_to(&self, next: ActivationState) -> bool {
        use ActivationState::*;
        matches!(
            (self, next),
            (Unloaded, Activating)
                | (Activating, Active)
                | (Activating, Deactivating)
                | (Active, Deactivating)
                | (Deactivating, Unloaded)
        )
    }

    /// Check if operations may run in this state.
    pub fn can_process_messages(&self) -> bool {
        matches!(self, ActivationState::Active)
    }

    /// Check if the activation is between stable states.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ActivationState::Activating | ActivationState::Deactivating
        )
    }
}

/// Reason an activation is being deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivationReason {
    /// No operation arrived within the idle timeout.
    IdleTimeout,
    /// Explicit deactivation request.
    ExplicitRequest,
    /// The node is shutting down.
    NodeShutdown,
    /// The membership view now places the key on another node.
    OwnershipLost,
    /// Loading state or the activation hook failed.
    ActivationFailed,
    /// Another live activation registered the key first.
    ActivationRace,
}

impl DeactivationReason {
    /// Check if this reason indicates a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, DeactivationReason::ActivationFailed)
    }

    /// Whether the activation never became `Active`, so there is no
    /// state to flush.
    pub fn skips_flush(&self) -> bool {
        matches!(
            self,
            DeactivationReason::ActivationFailed | DeactivationReason::ActivationRace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_state_transitions() {
        use ActivationState::*;

        assert!(Unloaded.can_transition_to(Activating));
        assert!(Activating.can_transition_to(Active));
        assert!(Activating.can_transition_to(Deactivating));
        assert!(Active.can_transition_to(Deactivating));
        assert!(Deactivating.can_transition_to(Unloaded));

        assert!(!Unloaded.can_transition_to(Active));
        assert!(!Active.can_transition_to(Activating));
        assert!(!Deactivating.can_transition_to(Active));
        assert!(!Active.can_transition_to(Unloaded));
    }

    #[test]
    fn test_only_active_processes() {
        use ActivationState::*;

        assert!(!Unloaded.can_process_messages());
        assert!(!Activating.can_process_messages());
        assert!(Active.can_process_messages());
        assert!(!Deactivating.can_process_messages());
    }

    #[test]
    fn test_transitioning_states() {
        use ActivationState::*;

        assert!(Activating.is_transitioning());
        assert!(Deactivating.is_transitioning());
        assert!(!Active.is_transitioning());
        assert!(!Unloaded.is_transitioning());
    }

    #[test]
    fn test_deactivation_reason_flags() {
        use DeactivationReason::*;

        assert!(ActivationFailed.is_failure());
        assert!(!IdleTimeout.is_failure());
        assert!(ActivationRace.skips_flush());
        assert!(!NodeShutdown.skips_flush());
        assert!(!OwnershipLost.skips_flush());
    }
}
