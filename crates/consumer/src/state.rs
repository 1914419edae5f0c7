//! Consumer runtime state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a consumer runtime.
///
/// State transitions:
/// ```text
/// Created ──► Subscribing ──► Consuming ◄──► Rebalancing
///                                 │
///                                 ▼
///                           ShuttingDown ──► Closed ──► Subscribing
/// ```
/// `Subscribing` and `Rebalancing` may also go straight to `ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RuntimeState {
    /// Built but never run.
    #[default]
    Created,

    /// Joining the consumer group for the first time in this run.
    Subscribing,

    /// Holding a partition assignment and processing messages.
    Consuming,

    /// The previous assignment was revoked; rejoining the group.
    Rebalancing,

    /// Cancellation observed; draining in-flight work and leaving the group.
    ShuttingDown,

    /// Left the group. The runtime may be run again.
    Closed,
}

impl RuntimeState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: RuntimeState) -> bool {
        use RuntimeState::*;
        matches!(
            (self, next),
            (Created, Subscribing)
                | (Closed, Subscribing)
                | (Subscribing, Consuming)
                | (Subscribing, ShuttingDown)
                | (Consuming, Rebalancing)
                | (Consuming, ShuttingDown)
                | (Rebalancing, Consuming)
                | (Rebalancing, ShuttingDown)
                | (ShuttingDown, Closed)
        )
    }

    /// Returns true if `run` may be called in this state.
    pub fn can_start(&self) -> bool {
        matches!(self, RuntimeState::Created | RuntimeState::Closed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeState::Created => "Created",
            RuntimeState::Subscribing => "Subscribing",
            RuntimeState::Consuming => "Consuming",
            RuntimeState::Rebalancing => "Rebalancing",
            RuntimeState::ShuttingDown => "ShuttingDown",
            RuntimeState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuntimeState::*;

    const ALL: [RuntimeState; 6] = [
        Created,
        Subscribing,
        Consuming,
        Rebalancing,
        ShuttingDown,
        Closed,
    ];

    #[test]
    fn test_default_state_is_created() {
        assert_eq!(RuntimeState::default(), Created);
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(Created.can_transition_to(Subscribing));
        assert!(Subscribing.can_transition_to(Consuming));
        assert!(Consuming.can_transition_to(Rebalancing));
        assert!(Rebalancing.can_transition_to(Consuming));
        assert!(Consuming.can_transition_to(ShuttingDown));
        assert!(ShuttingDown.can_transition_to(Closed));
    }

    #[test]
    fn test_restart_from_closed() {
        assert!(Closed.can_transition_to(Subscribing));
        assert!(Closed.can_start());
        assert!(Created.can_start());
        assert!(!Consuming.can_start());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Created.can_transition_to(Consuming));
        assert!(!Consuming.can_transition_to(Subscribing));
        assert!(!ShuttingDown.can_transition_to(Consuming));
        assert!(!Closed.can_transition_to(Consuming));
        for state in ALL {
            assert!(!state.can_transition_to(Created));
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_every_state_can_reach_closed() {
        for state in [Subscribing, Consuming, Rebalancing] {
            assert!(state.can_transition_to(ShuttingDown));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Rebalancing.to_string(), "Rebalancing");
        assert_eq!(ShuttingDown.to_string(), "ShuttingDown");
    }
}
