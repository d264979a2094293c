use crate::error::SourceError;

/// Lifecycle of one materialized stream
///
/// Transitions only move forward:
/// `Active -> Draining -> Completed`, `Active -> Completed` (immediate
/// completion), and `Active | Draining -> Failed`.
#[derive(Debug, Clone)]
pub enum StreamState {
    /// Accepting sends; the pump may withdraw
    Active,
    /// No further sends; buffered elements are still flushed
    Draining,
    /// Terminal, success
    Completed,
    /// Terminal, carries the cause
    Failed(SourceError),
}

impl StreamState {
    /// Whether producers may still send
    pub fn accepts_sends(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the state can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(&self, next: &StreamState) -> bool {
        match (self, next) {
            (Self::Active, Self::Draining) => true,
            (Self::Active, Self::Completed) => true,
            (Self::Active, Self::Failed(_)) => true,
            (Self::Draining, Self::Completed) => true,
            // Cancellation may interrupt a drain
            (Self::Draining, Self::Failed(_)) => true,
            _ => false,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let active = StreamState::Active;
        assert!(active.can_transition_to(&StreamState::Draining));
        assert!(active.can_transition_to(&StreamState::Failed(SourceError::Cancelled)));
        assert!(StreamState::Draining.can_transition_to(&StreamState::Completed));
    }

    #[test]
    fn test_no_state_revisited() {
        let failed = StreamState::Failed(SourceError::Cancelled);
        assert!(!failed.can_transition_to(&StreamState::Active));
        assert!(!failed.can_transition_to(&StreamState::Completed));
        assert!(!StreamState::Completed.can_transition_to(&StreamState::Draining));
        assert!(!StreamState::Draining.can_transition_to(&StreamState::Active));
        assert!(!StreamState::Draining.can_transition_to(&StreamState::Draining));
    }

    #[test]
    fn test_only_active_accepts_sends() {
        assert!(StreamState::Active.accepts_sends());
        assert!(!StreamState::Draining.accepts_sends());
        assert!(!StreamState::Completed.accepts_sends());
        assert!(StreamState::Completed.is_terminal());
        assert!(!StreamState::Draining.is_terminal());
    }
}
