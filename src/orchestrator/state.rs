//! Break cycle states and interrupt escalation

use std::fmt;

/// Where the orchestrator is in its pause cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakState {
    /// Run proceeds unattended
    #[default]
    Running,
    /// Break requested, waiting for the host to confirm the pause
    AwaitingHostPause,
    /// Menu is shown, waiting for the operator
    Presenting,
    /// The selected action is executing
    ExecutingAction,
    /// Resume requested, waiting for the host to confirm
    AwaitingHostResume,
}

impl BreakState {
    pub fn is_broken(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for BreakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingHostPause => write!(f, "awaiting host pause"),
            Self::Presenting => write!(f, "presenting"),
            Self::ExecutingAction => write!(f, "executing action"),
            Self::AwaitingHostResume => write!(f, "awaiting host resume"),
        }
    }
}

/// What an external interrupt should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    Break,
    Ignore,
    ForceAbort,
}

/// Interrupts needed while waiting for the host before we give up on it
const FORCE_ABORT_INTERRUPTS: u32 = 2;

/// State, broken flag and interrupt counter, updated together
#[derive(Debug, Default)]
pub(crate) struct Control {
    pub state: BreakState,
    pub interrupt_count: u32,
    /// A pause cycle owns the run, from the break until it hands back
    pub broken: bool,
    /// Someone outside the cycle asked it to resume
    pub resume_requested: bool,
}

impl Control {
    /// Start a pause cycle; false while one is already active
    pub fn claim(&mut self) -> bool {
        if self.broken {
            return false;
        }
        self.broken = true;
        self.resume_requested = false;
        self.enter(BreakState::AwaitingHostPause);
        true
    }

    /// End the cycle and wait for the host to resume
    pub fn release(&mut self) {
        self.broken = false;
        self.resume_requested = false;
        self.enter(BreakState::AwaitingHostResume);
    }

    /// Move to `state`. Reaching the menu or resuming clears the interrupt count.
    pub fn enter(&mut self, state: BreakState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "Break state transition");
        }
        self.state = state;
        if matches!(state, BreakState::Presenting | BreakState::Running) {
            self.interrupt_count = 0;
        }
    }

    /// Decide what an interrupt does in the current state
    pub fn on_interrupt(&mut self) -> InterruptAction {
        match self.state {
            BreakState::Running => {
                self.interrupt_count = 1;
                InterruptAction::Break
            }
            BreakState::AwaitingHostPause => {
                self.interrupt_count += 1;
                if self.interrupt_count >= FORCE_ABORT_INTERRUPTS {
                    InterruptAction::ForceAbort
                } else {
                    InterruptAction::Ignore
                }
            }
            _ => InterruptAction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_while_running_breaks() {
        let mut control = Control::default();
        assert_eq!(control.on_interrupt(), InterruptAction::Break);
        assert_eq!(control.interrupt_count, 1);
    }

    #[test]
    fn test_second_interrupt_before_pause_escalates() {
        let mut control = Control::default();
        control.on_interrupt();
        control.enter(BreakState::AwaitingHostPause);
        assert_eq!(control.on_interrupt(), InterruptAction::ForceAbort);
    }

    #[test]
    fn test_interrupts_while_presenting_are_ignored() {
        let mut control = Control::default();
        control.on_interrupt();
        control.enter(BreakState::AwaitingHostPause);
        control.enter(BreakState::Presenting);
        assert_eq!(control.interrupt_count, 0);

        for _ in 0..3 {
            assert_eq!(control.on_interrupt(), InterruptAction::Ignore);
        }
        control.enter(BreakState::ExecutingAction);
        assert_eq!(control.on_interrupt(), InterruptAction::Ignore);
    }

    #[test]
    fn test_claim_is_exclusive_until_release() {
        let mut control = Control::default();
        assert!(control.claim());
        assert!(control.broken);
        assert_eq!(control.state, BreakState::AwaitingHostPause);
        assert!(!control.claim());

        control.resume_requested = true;
        control.release();
        assert!(!control.broken);
        assert!(!control.resume_requested);
        assert_eq!(control.state, BreakState::AwaitingHostResume);
        assert!(control.claim());
    }

    #[test]
    fn test_is_broken() {
        assert!(!BreakState::Running.is_broken());
        assert!(BreakState::Presenting.is_broken());
        assert!(BreakState::AwaitingHostResume.is_broken());
    }
}
