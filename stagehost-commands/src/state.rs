use core::fmt;

use stagehost_core::ResponseEvent;

/// Controller readiness as tracked on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Busy,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControllerState::Idle => "idle",
            ControllerState::Busy => "busy",
        })
    }
}

/// The authoritative Idle/Busy tracker.
///
/// Two states and no queue: a gated command submitted while busy is
/// refused outright, and only the controller's own DONE marks it ready
/// again. There is no timeout on Busy; only the controller knows how long
/// a scan takes.
#[derive(Debug, Default)]
pub struct Readiness {
    state: ControllerState,
}

impl Readiness {
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == ControllerState::Busy
    }

    /// Record a successful gated submission. The controller is assumed
    /// busy until it reports otherwise.
    pub fn begin(&mut self) {
        self.state = ControllerState::Busy;
    }

    /// Apply a classified response line, returning whether the state
    /// changed. BUSY and DONE are idempotent; info lines never
    /// transition.
    pub fn apply(&mut self, event: &ResponseEvent) -> bool {
        let next = match event {
            ResponseEvent::Busy => ControllerState::Busy,
            ResponseEvent::Done => ControllerState::Idle,
            ResponseEvent::Info(_) => self.state,
        };
        let changed = next != self.state;
        self.state = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_idle() {
        assert_eq!(Readiness::default().state(), ControllerState::Idle);
    }

    #[test]
    fn done_always_lands_idle() {
        let mut readiness = Readiness::default();
        readiness.begin();
        assert!(readiness.apply(&ResponseEvent::Done));
        assert_eq!(readiness.state(), ControllerState::Idle);
        // idempotent when already idle
        assert!(!readiness.apply(&ResponseEvent::Done));
        assert_eq!(readiness.state(), ControllerState::Idle);
    }

    #[test]
    fn busy_always_lands_busy() {
        let mut readiness = Readiness::default();
        assert!(readiness.apply(&ResponseEvent::Busy));
        assert!(!readiness.apply(&ResponseEvent::Busy));
        assert_eq!(readiness.state(), ControllerState::Busy);
    }

    #[test]
    fn info_never_transitions() {
        let mut readiness = Readiness::default();
        assert!(!readiness.apply(&ResponseEvent::Info(Arc::from("hello"))));
        assert_eq!(readiness.state(), ControllerState::Idle);
        readiness.begin();
        assert!(!readiness.apply(&ResponseEvent::Info(Arc::from("hello"))));
        assert_eq!(readiness.state(), ControllerState::Busy);
    }
}
