use chrono::{DateTime, Local};
use serde::Serialize;

/// Lifecycle of the acquisition engine. Exactly one instance per process.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    ShuttingDown,
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

/// Mutable acquisition state guarded by the controller's lock.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionState {
    pub status: RunState,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub samples: u64,
}

impl AcquisitionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle → Running. Callers must have checked the status first; this
    /// resets the per-session counters unconditionally.
    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Local>) {
        self.status = RunState::Running;
        self.session_id = Some(session_id);
        self.started_at = Some(started_at);
        self.samples = 0;
    }

    /// Running → Idle. Keeps the session id around for the caller to report,
    /// returning it. No-op when not Running (ShuttingDown is terminal).
    pub fn end_session(&mut self) -> Option<String> {
        if self.status != RunState::Running {
            return None;
        }
        self.status = RunState::Idle;
        self.started_at = None;
        self.session_id.take()
    }

    /// Any state → ShuttingDown. Irreversible.
    pub fn shutdown(&mut self) {
        self.status = RunState::ShuttingDown;
        self.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_idle() {
        assert_eq!(AcquisitionState::new().status, RunState::Idle);
    }

    #[test]
    fn begin_then_end_roundtrip() {
        let mut state = AcquisitionState::new();
        state.begin_session("abc".into(), Local::now());
        assert_eq!(state.status, RunState::Running);
        assert_eq!(state.session_id.as_deref(), Some("abc"));

        let ended = state.end_session();
        assert_eq!(ended.as_deref(), Some("abc"));
        assert_eq!(state.status, RunState::Idle);
        assert!(state.session_id.is_none());
    }

    #[test]
    fn end_session_is_noop_when_idle() {
        let mut state = AcquisitionState::new();
        assert!(state.end_session().is_none());
        assert_eq!(state.status, RunState::Idle);
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut state = AcquisitionState::new();
        state.shutdown();
        assert_eq!(state.status, RunState::ShuttingDown);
        // A late stop signal must not resurrect the state machine.
        assert!(state.end_session().is_none());
        assert_eq!(state.status, RunState::ShuttingDown);
    }
}
