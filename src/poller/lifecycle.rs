// Run lifecycle state machine
//
// Tracks where a run stands between phases. Once the machine reaches
// `finished`, every later event is ignored, which keeps a sealed run sealed.

use serde::{Deserialize, Serialize};
use statig::prelude::*;

use super::run::RunStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencerEvent {
    PhaseSucceeded {
        name: String,
    },
    PhaseFailed {
        name: String,
        reason: String,
        best_effort: bool,
    },
    Cancelled {
        name: String,
    },
}

#[derive(Debug, Default)]
pub struct RunLifecycle {
    pub phase_count: usize,
    pub completed: usize,
    pub tolerated_failures: usize,
    terminal: Option<RunStatus>,
}

impl RunLifecycle {
    pub fn new(phase_count: usize) -> Self {
        Self {
            phase_count,
            ..Default::default()
        }
    }

    pub fn terminal_status(&self) -> Option<&RunStatus> {
        self.terminal.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }

    fn advance(&mut self) -> Outcome<State> {
        self.completed += 1;
        if self.completed < self.phase_count {
            return Handled;
        }

        let status = if self.tolerated_failures == 0 {
            RunStatus::AllPhasesSucceeded
        } else {
            RunStatus::SucceededWithWarnings
        };
        tracing::info!(
            phases = self.phase_count,
            tolerated_failures = self.tolerated_failures,
            "All phases completed"
        );
        self.terminal = Some(status);
        Transition(State::finished())
    }
}

#[state_machine(initial = "State::running()")]
impl RunLifecycle {
    #[state]
    fn running(&mut self, event: &SequencerEvent) -> Outcome<State> {
        match event {
            SequencerEvent::PhaseSucceeded { name } => {
                tracing::debug!(phase = %name, completed = self.completed + 1, "Phase confirmed");
                self.advance()
            }
            SequencerEvent::PhaseFailed {
                name,
                reason,
                best_effort: true,
            } => {
                tracing::warn!(phase = %name, reason = %reason, "Best-effort phase failed, continuing");
                self.tolerated_failures += 1;
                self.advance()
            }
            SequencerEvent::PhaseFailed { name, reason, .. } => {
                tracing::error!(phase = %name, reason = %reason, "Required phase failed, halting run");
                self.terminal = Some(RunStatus::FailedAtPhase {
                    name: name.clone(),
                    reason: reason.clone(),
                });
                Transition(State::finished())
            }
            SequencerEvent::Cancelled { name } => {
                tracing::warn!(phase = %name, "Run cancelled");
                self.terminal = Some(RunStatus::Cancelled {
                    phase: name.clone(),
                });
                Transition(State::finished())
            }
        }
    }

    #[state]
    fn finished(&mut self, event: &SequencerEvent) -> Outcome<State> {
        tracing::debug!(?event, "Ignoring event for finished run");
        Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(name: &str, best_effort: bool) -> SequencerEvent {
        SequencerEvent::PhaseFailed {
            name: name.to_string(),
            reason: "Timeout".to_string(),
            best_effort,
        }
    }

    #[test]
    fn test_all_phases_succeed() {
        let mut sm = RunLifecycle::new(2).state_machine();

        sm.handle(&SequencerEvent::PhaseSucceeded { name: "a".into() });
        assert!(!sm.is_finished());

        sm.handle(&SequencerEvent::PhaseSucceeded { name: "b".into() });
        assert_eq!(sm.terminal_status(), Some(&RunStatus::AllPhasesSucceeded));
    }

    #[test]
    fn test_required_failure_is_terminal_and_sticky() {
        let mut sm = RunLifecycle::new(3).state_machine();

        sm.handle(&SequencerEvent::PhaseSucceeded { name: "a".into() });
        sm.handle(&failed("b", false));
        sm.handle(&SequencerEvent::PhaseSucceeded { name: "c".into() });

        assert_eq!(
            sm.terminal_status(),
            Some(&RunStatus::FailedAtPhase {
                name: "b".into(),
                reason: "Timeout".into(),
            })
        );
        assert_eq!(sm.completed, 1);
    }

    #[test]
    fn test_best_effort_failure_downgrades_to_warning() {
        let mut sm = RunLifecycle::new(2).state_machine();

        sm.handle(&failed("cleanup-history", true));
        sm.handle(&SequencerEvent::PhaseSucceeded { name: "exit-backup-mode".into() });

        assert_eq!(sm.terminal_status(), Some(&RunStatus::SucceededWithWarnings));
        assert_eq!(sm.tolerated_failures, 1);
    }

    #[test]
    fn test_cancel_ends_run() {
        let mut sm = RunLifecycle::new(4).state_machine();

        sm.handle(&SequencerEvent::Cancelled { name: "drain".into() });

        assert_eq!(
            sm.terminal_status(),
            Some(&RunStatus::Cancelled { phase: "drain".into() })
        );
    }
}
