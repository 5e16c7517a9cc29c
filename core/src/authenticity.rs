//! Escalation tracking for suspected non-authentic student input.
//!
//! Layered on top of the oracle's per-turn behavior signals. One probe-style
//! signal moves the tracker to `probe_triggered`; only a second, consecutive
//! unresolved or deflecting signal on the immediately following turn
//! escalates to `verification_needed`. An isolated probe never escalates on
//! its own. Once set, `verification_needed` persists for the rest of the
//! session as a flag for external follow-up — the tracker never auto-clears
//! and never penalizes.

use serde::{Deserialize, Serialize};

use crate::metadata::{AuthenticityFlag, TurnMetadata};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticityMonitor {
    state: AuthenticityFlag,
    prior_turn_flagged: bool,
}

fn probe_signal(meta: &TurnMetadata) -> bool {
    meta.student_behavior
        .as_ref()
        .is_some_and(|b| b.is_probe_signal())
        || matches!(
            meta.authenticity_flag,
            Some(AuthenticityFlag::ProbeTriggered) | Some(AuthenticityFlag::VerificationNeeded)
        )
}

fn unresolved_signal(meta: &TurnMetadata) -> bool {
    probe_signal(meta)
        || meta
            .student_behavior
            .as_ref()
            .is_some_and(|b| b.is_deflection())
}

impl AuthenticityMonitor {
    pub fn state(&self) -> AuthenticityFlag {
        self.state
    }

    /// Fold one oracle turn's signals into the tracker and return the
    /// current flag.
    pub fn observe(&mut self, meta: Option<&TurnMetadata>) -> AuthenticityFlag {
        let (probe, unresolved) = match meta {
            Some(meta) => (probe_signal(meta), unresolved_signal(meta)),
            None => (false, false),
        };

        match self.state {
            AuthenticityFlag::VerificationNeeded => {}
            AuthenticityFlag::Clean => {
                if probe {
                    tracing::warn!("authenticity probe triggered");
                    self.state = AuthenticityFlag::ProbeTriggered;
                }
            }
            AuthenticityFlag::ProbeTriggered => {
                if unresolved && self.prior_turn_flagged {
                    tracing::warn!("consecutive unresolved probes, verification needed");
                    self.state = AuthenticityFlag::VerificationNeeded;
                }
            }
        }

        self.prior_turn_flagged = probe || (unresolved && self.prior_turn_flagged);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StudentBehavior;

    fn suspected() -> TurnMetadata {
        TurnMetadata {
            student_behavior: Some(StudentBehavior::SuspectedAiInput),
            ..TurnMetadata::default()
        }
    }

    fn deflecting() -> TurnMetadata {
        TurnMetadata {
            student_behavior: Some(StudentBehavior::AuthorityDeflection),
            ..TurnMetadata::default()
        }
    }

    fn clean() -> TurnMetadata {
        TurnMetadata {
            student_behavior: Some(StudentBehavior::Proposing),
            ..TurnMetadata::default()
        }
    }

    #[test]
    fn single_probe_triggers_but_never_escalates_alone() {
        let mut monitor = AuthenticityMonitor::default();
        assert_eq!(monitor.observe(Some(&clean())), AuthenticityFlag::Clean);
        assert_eq!(
            monitor.observe(Some(&suspected())),
            AuthenticityFlag::ProbeTriggered
        );
        assert_eq!(
            monitor.observe(Some(&clean())),
            AuthenticityFlag::ProbeTriggered
        );
        assert_eq!(
            monitor.observe(Some(&clean())),
            AuthenticityFlag::ProbeTriggered
        );
    }

    #[test]
    fn two_consecutive_probes_escalate() {
        let mut monitor = AuthenticityMonitor::default();
        monitor.observe(Some(&suspected()));
        assert_eq!(
            monitor.observe(Some(&suspected())),
            AuthenticityFlag::VerificationNeeded
        );
    }

    #[test]
    fn deflection_on_the_turn_after_a_probe_escalates() {
        let mut monitor = AuthenticityMonitor::default();
        monitor.observe(Some(&suspected()));
        assert_eq!(
            monitor.observe(Some(&deflecting())),
            AuthenticityFlag::VerificationNeeded
        );
    }

    #[test]
    fn non_consecutive_probes_do_not_escalate() {
        let mut monitor = AuthenticityMonitor::default();
        monitor.observe(Some(&suspected()));
        monitor.observe(Some(&clean()));
        assert_eq!(
            monitor.observe(Some(&suspected())),
            AuthenticityFlag::ProbeTriggered
        );
    }

    #[test]
    fn verification_needed_is_sticky() {
        let mut monitor = AuthenticityMonitor::default();
        monitor.observe(Some(&suspected()));
        monitor.observe(Some(&suspected()));
        assert_eq!(monitor.state(), AuthenticityFlag::VerificationNeeded);
        assert_eq!(
            monitor.observe(Some(&clean())),
            AuthenticityFlag::VerificationNeeded
        );
        assert_eq!(monitor.observe(None), AuthenticityFlag::VerificationNeeded);
    }

    #[test]
    fn deflection_without_a_prior_probe_stays_clean() {
        let mut monitor = AuthenticityMonitor::default();
        assert_eq!(
            monitor.observe(Some(&deflecting())),
            AuthenticityFlag::Clean
        );
    }

    #[test]
    fn missing_metadata_breaks_the_consecutive_chain() {
        let mut monitor = AuthenticityMonitor::default();
        monitor.observe(Some(&suspected()));
        monitor.observe(None);
        assert_eq!(
            monitor.observe(Some(&suspected())),
            AuthenticityFlag::ProbeTriggered
        );
    }
}
