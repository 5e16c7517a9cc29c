//! Five-phase dialogue lifecycle with hard-stop and anti-repetition rules.
//!
//! The oracle's natural-language instructions describe the session length
//! and closing rules, but nothing guarantees it follows them. This state
//! machine re-derives every rule mechanically: it counts exchanges from the
//! turn log, refuses phase regression, enforces the exchange ceiling, and
//! tracks one-use closing phrases. Detected violations are recorded as
//! diagnostics and the conversation continues; the engine cannot rewrite
//! oracle text, only detect and flag.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metadata::{Phase, TurnMetadata};

/// Exchange ceiling after which synthesis is forced at the next turn
/// boundary.
pub const DEFAULT_EXCHANGE_CEILING: u32 = 14;

/// Phrases that commit the oracle to closing the session. Each may be used
/// at most once per session.
pub const CLOSING_PHRASES: [&str; 5] = [
    "one last thing",
    "one final question",
    "before we wrap up",
    "one more push",
    "let me ask one more",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Oracle reported a phase earlier than the recorded one
    PhaseRegression,
    /// Oracle-reported exchange number disagrees with the engine's count
    ExchangeCounterMismatch,
    /// A one-use closing phrase appeared a second time
    RepeatedClosingPhrase,
    /// The reply after a committed closing did not reach scoring
    ClosingNotHonored,
}

/// A recorded protocol violation. Non-fatal; surfaced to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
    /// Engine exchange count at the time the violation was detected
    pub exchange: u32,
}

/// Tracks the dialogue lifecycle for one student session. Serializable so
/// it can be persisted between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStateMachine {
    phase: Phase,
    exchange_count: u32,
    ceiling: u32,
    /// Exchange at which a closing phrase first appeared
    closing_committed_at: Option<u32>,
    closing_violation_recorded: bool,
    /// Set when the ceiling fired: the next oracle call must be
    /// scoring-directed
    force_scoring_call: bool,
}

impl Default for PhaseStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE_CEILING)
    }
}

impl PhaseStateMachine {
    pub fn new(ceiling: u32) -> Self {
        Self {
            phase: Phase::default(),
            exchange_count: 0,
            ceiling,
            closing_committed_at: None,
            closing_violation_recorded: false,
            force_scoring_call: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchange_count
    }

    /// Whether the next oracle call must be directed straight at scoring.
    pub fn scoring_directed(&self) -> bool {
        self.force_scoring_call
    }

    /// Record a student turn boundary. The count comes from the turn log,
    /// the canonical source: a turn persisted before a failed oracle call
    /// is then counted exactly once on retry, even when the engine state
    /// for that turn was never committed. Reaching the ceiling while still
    /// pre-synthesis forces the phase forward regardless of what the
    /// oracle thinks.
    pub fn note_student_turn(&mut self, logged_exchanges: u32) {
        self.exchange_count = logged_exchanges;
        if self.exchange_count >= self.ceiling && self.phase < Phase::Synthesis {
            tracing::warn!(
                exchange = self.exchange_count,
                ceiling = self.ceiling,
                prior_phase = self.phase.as_str(),
                "exchange ceiling reached, forcing synthesis"
            );
            self.phase = Phase::Synthesis;
            self.force_scoring_call = true;
        }
    }

    /// Fold one oracle turn into the machine. Returns the diagnostics the
    /// turn produced; all are non-fatal.
    pub fn observe_oracle_turn(
        &mut self,
        visible_text: &str,
        meta: Option<&TurnMetadata>,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if let Some(meta) = meta {
            self.apply_reported_phase(meta, &mut diagnostics);
            self.check_reported_counter(meta, &mut diagnostics);
        }
        self.scan_closing_phrases(visible_text, &mut diagnostics);
        self.check_closing_honored(&mut diagnostics);

        if self.phase >= Phase::Scoring {
            // Terminal; no further scoring direction needed.
            self.force_scoring_call = false;
        }
        diagnostics
    }

    fn apply_reported_phase(&mut self, meta: &TurnMetadata, diagnostics: &mut Vec<Diagnostic>) {
        let Some(reported) = meta.phase else {
            return;
        };
        if reported < self.phase {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::PhaseRegression,
                detail: format!(
                    "oracle reported phase '{}' after '{}'",
                    reported.as_str(),
                    self.phase.as_str()
                ),
                exchange: self.exchange_count,
            });
        } else {
            self.phase = reported;
        }
    }

    fn check_reported_counter(&mut self, meta: &TurnMetadata, diagnostics: &mut Vec<Diagnostic>) {
        let Some(reported) = meta.exchange_number else {
            return;
        };
        if reported != self.exchange_count {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::ExchangeCounterMismatch,
                detail: format!(
                    "oracle reported exchange {} but the turn log counts {}",
                    reported, self.exchange_count
                ),
                exchange: self.exchange_count,
            });
        }
    }

    fn scan_closing_phrases(&mut self, visible_text: &str, diagnostics: &mut Vec<Diagnostic>) {
        let lower = visible_text.to_lowercase();
        let Some(phrase) = CLOSING_PHRASES.iter().find(|p| lower.contains(*p)) else {
            return;
        };
        match self.closing_committed_at {
            None => self.closing_committed_at = Some(self.exchange_count),
            Some(committed_at) => diagnostics.push(Diagnostic {
                kind: DiagnosticKind::RepeatedClosingPhrase,
                detail: format!(
                    "closing phrase '{}' used again after committing at exchange {}",
                    phrase, committed_at
                ),
                exchange: self.exchange_count,
            }),
        }
    }

    fn check_closing_honored(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        let Some(committed_at) = self.closing_committed_at else {
            return;
        };
        if self.closing_violation_recorded || self.phase.is_terminal() {
            return;
        }
        // The commitment binds the very next reply. By the time this runs
        // the reported phase has already been applied, so a non-terminal
        // phase at any later exchange is a determinate violation.
        if self.exchange_count > committed_at {
            self.closing_violation_recorded = true;
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::ClosingNotHonored,
                detail: format!(
                    "closing committed at exchange {} but the reply at exchange {} did not reach scoring",
                    committed_at, self.exchange_count
                ),
                exchange: self.exchange_count,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Phase;

    fn meta_with_phase(phase: Phase) -> TurnMetadata {
        TurnMetadata {
            phase: Some(phase),
            ..TurnMetadata::default()
        }
    }

    #[test]
    fn phase_advances_with_oracle_reports() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        let diags =
            machine.observe_oracle_turn("Let's explore.", Some(&meta_with_phase(Phase::Exploration)));
        assert!(diags.is_empty());
        assert_eq!(machine.phase(), Phase::Exploration);
    }

    #[test]
    fn phase_never_regresses() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        machine.observe_oracle_turn("", Some(&meta_with_phase(Phase::Deepening)));
        let diags =
            machine.observe_oracle_turn("", Some(&meta_with_phase(Phase::Exploration)));
        assert_eq!(machine.phase(), Phase::Deepening);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::PhaseRegression);
    }

    #[test]
    fn phase_is_monotonic_for_arbitrary_report_sequences() {
        let reports = [
            Phase::Exploration,
            Phase::Orientation,
            Phase::Synthesis,
            Phase::Deepening,
            Phase::Scoring,
            Phase::Orientation,
        ];
        let mut machine = PhaseStateMachine::default();
        let mut last = machine.phase();
        for (exchange, report) in reports.into_iter().enumerate() {
            machine.note_student_turn(exchange as u32 + 1);
            machine.observe_oracle_turn("", Some(&meta_with_phase(report)));
            assert!(machine.phase() >= last, "phase regressed");
            last = machine.phase();
        }
        assert_eq!(last, Phase::Scoring);
    }

    #[test]
    fn ceiling_forces_synthesis_at_next_turn_boundary() {
        let mut machine = PhaseStateMachine::new(3);
        for exchange in 1..=2 {
            machine.note_student_turn(exchange);
            machine.observe_oracle_turn("", Some(&meta_with_phase(Phase::Exploration)));
        }
        assert_eq!(machine.phase(), Phase::Exploration);
        assert!(!machine.scoring_directed());

        machine.note_student_turn(3);
        assert_eq!(machine.phase(), Phase::Synthesis);
        assert!(machine.scoring_directed());
    }

    #[test]
    fn ceiling_does_not_fire_once_synthesis_was_reached() {
        let mut machine = PhaseStateMachine::new(3);
        machine.note_student_turn(1);
        machine.observe_oracle_turn("", Some(&meta_with_phase(Phase::Synthesis)));
        machine.note_student_turn(2);
        machine.note_student_turn(3);
        assert!(!machine.scoring_directed());
    }

    #[test]
    fn counter_follows_the_turn_log_after_lost_state() {
        // The engine state for the first turn was never committed (the
        // oracle call failed after the student turn persisted), so the
        // retry restores a machine that has seen nothing while the log
        // already counts two student turns.
        let mut machine = PhaseStateMachine::new(2);
        machine.note_student_turn(2);
        assert_eq!(machine.exchange_count(), 2);
        assert_eq!(machine.phase(), Phase::Synthesis, "ceiling applies to the log count");
        assert!(machine.scoring_directed());
    }

    #[test]
    fn counter_mismatch_is_a_soft_diagnostic() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        let meta = TurnMetadata {
            exchange_number: Some(7),
            ..TurnMetadata::default()
        };
        let diags = machine.observe_oracle_turn("", Some(&meta));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::ExchangeCounterMismatch);
        assert_eq!(machine.exchange_count(), 1);
    }

    #[test]
    fn first_closing_phrase_commits_second_is_a_violation() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        let diags = machine.observe_oracle_turn("One final question: why?", None);
        assert!(diags.is_empty());

        machine.note_student_turn(2);
        let diags = machine.observe_oracle_turn("Before we wrap up, one more angle.", None);
        assert!(
            diags
                .iter()
                .any(|d| d.kind == DiagnosticKind::RepeatedClosingPhrase),
            "second closing phrase must be flagged"
        );
        // The engine only flags; the phase is untouched.
        assert_eq!(machine.phase(), Phase::Orientation);
    }

    #[test]
    fn non_scoring_reply_after_a_committed_closing_is_flagged() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        let diags = machine.observe_oracle_turn("One last thing before you decide.", None);
        assert!(diags.is_empty(), "the committing turn itself is fine");

        // The very next reply fails to reach scoring.
        machine.note_student_turn(2);
        let diags = machine.observe_oracle_turn("And another question.", None);
        assert!(
            diags
                .iter()
                .any(|d| d.kind == DiagnosticKind::ClosingNotHonored)
        );

        // Recorded once, not on every subsequent turn.
        machine.note_student_turn(3);
        let diags = machine.observe_oracle_turn("Still going.", None);
        assert!(diags.is_empty());
    }

    #[test]
    fn closing_honored_when_scoring_reached_in_time() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        machine.observe_oracle_turn("One last thing.", Some(&meta_with_phase(Phase::Synthesis)));
        machine.note_student_turn(2);
        let diags =
            machine.observe_oracle_turn("Here is your score.", Some(&meta_with_phase(Phase::Scoring)));
        assert!(diags.is_empty());
        assert_eq!(machine.phase(), Phase::Scoring);
    }

    #[test]
    fn state_round_trips_through_serde() {
        let mut machine = PhaseStateMachine::default();
        machine.note_student_turn(1);
        machine.observe_oracle_turn("One last thing.", Some(&meta_with_phase(Phase::Deepening)));

        let json = serde_json::to_string(&machine).expect("serialize");
        let restored: PhaseStateMachine = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.phase(), Phase::Deepening);
        assert_eq!(restored.exchange_count(), 1);
    }
}
