//! Per-student-session fold state: the phase machine, the authenticity
//! tracker, and the accumulated diagnostics, bundled so the whole thing can
//! be persisted as one JSON value and restored on the next turn.

use serde::{Deserialize, Serialize};

use crate::authenticity::AuthenticityMonitor;
use crate::metadata::{AuthenticityFlag, Phase, TurnMetadata};
use crate::phase::{Diagnostic, PhaseStateMachine};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueEngine {
    phases: PhaseStateMachine,
    authenticity: AuthenticityMonitor,
    diagnostics: Vec<Diagnostic>,
}

impl DialogueEngine {
    pub fn with_ceiling(ceiling: u32) -> Self {
        Self {
            phases: PhaseStateMachine::new(ceiling),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phases.phase()
    }

    pub fn exchange_count(&self) -> u32 {
        self.phases.exchange_count()
    }

    pub fn authenticity(&self) -> AuthenticityFlag {
        self.authenticity.state()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the next oracle call must be directed straight at scoring.
    pub fn scoring_directed(&self) -> bool {
        self.phases.scoring_directed()
    }

    /// Record a student turn boundary with the exchange count derived from
    /// the turn log (cutoff enforcement happens here).
    pub fn note_student_turn(&mut self, logged_exchanges: u32) {
        self.phases.note_student_turn(logged_exchanges);
    }

    /// Fold one oracle turn into the engine. Violations are logged and
    /// appended to the diagnostics; the conversation is never interrupted.
    pub fn apply_oracle_turn(&mut self, visible_text: &str, meta: Option<&TurnMetadata>) {
        let new_diagnostics = self.phases.observe_oracle_turn(visible_text, meta);
        for diagnostic in &new_diagnostics {
            tracing::warn!(
                kind = ?diagnostic.kind,
                exchange = diagnostic.exchange,
                detail = %diagnostic.detail,
                "protocol violation"
            );
        }
        self.diagnostics.extend(new_diagnostics);
        self.authenticity.observe(meta);
    }
}
