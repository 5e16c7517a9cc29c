//! Read-only per-student view for the monitoring surface.
//!
//! Pure fold over committed state: identity, turn log, cached metadata,
//! engine state. Safe under repeated polling, and a student session with
//! zero turns projects to defined defaults instead of erroring.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::DialogueEngine;
use crate::metadata::{AuthenticityFlag, EngagementLevel, FinalScore, Phase, StudentBehavior};
use crate::phase::Diagnostic;
use crate::session::{exchange_count, StudentSession, StudentStatus, Turn};

/// What the monitor sees for one student session.
#[derive(Debug, Serialize, ToSchema)]
pub struct StudentView {
    pub id: Uuid,
    pub student_name: String,
    pub status: StudentStatus,
    /// Derived from the turn log, never from oracle-reported counters
    pub exchange_count: u32,
    pub phase: Phase,
    pub engagement_level: Option<EngagementLevel>,
    pub disciplines_engaged: Vec<String>,
    pub disciplines_avoided: Vec<String>,
    pub student_behavior: Option<StudentBehavior>,
    pub authenticity_flag: AuthenticityFlag,
    pub intervention_needed: bool,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<FinalScore>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Project one student session into its monitor view.
pub fn project_student(
    student: &StudentSession,
    turns: &[Turn],
    engine: Option<&DialogueEngine>,
) -> StudentView {
    let meta = student.last_metadata.as_ref();

    // The engine's derived state is authoritative over whatever the oracle
    // last claimed.
    let phase = engine
        .map(|e| e.phase())
        .or_else(|| meta.and_then(|m| m.phase))
        .unwrap_or_default();
    let authenticity_flag = engine.map(|e| e.authenticity()).unwrap_or_default();

    StudentView {
        id: student.id,
        student_name: student.student_name.clone(),
        status: student.status,
        exchange_count: exchange_count(turns),
        phase,
        engagement_level: meta.and_then(|m| m.engagement_level),
        disciplines_engaged: meta.map(|m| m.disciplines_engaged.clone()).unwrap_or_default(),
        disciplines_avoided: meta.map(|m| m.disciplines_avoided.clone()).unwrap_or_default(),
        student_behavior: meta.and_then(|m| m.student_behavior.clone()),
        authenticity_flag,
        intervention_needed: meta.map(|m| m.intervention_needed).unwrap_or(false),
        notes: meta.map(|m| m.notes.clone()).unwrap_or_default(),
        final_score: student.final_score.clone(),
        diagnostics: engine.map(|e| e.diagnostics().to_vec()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TurnMetadata;
    use crate::session::TurnRole;
    use chrono::Utc;

    fn student(last_metadata: Option<TurnMetadata>) -> StudentSession {
        StudentSession {
            id: Uuid::now_v7(),
            room_code: "K7M2PX".to_string(),
            student_name: "Ada".to_string(),
            status: StudentStatus::Active,
            last_metadata,
            final_score: None,
            created_at: Utc::now(),
        }
    }

    fn turn(student_session_id: Uuid, role: TurnRole) -> Turn {
        Turn {
            id: Uuid::now_v7(),
            student_session_id,
            role,
            content: "text".to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zero_turn_session_projects_to_defaults() {
        let view = project_student(&student(None), &[], None);
        assert_eq!(view.exchange_count, 0);
        assert_eq!(view.phase, Phase::Orientation);
        assert_eq!(view.authenticity_flag, AuthenticityFlag::Clean);
        assert!(view.engagement_level.is_none());
        assert!(view.disciplines_engaged.is_empty());
        assert!(!view.intervention_needed);
        assert!(view.diagnostics.is_empty());
        assert!(view.final_score.is_none());
    }

    #[test]
    fn exchange_count_comes_from_the_turn_log() {
        // The cached metadata claims exchange 9; the log says 2.
        let meta = TurnMetadata {
            exchange_number: Some(9),
            ..TurnMetadata::default()
        };
        let s = student(Some(meta));
        let turns = vec![
            turn(s.id, TurnRole::Student),
            turn(s.id, TurnRole::Oracle),
            turn(s.id, TurnRole::Student),
            turn(s.id, TurnRole::Oracle),
        ];
        let view = project_student(&s, &turns, None);
        assert_eq!(view.exchange_count, 2);
    }

    #[test]
    fn engine_state_overrides_cached_metadata() {
        let meta = TurnMetadata {
            phase: Some(Phase::Exploration),
            engagement_level: Some(EngagementLevel::High),
            disciplines_engaged: vec!["economics".to_string()],
            ..TurnMetadata::default()
        };
        let mut engine = DialogueEngine::default();
        engine.note_student_turn(1);
        engine.apply_oracle_turn(
            "",
            Some(&TurnMetadata {
                phase: Some(Phase::Deepening),
                ..TurnMetadata::default()
            }),
        );

        let view = project_student(&student(Some(meta)), &[], Some(&engine));
        assert_eq!(view.phase, Phase::Deepening);
        assert_eq!(view.engagement_level, Some(EngagementLevel::High));
        assert_eq!(view.disciplines_engaged, vec!["economics".to_string()]);
    }
}
