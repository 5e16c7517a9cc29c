//! The chat operation: one student turn in, one oracle turn out.
//!
//! Order matters here. The student's message is persisted before the oracle
//! is called, so a failed call loses nothing. The engine folds the oracle's
//! reply only after parsing, and every derived cache lands in single-row
//! updates so the monitor never observes a half-applied turn.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use maieutic_core::error::ApiError;
use maieutic_core::metadata::{AuthenticityFlag, Phase, ScoreBlock, TurnMetadata};
use maieutic_core::parser::{ParsedResponse, parse_oracle_response};
use maieutic_core::session::{StudentStatus, Turn, TurnRole, exchange_count};
use maieutic_core::signals::{ChatMessage, InputSignals, annotate_last_student_turn};

use crate::error::AppError;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/students/{student_session_id}/turns", post(submit_turn))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TurnRequest {
    /// The student's message
    pub message: String,
    /// Behavioral signals reported by the client
    #[serde(flatten)]
    pub signals: InputSignals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TurnResponse {
    /// Student-visible oracle reply, tagged blocks stripped
    pub reply: String,
    /// Per-turn assessment block, if the oracle supplied a usable one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
    /// Engine-derived phase after this turn
    pub phase: Phase,
    /// Engine-counted exchange number
    pub exchange_count: u32,
    /// Engine-derived escalation state
    pub authenticity_flag: AuthenticityFlag,
}

fn outgoing_history(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|t| ChatMessage {
            role: t.role,
            content: t.content.clone(),
        })
        .collect()
}

/// A score block the oracle embedded mid-dialogue, either as a `<score>`
/// tag or as the final-scores object of a scoring-phase metadata block.
fn captured_score(parsed: &ParsedResponse) -> Option<ScoreBlock> {
    if parsed.score.is_some() {
        return parsed.score.clone();
    }
    let meta = parsed.metadata.as_ref()?;
    let scores = meta.final_scores.as_ref()?;
    Some(ScoreBlock {
        depth: scores.reasoning_depth,
        breadth: scores.disciplinary_breadth,
        self_correction: scores.self_correction,
        independence: scores.independence,
        overall: scores.overall,
        feedback: meta.notes.clone(),
    })
}

/// Submit a student turn
///
/// Persists the student's message, calls the oracle with the full ordered
/// history (plus input signals), and returns the stripped reply together
/// with the engine's view of the session. Turns within one student session
/// are strictly sequential; a second submission while one is outstanding is
/// rejected with 409.
#[utoipa::path(
    post,
    path = "/v1/students/{student_session_id}/turns",
    params(("student_session_id" = Uuid, Path, description = "Student session ID")),
    request_body = TurnRequest,
    responses(
        (status = 200, description = "Oracle reply", body = TurnResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Student session not found", body = ApiError),
        (status = 409, description = "Session completed or turn in flight", body = ApiError),
        (status = 502, description = "Oracle unavailable", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn submit_turn(
    State(state): State<AppState>,
    Path(student_session_id): Path<Uuid>,
    Json(req): Json<TurnRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation {
            message: "message must not be empty".to_string(),
            field: Some("message".to_string()),
            received: None,
            docs_hint: None,
        });
    }

    let record = store::get_student(&state.db, student_session_id)
        .await?
        .ok_or(AppError::NotFound {
            what: format!("Student session '{}'", student_session_id),
        })?;
    if record.student.status == StudentStatus::Completed {
        return Err(AppError::SessionCompleted { student_session_id });
    }
    let session = store::get_session(&state.db, &record.student.room_code)
        .await?
        .ok_or(AppError::NotFound {
            what: format!("Room '{}'", record.student.room_code),
        })?;

    // One oracle call in flight per student session; released on drop,
    // success or failure.
    let _permit = state
        .turn_gate
        .acquire(student_session_id)
        .ok_or(AppError::TurnInFlight { student_session_id })?;

    // Persist the student's input before the oracle call so a transient
    // oracle failure never loses it.
    store::append_turn(
        &state.db,
        student_session_id,
        TurnRole::Student,
        message,
        None,
    )
    .await?;

    let turns = store::list_turns(&state.db, student_session_id).await?;
    let mut engine = record.engine.unwrap_or_default();
    // The log is the canonical exchange counter. A student turn persisted
    // before a failed oracle call is counted exactly once on retry even
    // though the engine state for it was never committed.
    engine.note_student_turn(exchange_count(&turns));

    let mut history = outgoing_history(&turns);
    annotate_last_student_turn(&mut history, &req.signals);

    let raw = state
        .oracle
        .dialogue(
            student_session_id,
            &history,
            &session.problem_text,
            engine.scoring_directed(),
        )
        .await?;

    let parsed = parse_oracle_response(&raw);
    engine.apply_oracle_turn(&parsed.visible_text, parsed.metadata.as_ref());
    let captured = captured_score(&parsed);

    store::append_turn(
        &state.db,
        student_session_id,
        TurnRole::Oracle,
        &parsed.visible_text,
        parsed.metadata.as_ref(),
    )
    .await?;
    store::update_after_oracle_turn(
        &state.db,
        student_session_id,
        parsed.metadata.as_ref(),
        &engine,
        captured.as_ref(),
    )
    .await?;

    Ok(Json(TurnResponse {
        reply: parsed.visible_text,
        metadata: parsed.metadata,
        phase: engine.phase(),
        exchange_count: engine.exchange_count(),
        authenticity_flag: engine.authenticity(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maieutic_core::engine::DialogueEngine;
    use maieutic_core::metadata::FinalScoreBlock;

    #[test]
    fn score_tag_takes_precedence_over_metadata_scores() {
        let parsed = parse_oracle_response(concat!(
            "Done.",
            "<score>{\"depth\":80,\"breadth\":70,\"selfCorrection\":60,\"independence\":50}</score>",
        ));
        let captured = captured_score(&parsed).expect("score captured");
        assert_eq!(captured.depth, Some(80.0));
    }

    #[test]
    fn metadata_final_scores_are_captured_with_notes_as_feedback() {
        let parsed = ParsedResponse {
            visible_text: "Done.".to_string(),
            metadata: Some(TurnMetadata {
                phase: Some(Phase::Scoring),
                notes: "Strong cross-disciplinary reasoning.".to_string(),
                final_scores: Some(FinalScoreBlock {
                    reasoning_depth: Some(72.0),
                    disciplinary_breadth: Some(58.0),
                    self_correction: Some(81.0),
                    independence: Some(65.0),
                    overall: None,
                }),
                ..TurnMetadata::default()
            }),
            score: None,
        };
        let captured = captured_score(&parsed).expect("score captured");
        assert_eq!(captured.breadth, Some(58.0));
        assert_eq!(captured.overall, None);
        assert_eq!(captured.feedback, "Strong cross-disciplinary reasoning.");
    }

    #[test]
    fn plain_turn_captures_nothing() {
        let parsed = parse_oracle_response("Keep going.");
        assert!(captured_score(&parsed).is_none());
    }

    #[test]
    fn engine_default_is_used_for_first_turn() {
        let engine = DialogueEngine::default();
        assert_eq!(engine.exchange_count(), 0);
        assert_eq!(engine.phase(), Phase::Orientation);
    }

    #[test]
    fn retried_turn_counts_from_the_log_not_the_engine() {
        use chrono::Utc;

        let sid = Uuid::now_v7();
        let student_turn = || Turn {
            id: Uuid::now_v7(),
            student_session_id: sid,
            role: TurnRole::Student,
            content: "Remove the dams.".to_string(),
            metadata: None,
            created_at: Utc::now(),
        };

        // The first submission persisted its student turn but the oracle
        // call failed, so no engine state was saved. The retry restores a
        // fresh engine while the log already holds both student turns.
        let turns = vec![student_turn(), student_turn()];
        let mut engine = DialogueEngine::default();
        engine.note_student_turn(exchange_count(&turns));
        assert_eq!(engine.exchange_count(), 2);
    }
}
