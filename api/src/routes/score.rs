//! End-of-session scoring. Always yields a score: a block captured during
//! the dialogue wins, a fallback oracle evaluation over the full transcript
//! comes next, and the neutral fallback closes the gap when both fail.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

use maieutic_core::error::ApiError;
use maieutic_core::metadata::{FinalScore, ScoreBlock};
use maieutic_core::scoring;
use maieutic_core::session::{StudentStatus, Turn, TurnRole};
use maieutic_core::signals::ChatMessage;

use crate::error::AppError;
use crate::state::AppState;
use crate::store;
use crate::store::StudentRecord;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/students/{student_session_id}/score",
        post(score_session),
    )
}

/// Pick the best available score source without touching the oracle:
/// a captured block first, then final scores cached in the latest metadata.
fn stored_score(record: &StudentRecord) -> Option<FinalScore> {
    if let Some(block) = record.captured_score.as_ref() {
        if let Some(score) = scoring::from_score_block(block) {
            return Some(score);
        }
        tracing::warn!("captured score block failed validation, falling back");
    }
    let meta = record.student.last_metadata.as_ref()?;
    let scores = meta.final_scores.as_ref()?;
    scoring::from_metadata_scores(scores, &meta.notes)
}

async fn fallback_evaluation(state: &AppState, turns: &[Turn]) -> FinalScore {
    let history: Vec<ChatMessage> = turns
        .iter()
        .map(|t| ChatMessage {
            role: t.role,
            content: t.content.clone(),
        })
        .collect();

    match state.oracle.evaluate(&history).await {
        Ok(raw) => match serde_json::from_str::<ScoreBlock>(raw.trim()) {
            Ok(block) => scoring::from_score_block(&block).unwrap_or_else(|| {
                tracing::warn!("fallback evaluation out of range, using neutral score");
                scoring::neutral_fallback()
            }),
            Err(err) => {
                tracing::warn!(error = %err, "fallback evaluation unparsable, using neutral score");
                scoring::neutral_fallback()
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "fallback evaluation call failed, using neutral score");
            scoring::neutral_fallback()
        }
    }
}

/// Score a student session
///
/// Computes the final weighted score and marks the session completed.
/// Write-once: scoring an already-scored session is a conflict.
#[utoipa::path(
    post,
    path = "/v1/students/{student_session_id}/score",
    params(("student_session_id" = Uuid, Path, description = "Student session ID")),
    responses(
        (status = 200, description = "Final score", body = FinalScore),
        (status = 404, description = "Student session not found", body = ApiError),
        (status = 409, description = "Already scored or turn in flight", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn score_session(
    State(state): State<AppState>,
    Path(student_session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = store::get_student(&state.db, student_session_id)
        .await?
        .ok_or(AppError::NotFound {
            what: format!("Student session '{}'", student_session_id),
        })?;
    if record.student.status == StudentStatus::Completed || record.student.final_score.is_some() {
        return Err(AppError::Conflict {
            message: format!(
                "Student session '{}' already has a final score",
                student_session_id
            ),
        });
    }

    // Scoring may call the oracle; it obeys the same per-session gate as
    // dialogue turns.
    let _permit = state
        .turn_gate
        .acquire(student_session_id)
        .ok_or(AppError::TurnInFlight { student_session_id })?;

    let turns = store::list_turns(&state.db, student_session_id).await?;
    if turns.iter().filter(|t| t.role == TurnRole::Student).count() == 0 {
        return Err(AppError::Validation {
            message: "Not enough conversation to score".to_string(),
            field: None,
            received: None,
            docs_hint: Some("Submit at least one turn before requesting a score.".to_string()),
        });
    }

    let score = match stored_score(&record) {
        Some(score) => score,
        None => fallback_evaluation(&state, &turns).await,
    };

    let recorded = store::complete_with_score(&state.db, student_session_id, &score).await?;
    if !recorded {
        return Err(AppError::Conflict {
            message: format!(
                "Student session '{}' already has a final score",
                student_session_id
            ),
        });
    }

    tracing::info!(
        student_session_id = %student_session_id,
        overall = score.overall,
        "session scored"
    );
    Ok(Json(score))
}
