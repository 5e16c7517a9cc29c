use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;

use maieutic_core::error::ApiError;
use maieutic_core::projection::{StudentView, project_student};
use maieutic_core::session::{Session, StudentSession};

use crate::error::AppError;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rooms", post(create_room))
        .route("/v1/rooms/{room_code}", get(room_status))
        .route("/v1/rooms/{room_code}/join", post(join_room))
        .route("/v1/rooms/{room_code}/monitor", get(monitor_room))
}

fn require_text(value: &str, field: &str, hint: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: format!("{} must not be empty", field),
            field: Some(field.to_string()),
            received: Some(serde_json::Value::String(value.to_string())),
            docs_hint: Some(hint.to_string()),
        });
    }
    Ok(trimmed.to_string())
}

async fn require_session(state: &AppState, room_code: &str) -> Result<Session, AppError> {
    let room_code = room_code.trim().to_uppercase();
    store::get_session(&state.db, &room_code)
        .await?
        .ok_or(AppError::NotFound {
            what: format!("Room '{}'", room_code),
        })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// The fixed problem statement for this room, immutable once created
    pub problem_text: String,
    /// Name of the moderator creating the room
    pub owner_name: String,
}

/// Create a room
///
/// Generates a short shareable room code bound to one fixed problem
/// statement. The problem text cannot be changed afterwards.
#[utoipa::path(
    post,
    path = "/v1/rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = Session),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "rooms"
)]
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, AppError> {
    let problem_text = require_text(
        &req.problem_text,
        "problem_text",
        "Provide the full problem statement students will reason about.",
    )?;
    let owner_name = require_text(&req.owner_name, "owner_name", "Provide the moderator's name.")?;

    let session = store::create_session(&state.db, &problem_text, &owner_name).await?;
    tracing::info!(room_code = %session.room_code, "room created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Fetch a room by code
#[utoipa::path(
    get,
    path = "/v1/rooms/{room_code}",
    params(("room_code" = String, Path, description = "Shareable room code")),
    responses(
        (status = 200, description = "Room", body = Session),
        (status = 404, description = "Room not found", body = ApiError)
    ),
    tag = "rooms"
)]
pub async fn room_status(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = require_session(&state, &room_code).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    pub student_name: String,
}

/// Join a room as a student
///
/// Creates an independent student session within the room. Students in the
/// same room share nothing but the problem text.
#[utoipa::path(
    post,
    path = "/v1/rooms/{room_code}/join",
    params(("room_code" = String, Path, description = "Shareable room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 201, description = "Student session created", body = StudentSession),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Room not found", body = ApiError)
    ),
    tag = "rooms"
)]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_name = require_text(&req.student_name, "student_name", "Provide a display name.")?;
    let session = require_session(&state, &room_code).await?;

    let student = store::join_session(&state.db, &session.room_code, &student_name).await?;
    tracing::info!(
        room_code = %session.room_code,
        student_session_id = %student.id,
        "student joined"
    );
    Ok((StatusCode::CREATED, Json(student)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMonitorResponse {
    pub session: Session,
    pub students: Vec<StudentView>,
}

/// Monitor view for a room
///
/// Read-only projection of every student session in the room, rebuilt from
/// committed state on each poll. Exchange counts come from the turn log,
/// never from oracle-reported numbers.
#[utoipa::path(
    get,
    path = "/v1/rooms/{room_code}/monitor",
    params(("room_code" = String, Path, description = "Shareable room code")),
    responses(
        (status = 200, description = "Monitor view", body = RoomMonitorResponse),
        (status = 404, description = "Room not found", body = ApiError)
    ),
    tag = "rooms"
)]
pub async fn monitor_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = require_session(&state, &room_code).await?;

    let records = store::list_students(&state.db, &session.room_code).await?;
    let mut students = Vec::with_capacity(records.len());
    for record in &records {
        let turns = store::list_turns(&state.db, record.student.id).await?;
        students.push(project_student(
            &record.student,
            &turns,
            record.engine.as_ref(),
        ));
    }

    Ok(Json(RoomMonitorResponse { session, students }))
}
