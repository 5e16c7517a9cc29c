//! Persistence layer: rooms, student sessions, and the append-only turn
//! log. Single-row atomic updates are all the engine needs — the only
//! mutable fields are the per-student caches on `student_sessions`.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use maieutic_core::engine::DialogueEngine;
use maieutic_core::metadata::{FinalScore, ScoreBlock, TurnMetadata};
use maieutic_core::session::{
    Session, SessionStatus, StudentSession, StudentStatus, Turn, TurnRole,
};

use crate::error::AppError;

/// Characters used in room codes. Ambiguous glyphs (0/O, 1/I/L) are left
/// out so codes survive being read aloud.
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_ATTEMPTS: usize = 5;

pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_CHARSET[rng.gen_range(0..ROOM_CODE_CHARSET.len())] as char)
        .collect()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    field: &str,
    value: Option<serde_json::Value>,
) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(field, error = %err, "dropping undecodable stored JSON");
            None
        }
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("failed to serialize stored JSON: {}", e)))
}

// --- Sessions ---

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    room_code: String,
    problem_text: String,
    owner_name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            id: self.id,
            room_code: self.room_code,
            problem_text: self.problem_text,
            owner_name: self.owner_name,
            status: SessionStatus::parse(&self.status).unwrap_or(SessionStatus::Active),
            created_at: self.created_at,
        }
    }
}

/// Create a room with a freshly generated code, retrying on the rare
/// collision with another active room.
pub async fn create_session(
    pool: &PgPool,
    problem_text: &str,
    owner_name: &str,
) -> Result<Session, AppError> {
    for _ in 0..ROOM_CODE_ATTEMPTS {
        let room_code = generate_room_code();
        let result = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, room_code, problem_text, owner_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, room_code, problem_text, owner_name, status, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&room_code)
        .bind(problem_text)
        .bind(owner_name)
        .fetch_one(pool)
        .await;

        match result {
            Ok(row) => return Ok(row.into_session()),
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(room_code, "room code collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(AppError::Internal(
        "failed to generate a unique room code".to_string(),
    ))
}

pub async fn get_session(pool: &PgPool, room_code: &str) -> Result<Option<Session>, AppError> {
    let row = sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT id, room_code, problem_text, owner_name, status, created_at
        FROM sessions
        WHERE room_code = $1 AND status = 'active'
        "#,
    )
    .bind(room_code)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(SessionRow::into_session))
}

// --- Student sessions ---

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    room_code: String,
    student_name: String,
    status: String,
    last_metadata: Option<serde_json::Value>,
    engine_state: Option<serde_json::Value>,
    captured_score: Option<serde_json::Value>,
    final_score: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

/// A student session with its persisted engine state and any score block
/// captured from oracle text during the dialogue.
pub struct StudentRecord {
    pub student: StudentSession,
    pub engine: Option<DialogueEngine>,
    pub captured_score: Option<ScoreBlock>,
}

impl StudentRow {
    fn into_record(self) -> StudentRecord {
        StudentRecord {
            engine: decode_json("engine_state", self.engine_state),
            captured_score: decode_json("captured_score", self.captured_score),
            student: StudentSession {
                id: self.id,
                room_code: self.room_code,
                student_name: self.student_name,
                status: StudentStatus::parse(&self.status).unwrap_or(StudentStatus::Active),
                last_metadata: decode_json("last_metadata", self.last_metadata),
                final_score: decode_json("final_score", self.final_score),
                created_at: self.created_at,
            },
        }
    }
}

const STUDENT_COLUMNS: &str = "id, room_code, student_name, status, last_metadata, \
                               engine_state, captured_score, final_score, created_at";

pub async fn join_session(
    pool: &PgPool,
    room_code: &str,
    student_name: &str,
) -> Result<StudentSession, AppError> {
    let row = sqlx::query_as::<_, StudentRow>(&format!(
        "INSERT INTO student_sessions (id, room_code, student_name) \
         VALUES ($1, $2, $3) RETURNING {STUDENT_COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(room_code)
    .bind(student_name)
    .fetch_one(pool)
    .await?;
    Ok(row.into_record().student)
}

pub async fn get_student(pool: &PgPool, id: Uuid) -> Result<Option<StudentRecord>, AppError> {
    let row = sqlx::query_as::<_, StudentRow>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM student_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(StudentRow::into_record))
}

pub async fn list_students(
    pool: &PgPool,
    room_code: &str,
) -> Result<Vec<StudentRecord>, AppError> {
    let rows = sqlx::query_as::<_, StudentRow>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM student_sessions \
         WHERE room_code = $1 ORDER BY created_at ASC"
    ))
    .bind(room_code)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(StudentRow::into_record).collect())
}

/// Refresh the per-student caches after an oracle turn. One row, one
/// statement: the monitor only ever sees a fully committed snapshot.
pub async fn update_after_oracle_turn(
    pool: &PgPool,
    id: Uuid,
    last_metadata: Option<&TurnMetadata>,
    engine: &DialogueEngine,
    captured_score: Option<&ScoreBlock>,
) -> Result<(), AppError> {
    let last_metadata = last_metadata.map(encode_json).transpose()?;
    let engine_state = encode_json(engine)?;
    let captured_score = captured_score.map(encode_json).transpose()?;

    sqlx::query(
        r#"
        UPDATE student_sessions
        SET last_metadata = COALESCE($2, last_metadata),
            engine_state = $3,
            captured_score = COALESCE($4, captured_score)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(last_metadata)
    .bind(engine_state)
    .bind(captured_score)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the final score and mark the session completed. Write-once:
/// returns false when a score was already present, leaving it untouched.
pub async fn complete_with_score(
    pool: &PgPool,
    id: Uuid,
    score: &FinalScore,
) -> Result<bool, AppError> {
    let score = encode_json(score)?;
    let result = sqlx::query(
        r#"
        UPDATE student_sessions
        SET status = 'completed', final_score = $2
        WHERE id = $1 AND final_score IS NULL
        "#,
    )
    .bind(id)
    .bind(score)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

// --- Turns ---

#[derive(sqlx::FromRow)]
struct TurnRow {
    id: Uuid,
    student_session_id: Uuid,
    role: String,
    content: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TurnRow {
    fn into_turn(self) -> Turn {
        Turn {
            id: self.id,
            student_session_id: self.student_session_id,
            role: TurnRole::parse(&self.role).unwrap_or(TurnRole::Student),
            content: self.content,
            metadata: decode_json("metadata", self.metadata),
            created_at: self.created_at,
        }
    }
}

pub async fn append_turn(
    pool: &PgPool,
    student_session_id: Uuid,
    role: TurnRole,
    content: &str,
    metadata: Option<&TurnMetadata>,
) -> Result<Turn, AppError> {
    let metadata = metadata.map(encode_json).transpose()?;
    let row = sqlx::query_as::<_, TurnRow>(
        r#"
        INSERT INTO turns (id, student_session_id, role, content, metadata)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, student_session_id, role, content, metadata, created_at
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(student_session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(metadata)
    .fetch_one(pool)
    .await?;
    Ok(row.into_turn())
}

pub async fn list_turns(
    pool: &PgPool,
    student_session_id: Uuid,
) -> Result<Vec<Turn>, AppError> {
    let rows = sqlx::query_as::<_, TurnRow>(
        r#"
        SELECT id, student_session_id, role, content, metadata, created_at
        FROM turns
        WHERE student_session_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(student_session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TurnRow::into_turn).collect())
}
