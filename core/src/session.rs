use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::metadata::{FinalScore, TurnMetadata};

/// A moderator-created room bound to one fixed problem statement.
/// The problem text is immutable for the lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    /// Short human-shareable code, unique among active sessions
    pub room_code: String,
    pub problem_text: String,
    pub owner_name: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionStatus::Active),
            "ended" => Some(SessionStatus::Ended),
            _ => None,
        }
    }
}

/// One student's independent conversation inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentSession {
    pub id: Uuid,
    pub room_code: String,
    pub student_name: String,
    pub status: StudentStatus,
    /// Cache of the latest per-turn metadata, refreshed on every oracle turn
    pub last_metadata: Option<TurnMetadata>,
    /// Set at most once, at completion, then immutable
    pub final_score: Option<FinalScore>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Completed,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(StudentStatus::Active),
            "completed" => Some(StudentStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Student,
    Oracle,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::Student => "student",
            TurnRole::Oracle => "oracle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(TurnRole::Student),
            "oracle" => Some(TurnRole::Oracle),
            _ => None,
        }
    }
}

/// One message in a student session's ordered history. Append-only;
/// creation-time order is canonical.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    pub id: Uuid,
    pub student_session_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    /// Structured metadata extracted from the reply (oracle turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
    pub created_at: DateTime<Utc>,
}

/// Count of student turns in the log. This is the engine's exchange
/// counter; oracle-reported numbers are never used for it.
pub fn exchange_count(turns: &[Turn]) -> u32 {
    turns.iter().filter(|t| t.role == TurnRole::Student).count() as u32
}
