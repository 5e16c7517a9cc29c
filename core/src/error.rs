use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response shared by every API surface.
/// Carries enough information for a client to understand what went
/// wrong and how to fix it without consulting a human.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const TURN_IN_FLIGHT: &str = "turn_in_flight";
    pub const SESSION_COMPLETED: &str = "session_completed";
    pub const ORACLE_UNAVAILABLE: &str = "oracle_unavailable";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
