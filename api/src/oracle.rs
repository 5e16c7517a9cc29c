//! The oracle collaborator: an Anthropic-style messages API.
//!
//! The oracle is fallible and potentially slow; every call runs to
//! completion and errors surface to the caller as transient failures.
//! Mock mode serves canned replies for local development — its rotation
//! cursor is kept per student session, so concurrent sessions never share
//! simulation state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use maieutic_core::session::TurnRole;
use maieutic_core::signals::ChatMessage;

use crate::prompts::{SCORING_DIRECTIVE, SCORING_PROMPT, SOCRATIC_SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DIALOGUE_MAX_TOKENS: u32 = 1024;
const SCORING_MAX_TOKENS: u32 = 512;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("oracle returned an empty reply")]
    EmptyReply,
    #[error("oracle is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Clone)]
pub struct OracleClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    mock_mode: bool,
    /// Per-student-session rotation cursors for mock mode. Deliberately
    /// keyed by session id: sessions must stay independent.
    mock_cursors: Arc<Mutex<HashMap<Uuid, usize>>>,
}

impl OracleClient {
    pub fn from_env() -> Self {
        let mock_mode = std::env::var("ORACLE_MOCK_MODE")
            .map(|v| v == "true")
            .unwrap_or(false);
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let model = std::env::var("ORACLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("ORACLE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            mock_mode,
            mock_cursors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether dialogue calls can be served at all: an API key is present
    /// or mock mode is on.
    pub fn is_configured(&self) -> bool {
        self.mock_mode || self.api_key.is_some()
    }

    pub fn mock_mode(&self) -> bool {
        self.mock_mode
    }

    /// One Socratic dialogue call: full ordered history plus the session's
    /// problem text. When `scoring_directed` is set the instructions demand
    /// immediate closure.
    pub async fn dialogue(
        &self,
        student_session_id: Uuid,
        history: &[ChatMessage],
        problem_text: &str,
        scoring_directed: bool,
    ) -> Result<String, OracleError> {
        if self.mock_mode {
            return Ok(self.next_mock_reply(student_session_id));
        }

        let mut system = format!(
            "{}\n\n============================================================\nCURRENT PROBLEM\n============================================================\n{}",
            SOCRATIC_SYSTEM_PROMPT, problem_text
        );
        if scoring_directed {
            system.push_str(SCORING_DIRECTIVE);
        }

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: DIALOGUE_MAX_TOKENS,
            system: &system,
            messages: history.iter().map(WireMessage::from).collect(),
        };
        self.send(&request).await
    }

    /// Fallback end-of-session evaluation over the full transcript, used
    /// when no scoring block was captured during the dialogue.
    pub async fn evaluate(&self, history: &[ChatMessage]) -> Result<String, OracleError> {
        if self.mock_mode {
            return Ok(MOCK_EVALUATION.to_string());
        }

        let transcript = history
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    TurnRole::Student => "STUDENT",
                    TurnRole::Oracle => "GUIDE",
                };
                format!("{}: {}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let content = format!(
            "Here is the full conversation to evaluate:\n\n{}",
            transcript
        );

        let messages = vec![WireMessage {
            role: "user",
            content: &content,
        }];
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: SCORING_MAX_TOKENS,
            system: SCORING_PROMPT,
            messages,
        };
        self.send(&request).await
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<String, OracleError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OracleError::NotConfigured("ANTHROPIC_API_KEY is not set".into()))?;

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read oracle error body".to_string());
            return Err(OracleError::Status { status, body });
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text" && !block.text.is_empty())
            .map(|block| block.text)
            .ok_or(OracleError::EmptyReply)
    }

    fn next_mock_reply(&self, student_session_id: Uuid) -> String {
        let mut cursors = self
            .mock_cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let cursor = cursors.entry(student_session_id).or_insert(0);
        let reply = MOCK_RESPONSES[*cursor % MOCK_RESPONSES.len()];
        *cursor += 1;
        reply.to_string()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        let role = match message.role {
            TurnRole::Student => "user",
            TurnRole::Oracle => "assistant",
        };
        WireMessage {
            role,
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

const MOCK_RESPONSES: [&str; 3] = [
    r#"That's an interesting starting point. If you removed the dams, what do you think would happen to the energy supply for the region, and who would bear that cost?

<metadata>
{
  "phase": "exploration",
  "exchange_number": 2,
  "engagement_level": "medium",
  "disciplines_engaged": ["marine biology"],
  "disciplines_avoided": ["economics", "indigenous rights", "policy"],
  "student_behavior": "proposing",
  "intervention_needed": false,
  "notes": "Student engaged with the ecological angle. Push toward economic and political trade-offs."
}
</metadata>"#,
    r#"You're thinking about the immediate ecological fix, and that's the right instinct. But let's stress-test it: if salmon populations recover, how long before the orca population actually stabilizes?

<metadata>
{
  "phase": "exploration",
  "exchange_number": 3,
  "engagement_level": "medium",
  "disciplines_engaged": ["marine biology", "ecology"],
  "disciplines_avoided": ["economics", "indigenous rights"],
  "student_behavior": "proposing",
  "intervention_needed": false,
  "notes": "Good ecological reasoning. Needs to engage with timeline and political feasibility."
}
</metadata>"#,
    r#"Good, you're starting to see the trade-offs. Here's the harder question: the Yakama Nation holds legally protected fishing rights that predate statehood. How does your recommendation interact with those rights?

<metadata>
{
  "phase": "deepening",
  "exchange_number": 5,
  "engagement_level": "high",
  "disciplines_engaged": ["marine biology", "economics", "policy"],
  "disciplines_avoided": ["indigenous rights"],
  "student_behavior": "deep",
  "intervention_needed": false,
  "notes": "Strong cross-disciplinary thinking. Push toward indigenous rights, the hardest tension."
}
</metadata>"#,
];

const MOCK_EVALUATION: &str = r#"{
  "depth": 72,
  "breadth": 58,
  "selfCorrection": 81,
  "independence": 65,
  "overall": 70,
  "feedback": "You showed strong reasoning depth and adapted your thinking well when challenged. Your biggest growth area is engaging across more disciplines. Push yourself to consider the economic and political dimensions earlier in your analysis."
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_client() -> OracleClient {
        OracleClient {
            client: reqwest::Client::new(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mock_mode: true,
            mock_cursors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[test]
    fn mock_rotation_is_per_student_session() {
        let client = mock_client();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        let a1 = client.next_mock_reply(a);
        let a2 = client.next_mock_reply(a);
        assert_ne!(a1, a2, "cursor should advance within a session");

        // A fresh session starts at the beginning regardless of how far
        // other sessions have advanced.
        let b1 = client.next_mock_reply(b);
        assert_eq!(a1, b1);
    }

    #[test]
    fn mock_mode_counts_as_configured() {
        let client = mock_client();
        assert!(client.mock_mode());
        assert!(client.is_configured(), "mock mode needs no API key");
    }

    #[test]
    fn wire_roles_map_to_messages_api_vocabulary() {
        let student = ChatMessage {
            role: TurnRole::Student,
            content: "Remove the dams.".to_string(),
        };
        let oracle = ChatMessage {
            role: TurnRole::Oracle,
            content: "Who pays for that?".to_string(),
        };
        assert_eq!(WireMessage::from(&student).role, "user");
        assert_eq!(WireMessage::from(&oracle).role, "assistant");
    }
}
