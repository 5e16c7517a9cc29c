//! Behavioral input signals attached to outgoing turns.
//!
//! The client reports how a student message was produced (typed vs pasted,
//! how long it took). The annotator folds those into a short bracketed note
//! on the last student turn of the outgoing history so the oracle can use
//! them as corroborating evidence. The persisted turn text is never touched.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::TurnRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputMethod {
    Typed,
    Pasted,
}

/// Auxiliary signals reported alongside a student message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct InputSignals {
    #[serde(default)]
    pub input_method: Option<InputMethod>,
    #[serde(default)]
    pub response_time_seconds: Option<f64>,
}

impl InputSignals {
    fn annotation(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.input_method == Some(InputMethod::Pasted) {
            parts.push("pasted".to_string());
        }
        if let Some(seconds) = self.response_time_seconds {
            parts.push(format!("response_time: {}s", seconds.round() as i64));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("[INPUT SIGNAL: {}]", parts.join(" | ")))
        }
    }
}

/// A role/content pair as sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: TurnRole,
    pub content: String,
}

/// Append the signal annotation to the last student turn of the outgoing
/// history. No-op when there is nothing to report or the last turn is not
/// from the student.
pub fn annotate_last_student_turn(history: &mut [ChatMessage], signals: &InputSignals) {
    let Some(last) = history.last_mut() else {
        return;
    };
    if last.role != TurnRole::Student {
        return;
    }
    if let Some(note) = signals.annotation() {
        last.content = format!("{}\n\n{}", last.content, note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: TurnRole::Oracle,
                content: "What is the core tension here?".to_string(),
            },
            ChatMessage {
                role: TurnRole::Student,
                content: "Dams versus salmon.".to_string(),
            },
        ]
    }

    #[test]
    fn annotates_pasted_input_with_latency() {
        let mut turns = history();
        let signals = InputSignals {
            input_method: Some(InputMethod::Pasted),
            response_time_seconds: Some(11.6),
        };
        annotate_last_student_turn(&mut turns, &signals);
        assert_eq!(
            turns[1].content,
            "Dams versus salmon.\n\n[INPUT SIGNAL: pasted | response_time: 12s]"
        );
        // earlier turns untouched
        assert_eq!(turns[0].content, "What is the core tension here?");
    }

    #[test]
    fn typed_input_without_latency_is_a_noop() {
        let mut turns = history();
        let signals = InputSignals {
            input_method: Some(InputMethod::Typed),
            response_time_seconds: None,
        };
        annotate_last_student_turn(&mut turns, &signals);
        assert_eq!(turns, history());
    }

    #[test]
    fn skips_when_last_turn_is_not_from_student() {
        let mut turns = history();
        turns.push(ChatMessage {
            role: TurnRole::Oracle,
            content: "And who pays for that?".to_string(),
        });
        let signals = InputSignals {
            input_method: Some(InputMethod::Pasted),
            response_time_seconds: Some(3.0),
        };
        let before = turns.clone();
        annotate_last_student_turn(&mut turns, &signals);
        assert_eq!(turns, before);
    }

    #[test]
    fn empty_history_is_tolerated() {
        let mut turns: Vec<ChatMessage> = Vec::new();
        annotate_last_student_turn(
            &mut turns,
            &InputSignals {
                input_method: Some(InputMethod::Pasted),
                response_time_seconds: None,
            },
        );
        assert!(turns.is_empty());
    }
}
