use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Dialogue phase. The order of the variants is the canonical progression:
/// a session only ever moves forward through this list, and `Scoring` is
/// terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Orientation,
    Exploration,
    Deepening,
    Synthesis,
    Scoring,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Phase::Scoring
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Orientation => "orientation",
            Phase::Exploration => "exploration",
            Phase::Deepening => "deepening",
            Phase::Synthesis => "synthesis",
            Phase::Scoring => "scoring",
        }
    }
}

/// Oracle-assessed involvement of the student in the current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

/// How much structural help the oracle is currently providing.
/// `Verification` is the special mode used while probing suspected
/// non-authentic input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldingLevel {
    High,
    Medium,
    Low,
    Verification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldingType {
    Conceptual,
    FactualContext,
    None,
}

/// Escalation state for suspected non-authentic student input.
/// `VerificationNeeded` is sticky for the rest of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticityFlag {
    #[default]
    Clean,
    ProbeTriggered,
    VerificationNeeded,
}

/// Closed behavior vocabulary with a free-form escape hatch. The oracle
/// occasionally invents new tags; those land in `Other` instead of failing
/// deserialization, and round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StudentBehavior {
    Proposing,
    Deferring,
    Shallow,
    Deep,
    PrematureClosure,
    AuthorityDeflection,
    NovelReasoning,
    ProductiveUncertainty,
    Guessing,
    AiDependent,
    SuspectedAiInput,
    Other(String),
}

impl StudentBehavior {
    pub fn as_str(&self) -> &str {
        match self {
            StudentBehavior::Proposing => "proposing",
            StudentBehavior::Deferring => "deferring",
            StudentBehavior::Shallow => "shallow",
            StudentBehavior::Deep => "deep",
            StudentBehavior::PrematureClosure => "premature_closure",
            StudentBehavior::AuthorityDeflection => "authority_deflection",
            StudentBehavior::NovelReasoning => "novel_reasoning",
            StudentBehavior::ProductiveUncertainty => "productive_uncertainty",
            StudentBehavior::Guessing => "guessing",
            StudentBehavior::AiDependent => "ai_dependent",
            StudentBehavior::SuspectedAiInput => "suspected_ai_input",
            StudentBehavior::Other(tag) => tag,
        }
    }

    /// A probe-style signal: the oracle suspects the student's input was
    /// not produced by the student.
    pub fn is_probe_signal(&self) -> bool {
        matches!(self, StudentBehavior::SuspectedAiInput)
    }

    /// A deflecting response that leaves an open probe unresolved.
    pub fn is_deflection(&self) -> bool {
        matches!(
            self,
            StudentBehavior::SuspectedAiInput
                | StudentBehavior::AiDependent
                | StudentBehavior::AuthorityDeflection
                | StudentBehavior::Deferring
        )
    }
}

impl From<String> for StudentBehavior {
    fn from(value: String) -> Self {
        match value.as_str() {
            "proposing" => StudentBehavior::Proposing,
            "deferring" => StudentBehavior::Deferring,
            "shallow" => StudentBehavior::Shallow,
            "deep" => StudentBehavior::Deep,
            "premature_closure" => StudentBehavior::PrematureClosure,
            "authority_deflection" => StudentBehavior::AuthorityDeflection,
            "novel_reasoning" => StudentBehavior::NovelReasoning,
            "productive_uncertainty" => StudentBehavior::ProductiveUncertainty,
            "guessing" => StudentBehavior::Guessing,
            "ai_dependent" => StudentBehavior::AiDependent,
            "suspected_ai_input" => StudentBehavior::SuspectedAiInput,
            _ => StudentBehavior::Other(value),
        }
    }
}

impl From<StudentBehavior> for String {
    fn from(value: StudentBehavior) -> Self {
        value.as_str().to_string()
    }
}

impl utoipa::PartialSchema for StudentBehavior {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::Type::String)
            .description(Some(
                "Closed behavior vocabulary plus free-form values for novel oracle tags",
            ))
            .into()
    }
}

impl utoipa::ToSchema for StudentBehavior {}

/// Per-turn assessment block embedded in oracle text. Every field is
/// optional or defaulted: the oracle frequently omits fields, and a partial
/// block is still worth keeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TurnMetadata {
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub exchange_number: Option<u32>,
    #[serde(default)]
    pub engagement_level: Option<EngagementLevel>,
    #[serde(default)]
    pub scaffolding_level: Option<ScaffoldingLevel>,
    #[serde(default)]
    pub scaffolding_type: Option<ScaffoldingType>,
    #[serde(default)]
    pub disciplines_engaged: Vec<String>,
    #[serde(default)]
    pub disciplines_avoided: Vec<String>,
    #[serde(default)]
    pub student_behavior: Option<StudentBehavior>,
    #[serde(default)]
    pub authenticity_flag: Option<AuthenticityFlag>,
    #[serde(default)]
    pub intervention_needed: bool,
    #[serde(default)]
    pub notes: String,

    // Scoring phase only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_scores: Option<FinalScoreBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_exchanges: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaffolding_trajectory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disciplines_covered: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disciplines_missed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strongest_moment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_area: Option<String>,
}

/// Final sub-scores as they appear inside a scoring-phase metadata block.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinalScoreBlock {
    #[serde(default)]
    pub reasoning_depth: Option<f64>,
    #[serde(default)]
    pub disciplinary_breadth: Option<f64>,
    #[serde(default)]
    pub self_correction: Option<f64>,
    #[serde(default)]
    pub independence: Option<f64>,
    #[serde(default)]
    pub overall: Option<f64>,
}

/// End-of-session score block embedded in oracle text (`<score>` tags).
/// Key names follow the oracle's wire format, camelCase included.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ScoreBlock {
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub breadth: Option<f64>,
    #[serde(default, rename = "selfCorrection")]
    pub self_correction: Option<f64>,
    #[serde(default)]
    pub independence: Option<f64>,
    #[serde(default)]
    pub overall: Option<f64>,
    #[serde(default)]
    pub feedback: String,
}

/// A validated, immutable session score. Produced once at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinalScore {
    pub depth: u8,
    pub breadth: u8,
    pub self_correction: u8,
    pub independence: u8,
    pub overall: u8,
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_behavior_round_trips_known_tags() {
        let json = "\"authority_deflection\"";
        let behavior: StudentBehavior =
            serde_json::from_str(json).expect("known tag should deserialize");
        assert_eq!(behavior, StudentBehavior::AuthorityDeflection);
        assert_eq!(
            serde_json::to_string(&behavior).expect("serialize"),
            json.to_string()
        );
    }

    #[test]
    fn student_behavior_preserves_novel_tags() {
        let behavior: StudentBehavior =
            serde_json::from_str("\"rubber_ducking\"").expect("novel tag should deserialize");
        assert_eq!(behavior, StudentBehavior::Other("rubber_ducking".into()));
        assert_eq!(
            serde_json::to_string(&behavior).expect("serialize"),
            "\"rubber_ducking\""
        );
    }

    #[test]
    fn phase_order_matches_session_progression() {
        assert!(Phase::Orientation < Phase::Exploration);
        assert!(Phase::Exploration < Phase::Deepening);
        assert!(Phase::Deepening < Phase::Synthesis);
        assert!(Phase::Synthesis < Phase::Scoring);
        assert!(Phase::Scoring.is_terminal());
    }

    #[test]
    fn turn_metadata_tolerates_partial_blocks() {
        let meta: TurnMetadata =
            serde_json::from_str(r#"{"phase":"exploration"}"#).expect("partial block parses");
        assert_eq!(meta.phase, Some(Phase::Exploration));
        assert_eq!(meta.exchange_number, None);
        assert!(meta.disciplines_engaged.is_empty());
        assert!(!meta.intervention_needed);
    }
}
