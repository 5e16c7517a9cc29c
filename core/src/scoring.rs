//! Weighted competency scoring.
//!
//! overall = round(0.30·depth + 0.25·breadth + 0.25·self_correction +
//! 0.20·independence). When the oracle supplies its own overall it is
//! trusted and not silently overwritten; the formula applies only when no
//! valid value exists. Scoring must always yield something: on total
//! failure the neutral fallback is returned.

use crate::metadata::{FinalScore, FinalScoreBlock, ScoreBlock};

pub const WEIGHT_DEPTH: f64 = 0.30;
pub const WEIGHT_BREADTH: f64 = 0.25;
pub const WEIGHT_SELF_CORRECTION: f64 = 0.25;
pub const WEIGHT_INDEPENDENCE: f64 = 0.20;

const NEUTRAL_FEEDBACK: &str =
    "Session complete. Keep pushing your thinking across disciplines.";

/// The weighted overall for four sub-scores. Pure and idempotent: the same
/// sub-scores always produce the same overall.
pub fn weighted_overall(depth: f64, breadth: f64, self_correction: f64, independence: f64) -> u8 {
    let total = depth * WEIGHT_DEPTH
        + breadth * WEIGHT_BREADTH
        + self_correction * WEIGHT_SELF_CORRECTION
        + independence * WEIGHT_INDEPENDENCE;
    total.round().clamp(0.0, 100.0) as u8
}

fn valid_sub_score(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
}

fn build(
    depth: f64,
    breadth: f64,
    self_correction: f64,
    independence: f64,
    supplied_overall: Option<f64>,
    feedback: &str,
) -> FinalScore {
    // A supplied overall in range is trusted; otherwise derive it.
    let overall = match valid_sub_score(supplied_overall) {
        Some(value) => value.round() as u8,
        None => weighted_overall(depth, breadth, self_correction, independence),
    };
    let feedback = if feedback.trim().is_empty() {
        NEUTRAL_FEEDBACK.to_string()
    } else {
        feedback.trim().to_string()
    };
    FinalScore {
        depth: depth.round() as u8,
        breadth: breadth.round() as u8,
        self_correction: self_correction.round() as u8,
        independence: independence.round() as u8,
        overall,
        feedback,
    }
}

/// Validate an end-of-session score block. `None` when any sub-score is
/// missing or out of range — the caller then falls back to re-evaluation.
pub fn from_score_block(block: &ScoreBlock) -> Option<FinalScore> {
    let depth = valid_sub_score(block.depth)?;
    let breadth = valid_sub_score(block.breadth)?;
    let self_correction = valid_sub_score(block.self_correction)?;
    let independence = valid_sub_score(block.independence)?;
    Some(build(
        depth,
        breadth,
        self_correction,
        independence,
        block.overall,
        &block.feedback,
    ))
}

/// Validate the final-scores object of a scoring-phase metadata block.
pub fn from_metadata_scores(scores: &FinalScoreBlock, feedback: &str) -> Option<FinalScore> {
    let depth = valid_sub_score(scores.reasoning_depth)?;
    let breadth = valid_sub_score(scores.disciplinary_breadth)?;
    let self_correction = valid_sub_score(scores.self_correction)?;
    let independence = valid_sub_score(scores.independence)?;
    Some(build(
        depth,
        breadth,
        self_correction,
        independence,
        scores.overall,
        feedback,
    ))
}

/// Defined fallback when no usable score exists: midpoint sub-scores and
/// generic feedback. Scoring never errors out.
pub fn neutral_fallback() -> FinalScore {
    FinalScore {
        depth: 50,
        breadth: 50,
        self_correction: 50,
        independence: 50,
        overall: 50,
        feedback: NEUTRAL_FEEDBACK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(depth: f64, breadth: f64, self_correction: f64, independence: f64) -> ScoreBlock {
        ScoreBlock {
            depth: Some(depth),
            breadth: Some(breadth),
            self_correction: Some(self_correction),
            independence: Some(independence),
            overall: None,
            feedback: "Solid cross-disciplinary work.".to_string(),
        }
    }

    #[test]
    fn weighted_overall_matches_reference_case() {
        // round(72*0.3 + 58*0.25 + 81*0.25 + 65*0.2) = round(69.35) = 69
        assert_eq!(weighted_overall(72.0, 58.0, 81.0, 65.0), 69);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let first = from_score_block(&block(72.0, 58.0, 81.0, 65.0)).expect("valid block");
        let second = from_score_block(&block(72.0, 58.0, 81.0, 65.0)).expect("valid block");
        assert_eq!(first, second);
        assert_eq!(first.overall, 69);
    }

    #[test]
    fn supplied_overall_is_trusted() {
        let mut b = block(72.0, 58.0, 81.0, 65.0);
        b.overall = Some(75.0);
        let score = from_score_block(&b).expect("valid block");
        assert_eq!(score.overall, 75);
    }

    #[test]
    fn out_of_range_supplied_overall_is_recomputed() {
        let mut b = block(72.0, 58.0, 81.0, 65.0);
        b.overall = Some(420.0);
        let score = from_score_block(&b).expect("valid block");
        assert_eq!(score.overall, 69);
    }

    #[test]
    fn missing_sub_score_invalidates_the_block() {
        let mut b = block(72.0, 58.0, 81.0, 65.0);
        b.breadth = None;
        assert!(from_score_block(&b).is_none());
    }

    #[test]
    fn out_of_range_sub_score_invalidates_the_block() {
        let mut b = block(72.0, 58.0, 81.0, 65.0);
        b.depth = Some(-3.0);
        assert!(from_score_block(&b).is_none());
    }

    #[test]
    fn neutral_fallback_is_midpoint() {
        let score = neutral_fallback();
        assert_eq!(score.depth, 50);
        assert_eq!(score.overall, 50);
        assert!(!score.feedback.is_empty());
    }

    #[test]
    fn metadata_final_scores_aggregate_the_same_way() {
        let scores = FinalScoreBlock {
            reasoning_depth: Some(72.0),
            disciplinary_breadth: Some(58.0),
            self_correction: Some(81.0),
            independence: Some(65.0),
            overall: None,
        };
        let score = from_metadata_scores(&scores, "").expect("valid scores");
        assert_eq!(score.overall, 69);
        assert_eq!(score.feedback, NEUTRAL_FEEDBACK);
    }
}
