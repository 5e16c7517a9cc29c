//! Extraction of tagged metadata blocks from oracle text.
//!
//! The oracle embeds a per-turn `<metadata>` block and, at session end, a
//! `<score>` block inside its free-form reply. Both are a side channel for
//! the monitor: the student must never see a tag marker, no matter how many
//! blocks are present or how badly one is malformed. A block that fails to
//! parse degrades to "no metadata for this turn" — never a hard failure.

use std::sync::OnceLock;

use regex::Regex;

use crate::metadata::{ScoreBlock, TurnMetadata};

/// Result of splitting an oracle reply into its student-visible text and
/// the structured blocks it carried.
#[derive(Debug, Default)]
pub struct ParsedResponse {
    pub visible_text: String,
    pub metadata: Option<TurnMetadata>,
    pub score: Option<ScoreBlock>,
}

fn metadata_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<metadata>(.*?)</metadata>").expect("valid regex"))
}

fn score_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<score>(.*?)</score>").expect("valid regex"))
}

fn stray_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</?(metadata|score)>").expect("valid regex"))
}

fn parse_block<T: serde::de::DeserializeOwned>(kind: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body.trim()) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(block = kind, error = %err, "malformed tagged block, dropping");
            None
        }
    }
}

/// Find the byte offset of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

/// Split a raw oracle reply into visible text and structured blocks.
///
/// The first well-formed block of each kind wins. All paired blocks are
/// stripped; an unclosed opening tag truncates the text from that point
/// (everything after it is block payload, not prose); any leftover stray
/// markers are swept out last.
pub fn parse_oracle_response(raw: &str) -> ParsedResponse {
    let metadata = metadata_block_re()
        .captures(raw)
        .and_then(|c| parse_block::<TurnMetadata>("metadata", &c[1]));
    let score = score_block_re()
        .captures(raw)
        .and_then(|c| parse_block::<ScoreBlock>("score", &c[1]));

    let mut text = metadata_block_re().replace_all(raw, "").into_owned();
    text = score_block_re().replace_all(&text, "").into_owned();

    for opener in ["<metadata>", "<score>"] {
        if let Some(ix) = find_case_insensitive(&text, opener) {
            text.truncate(ix);
        }
    }
    let text = stray_marker_re().replace_all(&text, "");

    ParsedResponse {
        visible_text: text.trim().to_string(),
        metadata,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Phase;

    fn assert_no_markers(text: &str) {
        let lower = text.to_ascii_lowercase();
        for marker in ["<metadata>", "</metadata>", "<score>", "</score>"] {
            assert!(
                !lower.contains(marker),
                "visible text leaked marker {marker:?}: {text:?}"
            );
        }
    }

    #[test]
    fn extracts_metadata_and_strips_block() {
        let raw = "Good point.\n<metadata>{\"phase\":\"exploration\"}</metadata>";
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "Good point.");
        let meta = parsed.metadata.expect("metadata block should parse");
        assert_eq!(meta.phase, Some(Phase::Exploration));
        assert_no_markers(&parsed.visible_text);
    }

    #[test]
    fn plain_text_passes_through() {
        let parsed = parse_oracle_response("What happens next?");
        assert_eq!(parsed.visible_text, "What happens next?");
        assert!(parsed.metadata.is_none());
        assert!(parsed.score.is_none());
    }

    #[test]
    fn malformed_block_degrades_to_no_metadata() {
        let raw = "Keep going.\n<metadata>{not json at all</metadata>";
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "Keep going.");
        assert!(parsed.metadata.is_none());
        assert_no_markers(&parsed.visible_text);
    }

    #[test]
    fn unclosed_block_never_leaks_markers() {
        let raw = "Almost there.\n<metadata>{\"phase\":\"deepening\"";
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "Almost there.");
        assert!(parsed.metadata.is_none());
        assert_no_markers(&parsed.visible_text);
    }

    #[test]
    fn repeated_blocks_are_all_stripped_first_wins() {
        let raw = concat!(
            "One.<metadata>{\"phase\":\"exploration\"}</metadata>",
            " Two.<metadata>{\"phase\":\"synthesis\"}</metadata>",
        );
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "One. Two.");
        assert_eq!(
            parsed.metadata.expect("first block").phase,
            Some(Phase::Exploration)
        );
    }

    #[test]
    fn score_block_is_extracted_and_stripped() {
        let raw = concat!(
            "Well reasoned overall.\n",
            "<score>{\"depth\":72,\"breadth\":58,\"selfCorrection\":81,",
            "\"independence\":65,\"feedback\":\"Strong work.\"}</score>",
        );
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "Well reasoned overall.");
        let score = parsed.score.expect("score block should parse");
        assert_eq!(score.depth, Some(72.0));
        assert_eq!(score.self_correction, Some(81.0));
        assert_no_markers(&parsed.visible_text);
    }

    #[test]
    fn stray_closing_tag_is_swept() {
        let parsed = parse_oracle_response("Half a block.</metadata> And text after.");
        assert_eq!(parsed.visible_text, "Half a block. And text after.");
        assert_no_markers(&parsed.visible_text);
    }

    #[test]
    fn mixed_case_tags_are_recognized() {
        let raw = "Done.<METADATA>{\"phase\":\"scoring\"}</METADATA>";
        let parsed = parse_oracle_response(raw);
        assert_eq!(parsed.visible_text, "Done.");
        assert_eq!(
            parsed.metadata.expect("block parses").phase,
            Some(Phase::Scoring)
        );
    }
}
