//! Flatten extracted fragments into a single story string.
//!
//! The spiders pull each paragraph's direct text nodes, which carry layout
//! whitespace from the page markup. Normalization joins everything with a
//! single space and strips the known whitespace artifacts, nothing more.

use crate::models::{Fragment, NormalizedStory, RawExtraction};
use crate::tagger;
use chrono::{DateTime, Utc};

/// Artifact substrings and their replacements, applied in this order.
///
/// Each pass runs over the output of the previous one.
pub const ARTIFACT_REPLACEMENTS: [(&str, &str); 3] = [("\n\t ", ""), ("\t ", ""), ("\n ", "")];

/// Join the text chunks of every fragment and strip layout artifacts.
///
/// Skipped fragments contribute nothing. Empty input yields an empty string.
pub fn normalize_text(fragments: &[Fragment]) -> String {
    let joined = fragments
        .iter()
        .filter_map(|f| match f {
            Fragment::Text(chunks) => Some(chunks.iter()),
            Fragment::Skipped { .. } => None,
        })
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    ARTIFACT_REPLACEMENTS
        .iter()
        .fold(joined, |text, (pattern, replacement)| text.replace(pattern, replacement))
}

/// Turn fragments into a [`NormalizedStory`], tagging it along the way.
pub fn normalize(fragments: &[Fragment], captured_at: DateTime<Utc>) -> NormalizedStory {
    let text = normalize_text(fragments);
    let tags = tagger::tag(&text);
    let skipped_fragments = fragments
        .iter()
        .filter(|f| matches!(f, Fragment::Skipped { .. }))
        .count();

    NormalizedStory {
        text,
        captured_at,
        tags,
        skipped_fragments,
    }
}

impl From<&RawExtraction> for NormalizedStory {
    fn from(extraction: &RawExtraction) -> Self {
        normalize(&extraction.fragments, extraction.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frags(parts: &[&[&str]]) -> Vec<Fragment> {
        parts.iter().map(|p| Fragment::text(p.iter().copied())).collect()
    }

    #[test]
    fn test_join_preserves_spaces() {
        let fragments = frags(&[&["Residents of "], &["Back Bay"], &[" reported flooding."]]);
        assert_eq!(
            normalize_text(&fragments),
            "Residents of  Back Bay  reported flooding."
        );
    }

    #[test]
    fn test_flattens_nested_chunks_in_order() {
        let fragments = frags(&[&["a", "b"], &["c"]]);
        assert_eq!(normalize_text(&fragments), "a b c");
    }

    #[test]
    fn test_strips_artifacts() {
        let fragments = frags(&[&["One\n\t two", "three\t four\n five"]]);
        assert_eq!(normalize_text(&fragments), "Onetwo threefourfive");
    }

    #[test]
    fn test_replacements_are_sequential() {
        // "\t " first would leave a bare "\n" behind.
        assert_eq!(normalize_text(&frags(&[&["a\n\t b"]])), "ab");

        // The last pass sees what the first pass exposed.
        assert_eq!(normalize_text(&frags(&[&["a\n\t \n  b"]])), "a b");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(&[]), "");
        assert_eq!(normalize_text(&frags(&[&[]])), "");
    }

    #[test]
    fn test_skipped_fragments_are_counted_not_joined() {
        let fragments = vec![
            Fragment::text(["Fire in"]),
            Fragment::Skipped {
                reason: "no direct text".to_string(),
            },
            Fragment::text(["Mattapan"]),
        ];
        let story = normalize(&fragments, Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(story.text, "Fire in Mattapan");
        assert_eq!(story.skipped_fragments, 1);
        assert_eq!(story.tags, vec!["Mattapan".to_string()]);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let fragments = frags(&[&["North End\n feast"], &["\t in Chinatown"]]);
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(normalize(&fragments, at), normalize(&fragments, at));
    }

    #[test]
    fn test_from_raw_extraction() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let extraction = RawExtraction::new(
            "https://www.wgbh.org/news/local-news/story",
            frags(&[&["Residents of "], &["Back Bay"], &[" reported flooding."]]),
            at,
        );
        let story = NormalizedStory::from(&extraction);
        assert_eq!(story.captured_at, at);
        assert_eq!(story.tags, vec!["Back Bay".to_string()]);
    }
}
