//! Cleanup of raw engine output before it reaches the stability tracker.
//!
//! Speech models emit stock phrases on silence or music ("Thank you.",
//! "(music)") and bracketed annotations mid-sentence. Both are stripped
//! here so downstream tracking only ever sees words the user said.

/// Remove square-bracket annotation spans such as "[BLANK_AUDIO]".
///
/// Matching is non-greedy: each "[" closes at the nearest "]". An
/// unterminated bracket is left in place.
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        match rest[open..].find(']') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Filter for non-speech phrases that engines hallucinate on quiet audio.
///
/// A pass whose entire content matches a known phrase is dropped outright;
/// a phrase embedded in real speech is left alone.
#[derive(Debug, Clone)]
pub struct HallucinationFilter {
    phrases: Vec<String>,
}

impl Default for HallucinationFilter {
    fn default() -> Self {
        Self::new(
            [
                "(music)",
                "(Music)",
                "[Music]",
                "(silence)",
                "(Silence)",
                "Thank you.",
                "Thanks for watching!",
                "Subscribe",
                "[BLANK_AUDIO]",
                "(BLANK_AUDIO)",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl HallucinationFilter {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    /// Strip annotations, collapse whitespace, and drop sole-content
    /// hallucinations. Returns an empty string for a dropped pass.
    pub fn clean(&self, text: &str) -> String {
        let stripped = strip_annotations(text);
        let normalized = normalize_whitespace(&stripped);
        if self.phrases.iter().any(|p| p == &normalized) {
            tracing::debug!(text = %normalized, "dropping hallucinated pass");
            return String::new();
        }
        normalized
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bracketed_spans() {
        assert_eq!(strip_annotations("hello [noise] world"), "hello  world");
        assert_eq!(strip_annotations("[BLANK_AUDIO]"), "");
        assert_eq!(strip_annotations("a [x] b [y] c"), "a  b  c");
    }

    #[test]
    fn test_unterminated_bracket_kept() {
        assert_eq!(strip_annotations("hello [world"), "hello [world");
    }

    #[test]
    fn test_nested_bracket_closes_at_nearest() {
        // Each "[" closes at the nearest "]".
        assert_eq!(strip_annotations("[a[b]c]"), "c]");
    }

    #[test]
    fn test_sole_content_hallucination_dropped() {
        let filter = HallucinationFilter::default();
        assert_eq!(filter.clean("Thank you."), "");
        assert_eq!(filter.clean("  (music)  "), "");
        assert_eq!(filter.clean("(BLANK_AUDIO)"), "");
    }

    #[test]
    fn test_embedded_phrase_survives() {
        let filter = HallucinationFilter::default();
        assert_eq!(
            filter.clean("I said Thank you. to her"),
            "I said Thank you. to her"
        );
    }

    #[test]
    fn test_annotation_stripped_from_real_speech() {
        let filter = HallucinationFilter::default();
        assert_eq!(
            filter.clean("send the report [typing] by Friday"),
            "send the report by Friday"
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        let filter = HallucinationFilter::default();
        assert_eq!(filter.clean("  hello   world \n"), "hello world");
    }

    #[test]
    fn test_stripping_can_expose_hallucination() {
        // After the bracket span goes, only a known phrase remains.
        let filter = HallucinationFilter::default();
        assert_eq!(filter.clean("[Music] Thank you."), "");
    }

    #[test]
    fn test_custom_phrase_list() {
        let filter = HallucinationFilter::new(vec!["nope".to_string()]);
        assert_eq!(filter.clean("nope"), "");
        assert_eq!(filter.clean("Thank you."), "Thank you.");
    }
}
