//! Character-level prefix diff between on-screen and target text.

/// Prefix-anchored edit turning one string into another: keep the common
/// prefix, delete everything after it, type the new suffix.
///
/// Counts are in characters, not bytes, so a multi-byte character is one
/// backspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    /// Characters shared with the previous text, left untouched.
    pub keep_chars: usize,
    /// Characters to delete from the end of the previous text.
    pub delete_chars: usize,
    /// Suffix of the target to type after deleting.
    pub insert: String,
}

impl EditPlan {
    pub fn is_noop(&self) -> bool {
        self.delete_chars == 0 && self.insert.is_empty()
    }
}

/// Compute the minimal prefix-anchored edit from `previous` to `target`.
pub fn plan_edit(previous: &str, target: &str) -> EditPlan {
    let mut keep_chars = 0;
    let mut prefix_bytes = 0;
    let mut prev_chars = previous.chars();
    let mut target_chars = target.chars();
    loop {
        match (prev_chars.next(), target_chars.next()) {
            (Some(a), Some(b)) if a == b => {
                keep_chars += 1;
                prefix_bytes += a.len_utf8();
            }
            _ => break,
        }
    }

    EditPlan {
        keep_chars,
        delete_chars: previous.chars().count() - keep_chars,
        insert: target[prefix_bytes..].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_noop() {
        let plan = plan_edit("hello world", "hello world");
        assert!(plan.is_noop());
        assert_eq!(plan.keep_chars, 11);
    }

    #[test]
    fn test_pure_append() {
        let plan = plan_edit("hello wor", "hello world");
        assert_eq!(plan.delete_chars, 0);
        assert_eq!(plan.insert, "ld");
    }

    #[test]
    fn test_suffix_replacement() {
        let plan = plan_edit("hello word", "hello world");
        assert_eq!(plan.keep_chars, 9);
        assert_eq!(plan.delete_chars, 1);
        assert_eq!(plan.insert, "rld");
    }

    #[test]
    fn test_from_empty() {
        let plan = plan_edit("", "hello");
        assert_eq!(plan.delete_chars, 0);
        assert_eq!(plan.insert, "hello");
    }

    #[test]
    fn test_to_empty() {
        let plan = plan_edit("hello", "");
        assert_eq!(plan.delete_chars, 5);
        assert_eq!(plan.insert, "");
    }

    #[test]
    fn test_no_common_prefix() {
        let plan = plan_edit("abc", "xyz");
        assert_eq!(plan.keep_chars, 0);
        assert_eq!(plan.delete_chars, 3);
        assert_eq!(plan.insert, "xyz");
    }

    #[test]
    fn test_multibyte_counted_as_single_chars() {
        // "café" -> "cafés": é is two bytes but zero deletes, one insert.
        let plan = plan_edit("café", "cafés");
        assert_eq!(plan.keep_chars, 4);
        assert_eq!(plan.delete_chars, 0);
        assert_eq!(plan.insert, "s");
    }

    #[test]
    fn test_multibyte_deletion() {
        let plan = plan_edit("día", "dia");
        assert_eq!(plan.keep_chars, 1);
        // "ía" replaced by "ia": two backspaces, not three bytes.
        assert_eq!(plan.delete_chars, 2);
        assert_eq!(plan.insert, "ia");
    }

    #[test]
    fn test_cjk_and_emoji() {
        let plan = plan_edit("你好", "你好👋");
        assert_eq!(plan.delete_chars, 0);
        assert_eq!(plan.insert, "👋");

        let plan = plan_edit("口述🎤中", "口述中");
        assert_eq!(plan.keep_chars, 2);
        assert_eq!(plan.delete_chars, 2);
        assert_eq!(plan.insert, "中");
    }

    #[test]
    fn test_plan_replays_to_target() {
        let cases = [
            ("", "hello"),
            ("hello", "help"),
            ("aéb你c", "aéb你d"),
            ("same", "same"),
            ("one two three", "one two four"),
        ];
        for (previous, target) in cases {
            let plan = plan_edit(previous, target);
            let kept: String = previous.chars().take(plan.keep_chars).collect();
            let replayed = format!("{kept}{}", plan.insert);
            assert_eq!(replayed, target, "from {previous:?}");
            assert_eq!(
                plan.keep_chars + plan.delete_chars,
                previous.chars().count(),
                "from {previous:?}"
            );
        }
    }
}
