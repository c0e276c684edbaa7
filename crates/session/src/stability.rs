//! Token stability tracking across transcription passes.
//!
//! Each pass re-transcribes an overlapping window, so early words keep
//! reappearing while the tail is still in flux. A token only commits once
//! it has held the same position with the same text for enough consecutive
//! passes. Committed text is strictly append-only for the life of a
//! session; only the tentative suffix is ever replaced.

/// A token seen in the latest hypothesis, not yet committed.
#[derive(Debug, Clone)]
struct TrackedToken {
    text: String,
    /// Consecutive passes this token held its position unchanged.
    matches: u8,
}

/// What one observed pass did to the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Text promoted to committed by this pass, if any.
    pub committed_delta: Option<String>,
    /// Committed text followed by the tentative tail, space-joined. This
    /// is what belongs on screen after the pass.
    pub full_text: String,
    /// Tentative tokens still unpromoted after this pass.
    pub tentative_tokens: usize,
}

/// Decides which hypothesis tokens are stable enough to lock in.
#[derive(Debug)]
pub struct StabilityTracker {
    threshold: u8,
    committed: String,
    tentative: Vec<TrackedToken>,
    /// Committed tokens whose audio is still inside the current window.
    /// The engine re-transcribes them every pass; the same count of
    /// leading hypothesis tokens is skipped before alignment.
    committed_in_window: usize,
}

impl StabilityTracker {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.max(1),
            committed: String::new(),
            tentative: Vec::new(),
            committed_in_window: 0,
        }
    }

    pub fn committed_text(&self) -> &str {
        &self.committed
    }

    pub fn tentative_text(&self) -> String {
        self.tentative
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Committed plus tentative, single-space joined.
    pub fn full_text(&self) -> String {
        let tail = self.tentative_text();
        if self.committed.is_empty() {
            tail
        } else if tail.is_empty() {
            self.committed.clone()
        } else {
            format!("{} {}", self.committed, tail)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.tentative.is_empty()
    }

    /// Observe one pass over the current window.
    ///
    /// A terminal pass (utterance end or session stop) promotes every
    /// remaining tentative token; no further refinement is coming.
    pub fn observe(&mut self, pass: u64, hypothesis: &str, terminal: bool) -> PassOutcome {
        let tokens: Vec<&str> = hypothesis.split_whitespace().collect();

        // The engine re-transcribes committed audio every pass; skip the
        // tokens that cover it.
        let fresh: &[&str] = if tokens.len() > self.committed_in_window {
            &tokens[self.committed_in_window..]
        } else {
            &[]
        };

        if tokens.is_empty() && !self.tentative.is_empty() {
            if terminal {
                tracing::warn!(pass, "empty terminal hypothesis, promoting tracked tokens");
                return self.finalize_pending();
            }
            // A transient engine glitch; wiping tracked words over it
            // would make text visibly vanish mid-utterance.
            tracing::warn!(
                pass,
                tracked = self.tentative.len(),
                "ignoring empty hypothesis, keeping tracked tokens"
            );
            return self.outcome(None);
        }
        if fresh.is_empty() && terminal && !self.tentative.is_empty() {
            return self.finalize_pending();
        }

        // Positional alignment against the previous tentative tail. The
        // first mismatch resets everything after it: a token that drifted
        // and came back has not been stable.
        let old_len = self.tentative.len();
        let mut next = Vec::with_capacity(fresh.len());
        let mut diverged = false;
        let mut matched = 0usize;
        for (i, &text) in fresh.iter().enumerate() {
            let held = !diverged
                && self
                    .tentative
                    .get(i)
                    .map(|t| t.text == text)
                    .unwrap_or(false);
            if held {
                matched += 1;
                next.push(TrackedToken {
                    text: text.to_string(),
                    matches: self.tentative[i].matches.saturating_add(1),
                });
            } else {
                diverged = true;
                next.push(TrackedToken {
                    text: text.to_string(),
                    matches: 1,
                });
            }
        }
        // A shorter hypothesis truncates the tail implicitly.
        self.tentative = next;

        let promote = if terminal {
            self.tentative.len()
        } else {
            self.tentative
                .iter()
                .take_while(|t| t.matches >= self.threshold)
                .count()
        };
        let delta = self.promote(promote);

        tracing::debug!(
            pass,
            old_tracked = old_len,
            matched,
            fresh = fresh.len(),
            promoted = promote,
            terminal,
            "pass observed"
        );

        self.outcome(delta)
    }

    /// Promote everything currently tentative without a new hypothesis,
    /// for a terminal boundary where the engine produced nothing usable.
    pub fn finalize_pending(&mut self) -> PassOutcome {
        let delta = self.promote(self.tentative.len());
        self.outcome(delta)
    }

    /// The audio window was cleared after finalizing an utterance:
    /// committed text stands, but the next hypothesis starts from scratch.
    pub fn begin_utterance(&mut self) {
        self.committed_in_window = 0;
        self.tentative.clear();
    }

    /// Full reset for a new session. Committed text is discarded.
    pub fn reset(&mut self) {
        self.committed.clear();
        self.tentative.clear();
        self.committed_in_window = 0;
    }

    fn promote(&mut self, count: usize) -> Option<String> {
        if count == 0 {
            return None;
        }
        let words: Vec<String> = self.tentative.drain(..count).map(|t| t.text).collect();
        let delta = words.join(" ");
        if !self.committed.is_empty() {
            self.committed.push(' ');
        }
        self.committed.push_str(&delta);
        self.committed_in_window += count;
        Some(delta)
    }

    fn outcome(&self, committed_delta: Option<String>) -> PassOutcome {
        PassOutcome {
            committed_delta,
            full_text: self.full_text(),
            tentative_tokens: self.tentative.len(),
        }
    }
}
