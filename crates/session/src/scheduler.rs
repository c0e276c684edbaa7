use std::time::{Duration, Instant};

/// Fixed-rate schedule for inference passes.
///
/// Schedule points are anchored to the last due point, not to when work
/// finished, so a slow pass does not push the whole grid. Points that fall
/// due while a pass is still running are dropped, never queued: `poll`
/// coalesces everything overdue into a single tick and counts the rest as
/// skipped.
#[derive(Debug)]
pub struct Cadence {
    period: Duration,
    next_due: Instant,
    next_pass: u64,
    skipped: u64,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    pub fn starting_at(period: Duration, now: Instant) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            next_due: now + period,
            next_pass: 1,
            skipped: 0,
        }
    }

    /// Time remaining until the next schedule point.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Consume all due schedule points. Returns true when at least one was
    /// due; overdue extras are dropped and counted.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        let mut due = 0u64;
        while self.next_due <= now {
            self.next_due += self.period;
            due += 1;
        }
        if due > 1 {
            self.skipped += due - 1;
            tracing::debug!(
                dropped = due - 1,
                total_skipped = self.skipped,
                "schedule points dropped while busy"
            );
        }
        true
    }

    /// Monotonic pass id for the next inference call.
    pub fn next_pass_id(&mut self) -> u64 {
        let id = self.next_pass;
        self.next_pass += 1;
        id
    }

    /// Total schedule points dropped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Re-anchor the schedule and restart pass numbering, for a new
    /// recording session.
    pub fn restart(&mut self, now: Instant) {
        self.next_due = now + self.period;
        self.next_pass = 1;
        self.skipped = 0;
    }
}

/// Why a due schedule point did not turn into an inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No speech since the last consumed boundary.
    NoSpeech,
    /// Window shorter than the configured minimum.
    WindowTooShort,
}

/// Gate applied to each due tick before calling the engine.
pub fn evaluate_gate(
    speech_pending: bool,
    window_samples: usize,
    min_samples: usize,
) -> Option<SkipReason> {
    if !speech_pending {
        return Some(SkipReason::NoSpeech);
    }
    if window_samples < min_samples {
        return Some(SkipReason::WindowTooShort);
    }
    None
}
