use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::diff::plan_edit;
use crate::{InjectionSurface, Result};

/// Behavior knobs for [`DiffInjector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorOptions {
    /// Maximum non-forced updates per second. 0 disables the throttle.
    pub max_updates_per_sec: u32,
    /// Largest delete run a non-forced update may issue. 0 disables the
    /// cap. An oversized delete usually means the hypothesis flipped and
    /// will flip back; skipping avoids visibly chewing through text.
    pub max_delete_burst: usize,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        Self {
            max_updates_per_sec: 4,
            max_delete_burst: 30,
        }
    }
}

/// Keeps the focused application's text in sync with the pipeline's view
/// by issuing minimal delete/type edits.
///
/// The injector trusts its own record of what it typed; nothing else may
/// edit the field mid-session. After a surface failure that record is
/// dropped, so the next successful update retypes from scratch rather
/// than guessing how much of the edit landed.
pub struct DiffInjector {
    surface: Box<dyn InjectionSurface>,
    options: InjectorOptions,
    last_injected: String,
    last_update: Option<Instant>,
}

impl DiffInjector {
    pub fn new(surface: Box<dyn InjectionSurface>, options: InjectorOptions) -> Self {
        Self {
            surface,
            options,
            last_injected: String::new(),
            last_update: None,
        }
    }

    /// Text the injector believes is on screen.
    pub fn last_injected(&self) -> &str {
        &self.last_injected
    }

    /// Bring the on-screen text to `target`.
    ///
    /// Returns Ok(true) when the surface now matches `target` (including
    /// the no-edit case), Ok(false) when the update was skipped by the
    /// throttle or the delete cap. A surface error aborts the remaining
    /// edits and resets the on-screen record to empty.
    pub fn update(&mut self, target: &str, force: bool) -> Result<bool> {
        let plan = plan_edit(&self.last_injected, target);
        if plan.is_noop() {
            return Ok(true);
        }

        if !force {
            if let Some(last) = self.last_update {
                let min_interval = min_interval(self.options.max_updates_per_sec);
                if !min_interval.is_zero() && last.elapsed() < min_interval {
                    tracing::trace!("update throttled");
                    return Ok(false);
                }
            }
            if self.options.max_delete_burst > 0 && plan.delete_chars > self.options.max_delete_burst
            {
                tracing::debug!(
                    deletes = plan.delete_chars,
                    cap = self.options.max_delete_burst,
                    "skipping oversized delete burst"
                );
                return Ok(false);
            }
        }

        if plan.delete_chars > 0 {
            if let Err(e) = self.surface.delete(plan.delete_chars) {
                self.desync();
                return Err(e);
            }
        }
        if !plan.insert.is_empty() {
            if let Err(e) = self.surface.insert(&plan.insert) {
                self.desync();
                return Err(e);
            }
        }

        tracing::debug!(
            kept = plan.keep_chars,
            deleted = plan.delete_chars,
            inserted = plan.insert.chars().count(),
            "edit injected"
        );
        self.last_injected = target.to_string();
        self.last_update = Some(Instant::now());
        Ok(true)
    }

    /// Forget the on-screen record, e.g. when a new session begins in a
    /// different field.
    pub fn reset(&mut self) {
        self.last_injected.clear();
        self.last_update = None;
    }

    fn desync(&mut self) {
        // The edit may have landed partially; assume nothing is on screen
        // so the next pass rebuilds the text in full.
        self.last_injected.clear();
        self.last_update = None;
    }
}

fn min_interval(max_updates_per_sec: u32) -> Duration {
    if max_updates_per_sec == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(1000 / max_updates_per_sec as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Delete(usize),
        Insert(String),
    }

    #[derive(Default)]
    struct Recorder {
        ops: Arc<Mutex<Vec<Op>>>,
        fail_next: Arc<AtomicBool>,
    }

    struct RecordingSurface {
        ops: Arc<Mutex<Vec<Op>>>,
        fail_next: Arc<AtomicBool>,
    }

    impl Recorder {
        fn surface(&self) -> RecordingSurface {
            RecordingSurface {
                ops: self.ops.clone(),
                fail_next: self.fail_next.clone(),
            }
        }

        fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.ops.lock().unwrap().clear();
        }
    }

    impl RecordingSurface {
        fn check_failure(&self) -> crate::Result<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(InputError::TypeFailed("injected failure".into()));
            }
            Ok(())
        }
    }

    impl InjectionSurface for RecordingSurface {
        fn delete(&mut self, count: usize) -> crate::Result<()> {
            self.check_failure()?;
            self.ops.lock().unwrap().push(Op::Delete(count));
            Ok(())
        }

        fn insert(&mut self, text: &str) -> crate::Result<()> {
            self.check_failure()?;
            self.ops.lock().unwrap().push(Op::Insert(text.to_string()));
            Ok(())
        }
    }

    fn injector(recorder: &Recorder, options: InjectorOptions) -> DiffInjector {
        DiffInjector::new(Box::new(recorder.surface()), options)
    }

    fn unthrottled() -> InjectorOptions {
        InjectorOptions {
            max_updates_per_sec: 0,
            max_delete_burst: 0,
        }
    }

    #[test]
    fn test_first_update_types_everything() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        assert!(inj.update("hello", false).unwrap());
        assert_eq!(recorder.ops(), vec![Op::Insert("hello".into())]);
        assert_eq!(inj.last_injected(), "hello");
    }

    #[test]
    fn test_refinement_types_only_suffix() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        inj.update("hello wor", false).unwrap();
        recorder.clear();

        inj.update("hello world", false).unwrap();
        assert_eq!(recorder.ops(), vec![Op::Insert("ld".into())]);
    }

    #[test]
    fn test_divergence_deletes_then_inserts() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        inj.update("hello word", false).unwrap();
        recorder.clear();

        inj.update("hello world", false).unwrap();
        assert_eq!(
            recorder.ops(),
            vec![Op::Delete(1), Op::Insert("rld".into())]
        );
    }

    #[test]
    fn test_repeat_target_is_noop() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        inj.update("same text", false).unwrap();
        recorder.clear();

        assert!(inj.update("same text", false).unwrap());
        assert!(recorder.ops().is_empty());
    }

    #[test]
    fn test_throttle_skips_rapid_updates() {
        let recorder = Recorder::default();
        let mut inj = injector(
            &recorder,
            InjectorOptions {
                max_updates_per_sec: 4,
                max_delete_burst: 0,
            },
        );
        assert!(inj.update("a", false).unwrap());
        // Immediately after: inside the 250ms window.
        assert!(!inj.update("ab", false).unwrap());
        assert_eq!(inj.last_injected(), "a");
        // Forced updates bypass the throttle.
        assert!(inj.update("ab", true).unwrap());
        assert_eq!(inj.last_injected(), "ab");
    }

    #[test]
    fn test_throttle_window_expires() {
        let recorder = Recorder::default();
        let mut inj = injector(
            &recorder,
            InjectorOptions {
                max_updates_per_sec: 100,
                max_delete_burst: 0,
            },
        );
        inj.update("a", false).unwrap();
        std::thread::sleep(Duration::from_millis(15));
        assert!(inj.update("ab", false).unwrap());
    }

    #[test]
    fn test_delete_cap_skips_unless_forced() {
        let recorder = Recorder::default();
        let mut inj = injector(
            &recorder,
            InjectorOptions {
                max_updates_per_sec: 0,
                max_delete_burst: 5,
            },
        );
        inj.update("abcdefghij", false).unwrap();
        recorder.clear();

        // Ten deletes exceed the cap of five.
        assert!(!inj.update("x", false).unwrap());
        assert!(recorder.ops().is_empty());
        assert_eq!(inj.last_injected(), "abcdefghij");

        assert!(inj.update("x", true).unwrap());
        assert_eq!(
            recorder.ops(),
            vec![Op::Delete(10), Op::Insert("x".into())]
        );
    }

    #[test]
    fn test_failure_resets_baseline_and_retypes() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        inj.update("hello world", false).unwrap();
        recorder.clear();

        recorder.fail_next.store(true, Ordering::SeqCst);
        assert!(inj.update("hello there", false).is_err());
        assert_eq!(inj.last_injected(), "");

        // Next pass rebuilds the whole text instead of diffing against a
        // surface state it no longer knows.
        inj.update("hello there", false).unwrap();
        assert_eq!(recorder.ops(), vec![Op::Insert("hello there".into())]);
    }

    #[test]
    fn test_reset_forgets_screen_state() {
        let recorder = Recorder::default();
        let mut inj = injector(&recorder, unthrottled());
        inj.update("first session", false).unwrap();
        inj.reset();
        recorder.clear();

        inj.update("second", false).unwrap();
        assert_eq!(recorder.ops(), vec![Op::Insert("second".into())]);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: InjectorOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_updates_per_sec, 4);
        assert_eq!(options.max_delete_burst, 30);
    }
}
