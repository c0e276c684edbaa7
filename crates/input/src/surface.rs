use std::thread;
use std::time::Duration;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::{InputError, Result};

/// Keystroke sink the injector writes through.
///
/// Edits apply at whatever holds input focus in the host environment; the
/// injector has no way to observe the field, so it assumes nothing moved
/// the cursor between calls. Failures are reported per call and are never
/// fatal to the pipeline.
pub trait InjectionSurface: Send {
    /// Delete `count` characters behind the cursor.
    fn delete(&mut self, count: usize) -> Result<()>;

    /// Type `text` at the cursor.
    fn insert(&mut self, text: &str) -> Result<()>;
}

const DEFAULT_TYPE_DELAY_MS: u64 = 2;
const DEFAULT_DELETE_DELAY_MS: u64 = 1;

/// enigo-backed surface typing into the focused application.
///
/// Characters go out one at a time with a short pause between keystrokes;
/// some toolkits drop events that arrive faster than a human could type.
pub struct EnigoSurface {
    enigo: Enigo,
    type_delay: Duration,
    delete_delay: Duration,
}

impl EnigoSurface {
    pub fn new() -> Result<Self> {
        Self::with_delays(DEFAULT_TYPE_DELAY_MS, DEFAULT_DELETE_DELAY_MS)
    }

    pub fn with_delays(type_delay_ms: u64, delete_delay_ms: u64) -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InputError::InitFailed(e.to_string()))?;
        Ok(Self {
            enigo,
            type_delay: Duration::from_millis(type_delay_ms),
            delete_delay: Duration::from_millis(delete_delay_ms),
        })
    }
}

impl InjectionSurface for EnigoSurface {
    fn delete(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.enigo
                .key(Key::Backspace, Direction::Click)
                .map_err(|e| InputError::KeyFailed(e.to_string()))?;
            if !self.delete_delay.is_zero() {
                thread::sleep(self.delete_delay);
            }
        }
        Ok(())
    }

    fn insert(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            self.enigo
                .text(&ch.to_string())
                .map_err(|e| InputError::TypeFailed(e.to_string()))?;
            if !self.type_delay.is_zero() {
                thread::sleep(self.type_delay);
            }
        }
        Ok(())
    }
}
