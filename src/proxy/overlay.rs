//! Temporary per-slot delay overrides
//!
//! Remembers the delay a slot had before the first override so it can be put
//! back exactly once. Repeated overrides keep extending the slowdown without
//! touching the remembered original.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::models::SlotStore;

#[derive(Debug, Default)]
pub struct SlotDelayOverlay {
    /// Original delay per slot; an entry exists only while an override is active
    saved: HashMap<String, Duration>,
}

impl SlotDelayOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slot's delay to `delay`, saving the original on the first override
    ///
    /// Missing slots are ignored.
    pub fn apply_override(&mut self, slots: &mut dyn SlotStore, key: &str, delay: Duration) {
        let Some(slot_delay) = slots.slot_delay_mut(key) else {
            return;
        };

        if !self.saved.contains_key(key) {
            self.saved.insert(key.to_string(), *slot_delay);
        }
        debug!(slot = key, delay_secs = delay.as_secs_f64(), "Overriding slot delay");
        *slot_delay = delay;
    }

    /// Put back the saved delay if an override is active; otherwise do nothing
    pub fn restore_if_overridden(&mut self, slots: &mut dyn SlotStore, key: &str) {
        let Some(slot_delay) = slots.slot_delay_mut(key) else {
            return;
        };

        if let Some(original) = self.saved.remove(key) {
            debug!(slot = key, delay_secs = original.as_secs_f64(), "Restoring slot delay");
            *slot_delay = original;
        }
    }

    pub fn is_overridden(&self, key: &str) -> bool {
        self.saved.contains_key(key)
    }

    /// Delay that will be restored for `key`, if overridden
    pub fn saved_delay(&self, key: &str) -> Option<Duration> {
        self.saved.get(key).copied()
    }
}
