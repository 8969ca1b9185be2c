use std::collections::HashMap;
use std::time::Duration;

/// Host-owned download slots, each with a mutable delay
///
/// Lookups miss while a slot has not been created yet; callers treat that as
/// a no-op, not an error.
pub trait SlotStore {
    /// Mutable access to the delay of the slot named `key`
    fn slot_delay_mut(&mut self, key: &str) -> Option<&mut Duration>;
}

/// Plain map-backed slot store
#[derive(Debug, Clone, Default)]
pub struct DownloadSlots {
    slots: HashMap<String, Duration>,
    default_delay: Duration,
}

impl DownloadSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots created through [`DownloadSlots::ensure`] start at `delay`
    pub fn with_default_delay(delay: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            default_delay: delay,
        }
    }

    /// Create the slot if it does not exist yet
    pub fn ensure(&mut self, key: &str) {
        let default = self.default_delay;
        self.slots.entry(key.to_string()).or_insert(default);
    }

    pub fn insert(&mut self, key: impl Into<String>, delay: Duration) {
        self.slots.insert(key.into(), delay);
    }

    pub fn delay(&self, key: &str) -> Option<Duration> {
        self.slots.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SlotStore for DownloadSlots {
    fn slot_delay_mut(&mut self, key: &str) -> Option<&mut Duration> {
        self.slots.get_mut(key)
    }
}

impl SlotStore for HashMap<String, Duration> {
    fn slot_delay_mut(&mut self, key: &str) -> Option<&mut Duration> {
        self.get_mut(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_slots_ensure_uses_default() {
        let mut slots = DownloadSlots::with_default_delay(Duration::from_secs(2));
        assert!(slots.slot_delay_mut("a.example").is_none());

        slots.ensure("a.example");
        assert_eq!(slots.delay("a.example"), Some(Duration::from_secs(2)));

        // ensure never resets an existing slot
        slots.insert("a.example", Duration::from_secs(9));
        slots.ensure("a.example");
        assert_eq!(slots.delay("a.example"), Some(Duration::from_secs(9)));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_hash_map_slot_store() {
        let mut slots: HashMap<String, Duration> = HashMap::new();
        slots.insert("b.example".to_string(), Duration::ZERO);

        *slots.slot_delay_mut("b.example").unwrap() = Duration::from_millis(500);
        assert_eq!(slots["b.example"], Duration::from_millis(500));
        assert!(slots.slot_delay_mut("missing").is_none());
    }
}
