use crate::ResourceId;
use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use std::time::Duration;

/// Truncated exponential requeue delays, tracked per object.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ResourceId, u32>>,
}

// === impl Backoff ===

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn failed(&self, id: &ResourceId) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(id.clone()).or_default();
        let delay = self
            .base
            .checked_mul(1u32.checked_shl(*count).unwrap_or(u32::MAX))
            .map_or(self.max, |d| d.min(self.max));
        *count = count.saturating_add(1);
        delay
    }

    pub fn reset(&self, id: &ResourceId) {
        self.failures.lock().remove(id);
    }
}
