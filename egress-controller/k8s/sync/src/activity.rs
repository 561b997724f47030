use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{Duration, Instant};

/// Records when a reconciliation last ran.
///
/// Readers tolerate stale values: a lost update at worst causes one redundant
/// sweep or one skipped sweep.
#[derive(Debug)]
pub struct Activity {
    epoch: Instant,
    // Milliseconds since `epoch`, offset by one so that zero means "never".
    last: AtomicU64,
}

// === impl Activity ===

impl Default for Activity {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
            last: AtomicU64::new(0),
        }
    }
}

impl Activity {
    pub fn touch(&self) {
        let millis = self.epoch.elapsed().as_millis() as u64;
        self.last.store(millis + 1, Ordering::Relaxed);
    }

    /// Time since the last recorded activity, if any was recorded.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.last.load(Ordering::Relaxed) {
            0 => None,
            last => {
                let at = self.epoch + Duration::from_millis(last - 1);
                Some(Instant::now().saturating_duration_since(at))
            }
        }
    }
}
