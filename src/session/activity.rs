//! Bounded, shareable log of intermediate session activity

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::event::Activity;

/// Activity entries kept for diagnostics when no capacity is configured
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 64;

/// Ring buffer of the most recent [`Activity`] entries of one session
///
/// Clones share the same buffer, so the pool can read what a session is
/// doing while its driver lives inside the collector task.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Arc<Mutex<VecDeque<Activity>>>,
    capacity: usize,
}

impl ActivityLog {
    /// Log keeping at most `capacity` entries; zero keeps nothing
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(
                capacity.min(DEFAULT_ACTIVITY_CAPACITY),
            ))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn push(&self, activity: Activity) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(activity);
    }

    /// Copy of the current entries, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Activity> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}
