//! The global version clock: a single atomic counter shared by every key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_utils::CachePadded;
use dashmap::DashMap;

/// Allocates monotonically increasing versions and remembers when each one
/// was issued. The timestamp index is optional; when disabled,
/// [`GlobalVersionClock::timestamp`] always reports `None`.
pub struct GlobalVersionClock {
    counter: CachePadded<AtomicU64>,
    timestamps: Option<DashMap<u64, i64>>,
}

impl GlobalVersionClock {
    pub fn new(enable_timestamp_index: bool) -> Self {
        GlobalVersionClock {
            counter: CachePadded::new(AtomicU64::new(0)),
            timestamps: enable_timestamp_index.then(DashMap::new),
        }
    }

    /// Atomically allocate the next version. The timestamp is captured after
    /// the counter increment; ordering always derives from the version, the
    /// timestamp is metadata only.
    pub fn next_version(&self) -> (u64, i64) {
        let version = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = now_nanos();
        if let Some(map) = &self.timestamps {
            map.insert(version, timestamp);
        }
        (version, timestamp)
    }

    /// The most recently allocated version, 0 if none.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Best-effort timestamp lookup; entries below the prune watermark are
    /// gone.
    pub fn timestamp(&self, version: u64) -> Option<i64> {
        self.timestamps.as_ref()?.get(&version).map(|e| *e.value())
    }

    /// Drop timestamp entries for versions below `min_version`.
    pub fn prune_timestamps(&self, min_version: u64) {
        if let Some(map) = &self.timestamps {
            map.retain(|version, _| *version >= min_version);
        }
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
