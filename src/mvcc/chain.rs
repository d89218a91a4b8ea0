//! Per-key version chains and the key index.
//!
//! A chain is a singly linked stack of immutable version records growing
//! toward older versions. Writers prepend with a CAS on the head; readers
//! pin an epoch guard and traverse without locking. Retention pruning
//! detaches the tail behind a boundary node and defers destruction until
//! every reader that could still see the detached suffix has unpinned.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use dashmap::DashMap;

use super::clock::GlobalVersionClock;

/// One immutable version of a key's value.
pub struct VersionNode {
    pub version: u64,
    pub timestamp: i64,
    /// `None` only for tombstones.
    pub value: Option<Vec<u8>>,
    pub deleted: bool,
    /// Older version; rewritten only when pruning detaches the tail.
    prev: Atomic<VersionNode>,
}

/// Read-only version metadata, as reported by HISTORY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: u64,
    pub timestamp: i64,
    pub deleted: bool,
    pub size: usize,
}

impl VersionNode {
    fn info(&self) -> VersionInfo {
        VersionInfo {
            version: self.version,
            timestamp: self.timestamp,
            deleted: self.deleted,
            size: self.value.as_ref().map_or(0, |v| v.len()),
        }
    }
}

/// Outcome of a read at a specific version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionLookup {
    /// A live version at or below the requested version.
    Found(Vec<u8>),
    /// The key was deleted at or before the requested version.
    Deleted,
    /// No version at or below the requested version exists on the chain.
    Missing,
}

/// Atomically swappable head of a per-key version chain.
pub struct VersionChain {
    head: Atomic<VersionNode>,
}

impl VersionChain {
    pub fn new() -> Self {
        VersionChain {
            head: Atomic::null(),
        }
    }

    /// Prepend a new version. The version number is allocated inside the CAS
    /// loop and re-allocated after every failed CAS, so versions along the
    /// chain from the head strictly decrease.
    pub(crate) fn prepend(
        &self,
        clock: &GlobalVersionClock,
        mut value: Option<Vec<u8>>,
        deleted: bool,
    ) -> u64 {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let (version, timestamp) = clock.next_version();
            let node = Owned::new(VersionNode {
                version,
                timestamp,
                value,
                deleted,
                prev: Atomic::null(),
            });
            node.prev.store(head, Ordering::Relaxed);
            match self
                .head
                .compare_exchange(head, node, Ordering::AcqRel, Ordering::Acquire, &guard)
            {
                Ok(_) => return version,
                Err(race) => {
                    // Lost the head race: take the payload back and retry
                    // with a fresh version.
                    value = race.new.into_box().value;
                }
            }
        }
    }

    /// The newest live value, or `None` when the chain is empty or the head
    /// is a tombstone.
    pub fn latest(&self) -> Option<Vec<u8>> {
        let guard = epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        match unsafe { head.as_ref() } {
            Some(node) if !node.deleted => node.value.clone(),
            _ => None,
        }
    }

    /// Whether the head exists and is not a tombstone.
    pub fn is_live(&self) -> bool {
        let guard = epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        matches!(unsafe { head.as_ref() }, Some(node) if !node.deleted)
    }

    /// `(version, deleted)` of the head, if any.
    pub fn head_info(&self) -> Option<(u64, bool)> {
        let guard = epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        unsafe { head.as_ref() }.map(|node| (node.version, node.deleted))
    }

    /// Walk from the head to the first node with `node.version <= version`.
    pub fn read_at(&self, version: u64) -> VersionLookup {
        let guard = epoch::pin();
        let mut cursor = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { cursor.as_ref() } {
            if node.version <= version {
                return if node.deleted {
                    VersionLookup::Deleted
                } else {
                    VersionLookup::Found(node.value.clone().unwrap_or_default())
                };
            }
            cursor = node.prev.load(Ordering::Acquire, &guard);
        }
        VersionLookup::Missing
    }

    /// Version metadata newest-first. A positive `max` stops the walk after
    /// that many entries; 0 walks the whole chain.
    pub fn history(&self, max: usize) -> Vec<VersionInfo> {
        let guard = epoch::pin();
        let mut entries = Vec::new();
        let mut cursor = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { cursor.as_ref() } {
            entries.push(node.info());
            if max > 0 && entries.len() == max {
                break;
            }
            cursor = node.prev.load(Ordering::Acquire, &guard);
        }
        entries
    }

    /// Number of versions currently reachable from the head.
    pub fn len(&self) -> usize {
        let guard = epoch::pin();
        let mut count = 0;
        let mut cursor = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { cursor.as_ref() } {
            count += 1;
            cursor = node.prev.load(Ordering::Acquire, &guard);
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Truncate the chain to at most `keep` newest versions. Returns the
    /// number of detached versions. Readers already inside the detached
    /// suffix keep traversing it; destruction is deferred past their epoch.
    pub(crate) fn truncate(&self, keep: usize) -> usize {
        if keep == 0 {
            return 0;
        }
        let guard = epoch::pin();
        let mut cursor = self.head.load(Ordering::Acquire, &guard);
        let mut depth = 0;
        while let Some(node) = unsafe { cursor.as_ref() } {
            depth += 1;
            if depth == keep {
                let tail = node.prev.load(Ordering::Acquire, &guard);
                if tail.is_null() {
                    return 0;
                }
                if node
                    .prev
                    .compare_exchange(
                        tail,
                        Shared::null(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        &guard,
                    )
                    .is_err()
                {
                    return 0;
                }
                let mut detached = 0;
                let mut walker = tail;
                while let Some(tail_node) = unsafe { walker.as_ref() } {
                    detached += 1;
                    walker = tail_node.prev.load(Ordering::Relaxed, &guard);
                }
                let raw = tail.as_raw();
                unsafe {
                    guard.defer_unchecked(move || drop_suffix(raw));
                }
                return detached;
            }
            cursor = node.prev.load(Ordering::Acquire, &guard);
        }
        0
    }
}

impl Default for VersionChain {
    fn default() -> Self {
        VersionChain::new()
    }
}

impl Drop for VersionChain {
    fn drop(&mut self) {
        // Exclusive access: free the retained portion iteratively so deep
        // chains cannot overflow the stack.
        let head = std::mem::replace(&mut self.head, Atomic::null());
        unsafe {
            let guard = epoch::unprotected();
            let shared = head.load(Ordering::Relaxed, guard);
            drop_suffix(shared.as_raw());
        }
    }
}

/// Free a detached chain suffix starting at `raw`.
///
/// Safety: the suffix must be unreachable from any chain head and no guard
/// pinned before the detach may still be active (the caller defers through
/// the epoch for the concurrent case).
unsafe fn drop_suffix(mut raw: *const VersionNode) {
    let guard = epoch::unprotected();
    while !raw.is_null() {
        let shared: Shared<'_, VersionNode> = Shared::from(raw);
        let owned = shared.into_owned();
        raw = owned.prev.load(Ordering::Relaxed, guard).as_raw();
        drop(owned);
    }
}

/// Concurrent mapping from key bytes to version chains. Keys are inserted on
/// first write and never removed; only chain heads mutate.
pub struct Index {
    map: DashMap<Vec<u8>, Arc<VersionChain>>,
}

impl Index {
    pub fn new() -> Self {
        Index {
            map: DashMap::new(),
        }
    }

    /// Chain for a key without allocating; `None` when the key was never
    /// written.
    pub fn get_chain(&self, key: &[u8]) -> Option<Arc<VersionChain>> {
        self.map.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Chain for a key, inserting an empty one if absent. Concurrent callers
    /// all converge on the same chain.
    pub fn get_or_create_chain(&self, key: &[u8]) -> Arc<VersionChain> {
        if let Some(chain) = self.get_chain(key) {
            return chain;
        }
        self.map
            .entry(key.to_vec())
            .or_insert_with(|| Arc::new(VersionChain::new()))
            .clone()
    }

    /// Best-effort key count; concurrent inserts may be missed.
    pub fn count(&self) -> usize {
        self.map.len()
    }

    /// Best-effort snapshot of all keys.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Visit every (key, chain) pair; used by the retention pruner.
    pub(crate) fn for_each_chain(&self, mut visit: impl FnMut(&[u8], &Arc<VersionChain>)) {
        for entry in self.map.iter() {
            visit(entry.key(), entry.value());
        }
    }
}

impl Default for Index {
    fn default() -> Self {
        Index::new()
    }
}
