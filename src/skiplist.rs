//! A lock-free concurrent skip list over opaque byte keys, ordered
//! lexicographically. Used as the reusable ordered-index primitive for
//! secondary views.
//!
//! Inserts linearize at the level-0 CAS, deletes at the `marked` CAS.
//! Searches opportunistically splice out marked nodes they pass; only the
//! deleter that won the `marked` CAS ever frees a node, after driving its
//! unlink, so destruction happens exactly once. Memory is reclaimed through
//! crossbeam's epoch scheme: readers pin a guard and may keep traversing a
//! node after it was unlinked; it is destroyed only once every such guard
//! is gone.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};

const MAX_LEVEL: usize = 16;

struct Node {
    key: Vec<u8>,
    value: Atomic<Vec<u8>>,
    /// Logical deletion flag; a marked node is invisible to queries even
    /// while physically linked.
    marked: AtomicBool,
    /// Forward pointers, one per level in `0..=level`.
    tower: Vec<Atomic<Node>>,
}

impl Node {
    fn new(key: &[u8], value: &[u8], level: usize) -> Owned<Node> {
        Owned::new(Node {
            key: key.to_vec(),
            value: Atomic::new(value.to_vec()),
            marked: AtomicBool::new(false),
            tower: (0..=level).map(|_| Atomic::null()).collect(),
        })
    }

    fn head() -> Node {
        Node {
            key: Vec::new(),
            value: Atomic::null(),
            marked: AtomicBool::new(false),
            tower: (0..MAX_LEVEL).map(|_| Atomic::null()).collect(),
        }
    }

    fn top_level(&self) -> usize {
        self.tower.len() - 1
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // The node owns its current value cell; superseded values were
        // already deferred by the upsert that replaced them.
        unsafe {
            let guard = epoch::unprotected();
            let value = self.value.load(Ordering::Relaxed, guard);
            if !value.is_null() {
                drop(value.into_owned());
            }
        }
    }
}

pub struct SkipList {
    head: Box<Node>,
    seed: AtomicU64,
    len: AtomicUsize,
}

impl SkipList {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        SkipList {
            head: Box::new(Node::head()),
            // xorshift64 has a fixed point at zero
            seed: AtomicU64::new(nanos | 1),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of live entries. Relaxed counter; may lag in-flight operations.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw a level from a geometric distribution with P = 1/4, advancing
    /// the shared xorshift64 seed by CAS. Contention here is acceptable; the
    /// draw is off the hot path.
    fn random_level(&self) -> usize {
        loop {
            let old = self.seed.load(Ordering::Relaxed);
            let mut next = old ^ (old << 13);
            next ^= next >> 7;
            next ^= next << 17;
            if self
                .seed
                .compare_exchange_weak(old, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                let mut level = 0;
                let mut bits = next;
                while level < MAX_LEVEL - 1 && bits & 3 == 0 {
                    level += 1;
                    bits >>= 2;
                }
                return level;
            }
        }
    }

    fn head_shared<'g>(&self) -> Shared<'g, Node> {
        Shared::from(&*self.head as *const Node)
    }

    /// Predecessors and successors of `key` at every level. Marked nodes
    /// encountered on the way are spliced out when the CAS cooperates;
    /// losing that race just means another thread already did it.
    fn find_path<'g>(
        &self,
        key: &[u8],
        guard: &'g Guard,
    ) -> ([Shared<'g, Node>; MAX_LEVEL], [Shared<'g, Node>; MAX_LEVEL]) {
        let mut preds = [Shared::null(); MAX_LEVEL];
        let mut succs = [Shared::null(); MAX_LEVEL];
        let mut pred = self.head_shared();

        for level in (0..MAX_LEVEL).rev() {
            loop {
                let pred_ref = unsafe { pred.deref() };
                let next = pred_ref.tower[level].load(Ordering::Acquire, guard);
                let Some(next_ref) = (unsafe { next.as_ref() }) else {
                    break;
                };
                if next_ref.marked.load(Ordering::Acquire) {
                    let after = next_ref.tower[level].load(Ordering::Acquire, guard);
                    let _ = pred_ref.tower[level].compare_exchange(
                        next,
                        after,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                    continue;
                }
                if next_ref.key.as_slice() >= key {
                    break;
                }
                pred = next;
            }
            preds[level] = pred;
            succs[level] = unsafe { pred.deref() }.tower[level].load(Ordering::Acquire, guard);
        }
        (preds, succs)
    }

    /// Copy of the value for `key`, if present and not logically deleted.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let guard = epoch::pin();
        let (_, succs) = self.find_path(key, &guard);
        let node = unsafe { succs[0].as_ref() }?;
        if node.key != key || node.marked.load(Ordering::Acquire) {
            return None;
        }
        let value = node.value.load(Ordering::Acquire, &guard);
        unsafe { value.as_ref() }.cloned()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert or update. Returns `true` when the key was newly inserted,
    /// `false` when an existing entry's value was swapped.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> bool {
        let guard = epoch::pin();
        loop {
            let (preds, succs) = self.find_path(key, &guard);

            if let Some(existing) = unsafe { succs[0].as_ref() } {
                if existing.key == key && !existing.marked.load(Ordering::Acquire) {
                    let fresh = Owned::new(value.to_vec());
                    let old = existing.value.swap(fresh, Ordering::AcqRel, &guard);
                    if !old.is_null() {
                        unsafe { guard.defer_destroy(old) };
                    }
                    return false;
                }
            }

            let level = self.random_level();
            let node = Node::new(key, value, level);
            for i in 0..=level {
                node.tower[i].store(succs[i], Ordering::Relaxed);
            }

            // level 0 is the linearization point; membership is decided here
            let pred0 = unsafe { preds[0].deref() };
            match pred0.tower[0].compare_exchange(
                succs[0],
                node,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(linked) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    self.link_upper_levels(key, linked, level, preds, succs, &guard);
                    return true;
                }
                Err(_) => continue,
            }
        }
    }

    /// Link a freshly inserted node at levels `1..=level`, re-searching
    /// after every failed CAS. If the node gets marked meanwhile the upper
    /// linkage is abandoned; level 0 alone determines membership.
    fn link_upper_levels<'g>(
        &self,
        key: &[u8],
        node: Shared<'g, Node>,
        level: usize,
        mut preds: [Shared<'g, Node>; MAX_LEVEL],
        mut succs: [Shared<'g, Node>; MAX_LEVEL],
        guard: &'g Guard,
    ) {
        let node_ref = unsafe { node.deref() };
        for i in 1..=level {
            loop {
                if node_ref.marked.load(Ordering::Acquire) {
                    return;
                }
                node_ref.tower[i].store(succs[i], Ordering::Release);
                let pred_ref = unsafe { preds[i].deref() };
                if pred_ref.tower[i]
                    .compare_exchange(succs[i], node, Ordering::AcqRel, Ordering::Acquire, guard)
                    .is_ok()
                {
                    break;
                }
                let (p, s) = self.find_path(key, guard);
                preds = p;
                succs = s;
                match unsafe { succs[0].as_ref() } {
                    Some(found) if found.key == key && !found.marked.load(Ordering::Acquire) => {}
                    _ => return,
                }
            }
        }
    }

    /// Logically delete `key`. Returns `false` when absent or already
    /// deleted. The `marked` CAS is the linearization point; the physical
    /// unlink that follows is opportunistic and may be completed by any
    /// searching thread.
    pub fn remove(&self, key: &[u8]) -> bool {
        let guard = epoch::pin();
        let (mut preds, succs) = self.find_path(key, &guard);
        let target = succs[0];
        let Some(node) = (unsafe { target.as_ref() }) else {
            return false;
        };
        if node.key != key {
            return false;
        }
        if node
            .marked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.len.fetch_sub(1, Ordering::Relaxed);

        // unlink from the top level down; level 0 goes last
        let top = node.top_level();
        for i in (0..=top).rev() {
            loop {
                let pred_ref = unsafe { preds[i].deref() };
                let next = pred_ref.tower[i].load(Ordering::Acquire, &guard);
                if next != target {
                    break;
                }
                let after = node.tower[i].load(Ordering::Acquire, &guard);
                if pred_ref.tower[i]
                    .compare_exchange(target, after, Ordering::AcqRel, Ordering::Acquire, &guard)
                    .is_ok()
                {
                    break;
                }
                let (p, _) = self.find_path(key, &guard);
                preds = p;
            }
        }
        // a final search helps splice any linkage that raced the loop above
        let _ = self.find_path(key, &guard);

        // we won the marked CAS, so this defer happens exactly once
        unsafe { guard.defer_destroy(target) };
        true
    }

    /// Iterator over live entries in key order, starting at the smallest.
    pub fn iter(&self) -> SkipListIter<'_> {
        let guard = epoch::pin();
        SkipListIter {
            _list: self,
            current: &*self.head as *const Node,
            end: None,
            guard,
        }
    }

    /// Iterator positioned at the first key `>= target`.
    pub fn seek(&self, target: &[u8]) -> SkipListIter<'_> {
        let guard = epoch::pin();
        let (preds, _) = self.find_path(target, &guard);
        let current = preds[0].as_raw();
        SkipListIter {
            _list: self,
            current,
            end: None,
            guard,
        }
    }

    /// Iterate `[start, end)`; `None` end is unbounded.
    pub fn range(&self, start: &[u8], end: Option<&[u8]>) -> SkipListIter<'_> {
        let mut iter = self.seek(start);
        iter.end = end.map(|e| e.to_vec());
        iter
    }
}

impl Default for SkipList {
    fn default() -> Self {
        SkipList::new()
    }
}

impl Drop for SkipList {
    fn drop(&mut self) {
        // Exclusive access: every node still linked at level 0 is owned by
        // the list. Nodes removed earlier were unlinked before their
        // destruction was deferred, so they are not reachable here.
        unsafe {
            let guard = epoch::unprotected();
            let mut cursor = self.head.tower[0].load(Ordering::Relaxed, guard);
            while let Some(node) = cursor.as_ref() {
                let next = node.tower[0].load(Ordering::Relaxed, guard);
                drop(cursor.into_owned());
                cursor = next;
            }
        }
    }
}

/// Forward iterator at level 0, skipping marked nodes. Holds an epoch guard
/// for its whole lifetime, so every node it can still reach stays allocated;
/// yielded keys and values are copies.
pub struct SkipListIter<'a> {
    _list: &'a SkipList,
    current: *const Node,
    end: Option<Vec<u8>>,
    guard: Guard,
}

impl Iterator for SkipListIter<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = unsafe { &*self.current };
            let next = current.tower[0].load(Ordering::Acquire, &self.guard);
            let node = unsafe { next.as_ref() }?;
            self.current = next.as_raw();

            if node.marked.load(Ordering::Acquire) {
                continue;
            }
            if let Some(end) = &self.end {
                if node.key.as_slice() >= end.as_slice() {
                    return None;
                }
            }
            let value = node.value.load(Ordering::Acquire, &self.guard);
            let value = unsafe { value.as_ref() }.cloned().unwrap_or_default();
            return Some((node.key.clone(), value));
        }
    }
}
