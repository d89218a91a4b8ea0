//! The storage engine: a thin facade over the key index and version chains.

use thiserror::Error;
use tracing::debug;

use super::chain::{Index, VersionInfo, VersionLookup};
use super::clock::GlobalVersionClock;
use super::config::EngineConfig;
use crate::error::ErrorCode;

/// Internal read errors. The command layer maps all three to null replies;
/// they never reach the wire verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("key not found")]
    KeyNotFound,
    #[error("key deleted at or before the requested version")]
    KeyDeleted,
    #[error("version not found")]
    VersionNotFound,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::KeyNotFound => ErrorCode::NotFound,
            EngineError::KeyDeleted => ErrorCode::Deleted,
            EngineError::VersionNotFound => ErrorCode::VersionNotFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub key_count: usize,
    pub current_version: u64,
}

pub struct Engine {
    index: Index,
    clock: GlobalVersionClock,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            clock: GlobalVersionClock::new(config.enable_timestamp_index),
            index: Index::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Engine::new(EngineConfig::default())
    }

    /// Store a new version of `key` and return its version number. Always
    /// succeeds; concurrent writers to the same key are serialized by the
    /// chain-head CAS.
    pub fn set(&self, key: &[u8], value: &[u8]) -> u64 {
        let chain = self.index.get_or_create_chain(key);
        chain.prepend(&self.clock, Some(value.to_vec()), false)
    }

    /// The newest live value, `None` when the key is absent or deleted.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.get_chain(key)?.latest()
    }

    /// Mark `key` deleted by prepending a tombstone version. Returns `false`
    /// only when the key has no chain at all; deleting an already-deleted
    /// key appends another tombstone and still returns `true`.
    pub fn del(&self, key: &[u8]) -> bool {
        match self.index.get_chain(key) {
            Some(chain) => {
                chain.prepend(&self.clock, None, true);
                true
            }
            None => false,
        }
    }

    /// Whether the key currently resolves to a live value.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.index
            .get_chain(key)
            .is_some_and(|chain| chain.is_live())
    }

    /// The value of `key` as of `version`.
    pub fn get_at_version(&self, key: &[u8], version: u64) -> Result<Vec<u8>, EngineError> {
        let chain = self.index.get_chain(key).ok_or(EngineError::KeyNotFound)?;
        match chain.read_at(version) {
            VersionLookup::Found(value) => Ok(value),
            VersionLookup::Deleted => Err(EngineError::KeyDeleted),
            VersionLookup::Missing => Err(EngineError::VersionNotFound),
        }
    }

    /// Version metadata for `key`, newest-first. A positive `max` caps the
    /// number of entries.
    pub fn history(&self, key: &[u8], max: usize) -> Result<Vec<VersionInfo>, EngineError> {
        let chain = self.index.get_chain(key).ok_or(EngineError::KeyNotFound)?;
        Ok(chain.history(max))
    }

    /// The most recently allocated global version.
    pub fn current_version(&self) -> u64 {
        self.clock.current()
    }

    /// Best-effort timestamp for a version.
    pub fn timestamp_of(&self, version: u64) -> Option<i64> {
        self.clock.timestamp(version)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            key_count: self.index.count(),
            current_version: self.clock.current(),
        }
    }

    /// One retention pass: truncate every chain to its retained window and
    /// prune the timestamp index below the widest window. Non-blocking for
    /// readers and writers; runs from a background task.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        self.index.for_each_chain(|key, chain| {
            let mut keep = self.config.max_versions_for_key(key);
            if let Some((_, deleted)) = chain.head_info() {
                if deleted {
                    keep = keep.min(self.config.tombstone_retention_versions);
                }
            }
            removed += chain.truncate(keep);
        });

        if self.config.enable_timestamp_index {
            let horizon = self.config.widest_window() as u64;
            let watermark = self.clock.current().saturating_sub(horizon);
            self.clock.prune_timestamps(watermark);
        }

        if removed > 0 {
            debug!(removed, "retention pruned stale versions");
        }
        removed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
