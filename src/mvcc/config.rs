//! Engine configuration: retention windows and the timestamp index switch.

use crate::error::{ErrorCode, VerdisError};
use crate::glob::Pattern;

/// How many versions to keep for keys matching a pattern.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub pattern: Pattern,
    pub max_versions: usize,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Versions kept per key when no retention policy matches.
    pub default_max_versions: usize,
    /// Retained window for chains whose newest version is a tombstone.
    pub tombstone_retention_versions: usize,
    /// Per-pattern version limits; first match wins.
    pub retention_policies: Vec<RetentionPolicy>,
    /// Record version -> timestamp mappings for HISTORY metadata.
    pub enable_timestamp_index: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_max_versions: 1000,
            tombstone_retention_versions: 100,
            retention_policies: Vec::new(),
            enable_timestamp_index: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), VerdisError> {
        if self.default_max_versions == 0 {
            return Err(VerdisError::new(
                ErrorCode::Err,
                "default max versions must be positive",
            ));
        }
        if self.tombstone_retention_versions == 0 {
            return Err(VerdisError::new(
                ErrorCode::Err,
                "tombstone retention versions must be positive",
            ));
        }
        for policy in &self.retention_policies {
            if policy.max_versions == 0 {
                return Err(VerdisError::new(
                    ErrorCode::Err,
                    format!(
                        "retention policy '{}' must keep at least one version",
                        policy.pattern
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The retained window for a key: first matching policy, else the
    /// default.
    pub fn max_versions_for_key(&self, key: &[u8]) -> usize {
        for policy in &self.retention_policies {
            if policy.pattern.matches(key) {
                return policy.max_versions;
            }
        }
        self.default_max_versions
    }

    /// The largest window any key can retain; used as the timestamp-index
    /// prune horizon.
    pub fn widest_window(&self) -> usize {
        self.retention_policies
            .iter()
            .map(|p| p.max_versions)
            .chain([self.default_max_versions])
            .max()
            .unwrap_or(self.default_max_versions)
    }
}
