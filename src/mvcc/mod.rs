//! Multi-version storage: lock-free per-key version chains behind a single
//! global version clock.

pub mod chain;
pub mod clock;
pub mod config;
pub mod engine;

pub use chain::{Index, VersionChain, VersionInfo, VersionLookup};
pub use clock::GlobalVersionClock;
pub use config::{EngineConfig, RetentionPolicy};
pub use engine::{Engine, EngineError, EngineStats};
