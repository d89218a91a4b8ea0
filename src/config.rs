//! Server configuration: listen endpoint, per-connection limits, admission
//! ceiling, and the engine's retention settings. Everything is validated at
//! startup; a bad value is fatal before the listener ever binds.

use std::time::Duration;

use crate::error::{ErrorCode, VerdisError};
use crate::glob::Pattern;
use crate::mvcc::{EngineConfig, RetentionPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Per-read deadline in milliseconds; 0 disables.
    pub read_timeout_ms: u64,
    /// Per-write deadline in milliseconds; 0 disables.
    pub write_timeout_ms: u64,
    /// Deadline for an idle connection (no buffered input); 0 disables.
    pub idle_timeout_ms: u64,
    /// Admission-control ceiling on concurrent connections.
    pub max_connections: usize,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// Cadence of the background retention pass in milliseconds; 0 disables.
    pub prune_interval_ms: u64,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 6379,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            idle_timeout_ms: 0,
            max_connections: 1000,
            read_buffer_size: 4096,
            write_buffer_size: 4096,
            prune_interval_ms: 10_000,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Parse command line arguments. Unknown flags are ignored; malformed
    /// values are startup errors.
    pub fn from_args(args: &[String]) -> Result<Self, VerdisError> {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--host" => config.host = take_value(args, &mut i)?.to_string(),
                "--port" => config.port = parse_flag(args, &mut i)?,
                "--address" => {
                    let addr = take_value(args, &mut i)?;
                    let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
                        VerdisError::new(
                            ErrorCode::Err,
                            format!("invalid address {addr:?}: expected host:port"),
                        )
                    })?;
                    config.host = host.to_string();
                    config.port = port.parse().map_err(|_| {
                        VerdisError::new(
                            ErrorCode::Err,
                            format!("invalid address {addr:?}: bad port"),
                        )
                    })?;
                }
                "--read-timeout" => config.read_timeout_ms = parse_flag(args, &mut i)?,
                "--write-timeout" => config.write_timeout_ms = parse_flag(args, &mut i)?,
                "--idle-timeout" => config.idle_timeout_ms = parse_flag(args, &mut i)?,
                "--max-connections" => config.max_connections = parse_flag(args, &mut i)?,
                "--read-buffer-size" => config.read_buffer_size = parse_flag(args, &mut i)?,
                "--write-buffer-size" => config.write_buffer_size = parse_flag(args, &mut i)?,
                "--prune-interval" => config.prune_interval_ms = parse_flag(args, &mut i)?,
                "--max-versions" => config.engine.default_max_versions = parse_flag(args, &mut i)?,
                "--tombstone-retention" => {
                    config.engine.tombstone_retention_versions = parse_flag(args, &mut i)?
                }
                "--retention" => {
                    let rule = take_value(args, &mut i)?;
                    let (pattern, max) = rule.split_once('=').ok_or_else(|| {
                        VerdisError::new(
                            ErrorCode::Err,
                            format!("invalid retention rule {rule:?}: expected pattern=N"),
                        )
                    })?;
                    let pattern = Pattern::compile(pattern).map_err(|e| {
                        VerdisError::new(
                            ErrorCode::Err,
                            format!("invalid retention pattern {pattern:?}: {e}"),
                        )
                    })?;
                    let max_versions = max.parse().map_err(|_| {
                        VerdisError::new(
                            ErrorCode::Err,
                            format!("invalid retention rule {rule:?}: bad version count"),
                        )
                    })?;
                    config.engine.retention_policies.push(RetentionPolicy {
                        pattern,
                        max_versions,
                    });
                }
                "--no-timestamp-index" => config.engine.enable_timestamp_index = false,
                _ => {}
            }
            i += 1;
        }
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        nonzero_ms(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        nonzero_ms(self.write_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        nonzero_ms(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), VerdisError> {
        if self.host.is_empty() {
            return Err(VerdisError::new(ErrorCode::Err, "host must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(VerdisError::new(
                ErrorCode::Err,
                "max connections must be positive",
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(VerdisError::new(
                ErrorCode::Err,
                "read buffer size must be positive",
            ));
        }
        if self.write_buffer_size == 0 {
            return Err(VerdisError::new(
                ErrorCode::Err,
                "write buffer size must be positive",
            ));
        }
        self.engine.validate()
    }
}

fn nonzero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn take_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, VerdisError> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i).map(|s| s.as_str()).ok_or_else(|| {
        VerdisError::new(ErrorCode::Err, format!("{flag} requires a value"))
    })
}

fn parse_flag<T: std::str::FromStr>(args: &[String], i: &mut usize) -> Result<T, VerdisError> {
    let flag = args[*i].clone();
    let value = take_value(args, i)?;
    value.parse().map_err(|_| {
        VerdisError::new(ErrorCode::Err, format!("invalid value for {flag}: {value:?}"))
    })
}
