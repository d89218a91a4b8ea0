//! Command metadata, registration, and dispatch.

pub mod standard;
pub mod version;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ErrorCode, VerdisError};
use crate::mvcc::Engine;
use crate::resp::{Command, RespValue};

/// Shared state handed to every handler.
pub struct Context {
    pub engine: Arc<Engine>,
}

pub type HandlerFn = fn(&Context, &Command) -> RespValue;

/// Describes one command: canonical name, handler, arity bounds, and flags.
pub struct CommandSpec {
    pub name: &'static str,
    pub handler: HandlerFn,
    /// Minimum number of arguments (excluding the command name).
    pub min_args: usize,
    /// Maximum number of arguments; -1 means unbounded.
    pub max_args: i32,
    pub read_only: bool,
    pub mutates: bool,
    pub description: &'static str,
}

impl CommandSpec {
    fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && (self.max_args < 0 || argc <= self.max_args as usize)
    }

    fn arity_error(&self, argc: usize) -> String {
        let expected = if self.max_args < 0 {
            format!("at least {}", self.min_args)
        } else if self.min_args == self.max_args as usize {
            self.min_args.to_string()
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        };
        format!(
            "ERR wrong number of arguments for '{}' command (expected {expected}, got {argc})",
            self.name
        )
    }
}

/// Maps upper-case command names to specs. Registration happens once during
/// server construction; afterwards the router is published behind an `Arc`
/// and never mutated.
pub struct Router {
    commands: HashMap<&'static str, CommandSpec>,
    ctx: Context,
}

impl Router {
    pub fn new(ctx: Context) -> Self {
        Router {
            commands: HashMap::new(),
            ctx,
        }
    }

    /// Register a command. A duplicate name is a programming error surfaced
    /// as a startup failure, never as a client-visible error.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), VerdisError> {
        if spec.name.is_empty() {
            return Err(VerdisError::new(
                ErrorCode::Internal,
                "command spec has an empty name",
            ));
        }
        if self.commands.contains_key(spec.name) {
            return Err(VerdisError::new(
                ErrorCode::Internal,
                format!("duplicate command registration: {}", spec.name),
            ));
        }
        self.commands.insert(spec.name, spec);
        Ok(())
    }

    /// Route a command to its handler, enforcing arity first.
    pub fn dispatch(&self, cmd: &Command) -> RespValue {
        if cmd.name().is_empty() {
            return RespValue::error("ERR empty command");
        }
        let Some(spec) = self.commands.get(cmd.name()) else {
            return RespValue::error(format!("ERR unknown command '{}'", cmd.name()));
        };
        let argc = cmd.args().len();
        if !spec.accepts(argc) {
            return RespValue::error(spec.arity_error(argc));
        }
        (spec.handler)(&self.ctx, cmd)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// Register every built-in command.
pub fn register_all(router: &mut Router) -> Result<(), VerdisError> {
    standard::register_all(router)?;
    version::register_all(router)?;
    Ok(())
}
