//! The standard key-value commands: PING, GET, SET, DEL, EXISTS.

use super::{CommandSpec, Context, Router};
use crate::error::VerdisError;
use crate::resp::{Command, RespValue};

pub fn register_all(router: &mut Router) -> Result<(), VerdisError> {
    router.register(ping_spec())?;
    router.register(get_spec())?;
    router.register(set_spec())?;
    router.register(del_spec())?;
    router.register(exists_spec())?;
    Ok(())
}

/// PING [message] — health check; echoes the argument when given.
fn ping(_ctx: &Context, cmd: &Command) -> RespValue {
    if cmd.args().is_empty() {
        RespValue::simple_string("PONG")
    } else {
        RespValue::bulk_string(cmd.arg(0).to_vec())
    }
}

pub fn ping_spec() -> CommandSpec {
    CommandSpec {
        name: "PING",
        handler: ping,
        min_args: 0,
        max_args: 1,
        read_only: true,
        mutates: false,
        description: "Health check; returns PONG or echoes the argument.",
    }
}

/// GET key — newest live value, or null when absent or deleted.
fn get(ctx: &Context, cmd: &Command) -> RespValue {
    match ctx.engine.get(cmd.arg(0)) {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null_bulk_string(),
    }
}

pub fn get_spec() -> CommandSpec {
    CommandSpec {
        name: "GET",
        handler: get,
        min_args: 1,
        max_args: 1,
        read_only: true,
        mutates: false,
        description: "Get the value of a key.",
    }
}

/// SET key value — store a new version of the key.
fn set(ctx: &Context, cmd: &Command) -> RespValue {
    ctx.engine.set(cmd.arg(0), cmd.arg(1));
    RespValue::ok()
}

pub fn set_spec() -> CommandSpec {
    CommandSpec {
        name: "SET",
        handler: set,
        min_args: 2,
        max_args: 2,
        read_only: false,
        mutates: true,
        description: "Set key to value.",
    }
}

/// DEL key [key ...] — count of keys that were live at delete time. A
/// delete of an existing chain always records a tombstone, but only keys
/// that held a live value contribute to the reply.
fn del(ctx: &Context, cmd: &Command) -> RespValue {
    let mut deleted = 0i64;
    for index in 0..cmd.args().len() {
        let key = cmd.arg(index);
        let was_live = ctx.engine.exists(key);
        if ctx.engine.del(key) && was_live {
            deleted += 1;
        }
    }
    RespValue::integer(deleted)
}

pub fn del_spec() -> CommandSpec {
    CommandSpec {
        name: "DEL",
        handler: del,
        min_args: 1,
        max_args: -1,
        read_only: false,
        mutates: true,
        description: "Delete one or more keys.",
    }
}

/// EXISTS key [key ...] — count of keys that currently hold a live value.
fn exists(ctx: &Context, cmd: &Command) -> RespValue {
    let mut count = 0i64;
    for index in 0..cmd.args().len() {
        if ctx.engine.exists(cmd.arg(index)) {
            count += 1;
        }
    }
    RespValue::integer(count)
}

pub fn exists_spec() -> CommandSpec {
    CommandSpec {
        name: "EXISTS",
        handler: exists,
        min_args: 1,
        max_args: -1,
        read_only: true,
        mutates: false,
        description: "Check how many of the given keys exist.",
    }
}
