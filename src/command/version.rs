//! Version-aware commands: GETV and HISTORY.

use super::{CommandSpec, Context, Router};
use crate::error::VerdisError;
use crate::resp::{Command, RespValue};

pub fn register_all(router: &mut Router) -> Result<(), VerdisError> {
    router.register(getv_spec())?;
    router.register(history_spec())?;
    Ok(())
}

/// GETV key version — the key's value as of a version. Engine read errors
/// (not found, deleted, version missing) all map to a null reply.
fn getv(ctx: &Context, cmd: &Command) -> RespValue {
    let version_text = String::from_utf8_lossy(cmd.arg(1)).into_owned();
    let Ok(version) = version_text.parse::<u64>() else {
        return RespValue::error(format!("ERR invalid version number: {version_text}"));
    };

    match ctx.engine.get_at_version(cmd.arg(0), version) {
        Ok(value) => RespValue::bulk_string(value),
        Err(_) => RespValue::null_bulk_string(),
    }
}

pub fn getv_spec() -> CommandSpec {
    CommandSpec {
        name: "GETV",
        handler: getv,
        min_args: 2,
        max_args: 2,
        read_only: true,
        mutates: false,
        description: "Get the value of a key at a specific version.",
    }
}

/// HISTORY key [count] — version metadata newest-first, each entry a
/// `[version, timestamp, deleted, size]` array.
fn history(ctx: &Context, cmd: &Command) -> RespValue {
    let max = if cmd.args().len() > 1 {
        let count_text = String::from_utf8_lossy(cmd.arg(1)).into_owned();
        match count_text.parse::<usize>() {
            Ok(count) => count,
            Err(_) => return RespValue::error("ERR invalid count"),
        }
    } else {
        0
    };

    match ctx.engine.history(cmd.arg(0), max) {
        Ok(entries) => RespValue::array(
            entries
                .into_iter()
                .map(|info| {
                    RespValue::array(vec![
                        RespValue::integer(info.version as i64),
                        RespValue::integer(info.timestamp),
                        RespValue::integer(i64::from(info.deleted)),
                        RespValue::integer(info.size as i64),
                    ])
                })
                .collect(),
        ),
        Err(_) => RespValue::null_bulk_string(),
    }
}

pub fn history_spec() -> CommandSpec {
    CommandSpec {
        name: "HISTORY",
        handler: history,
        min_args: 1,
        max_args: 2,
        read_only: true,
        mutates: false,
        description: "List a key's version history, newest first.",
    }
}
