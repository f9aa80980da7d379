//! Console and client printing

use super::{GameCaller, entity_arg, read_string};
use crate::error::BoundaryError;
use crate::host::{GameHost, PrintLevel};

fn print_level(raw: i32) -> PrintLevel {
    PrintLevel::from_raw(raw).unwrap_or_else(|| {
        tracing::warn!(level = raw, "Unknown print level, printing as high");
        PrintLevel::High
    })
}

pub(super) fn dprint<H: GameHost>(mut caller: GameCaller<'_, H>, msg: u32) -> wasmtime::Result<()> {
    let message = read_string(&mut caller, msg)?;
    caller.data_mut().host.dprint(&message);
    Ok(())
}

pub(super) fn bprint<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    level: i32,
    msg: u32,
) -> wasmtime::Result<()> {
    let message = read_string(&mut caller, msg)?;
    caller.data_mut().host.bprint(print_level(level), &message);
    Ok(())
}

/// Print to a client, or the console when `ent` is null.
pub(super) fn cprint<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
    level: i32,
    msg: u32,
) -> wasmtime::Result<()> {
    let ent = entity_arg(&caller, ent)?;
    let message = read_string(&mut caller, msg)?;
    let ctx = caller.data_mut();
    ctx.host.cprint(&ctx.edicts, ent, print_level(level), &message);
    Ok(())
}

pub(super) fn centerprint<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
    msg: u32,
) -> wasmtime::Result<()> {
    let Some(ent) = entity_arg(&caller, ent)? else {
        tracing::warn!("centerprint without a target entity");
        return Ok(());
    };
    let message = read_string(&mut caller, msg)?;
    let ctx = caller.data_mut();
    ctx.host.centerprint(&ctx.edicts, ent, &message);
    Ok(())
}

/// The module gave up. Unwinds the current export with the message.
pub(super) fn error<H: GameHost>(mut caller: GameCaller<'_, H>, msg: u32) -> wasmtime::Result<()> {
    let message = read_string(&mut caller, msg)?;
    Err(BoundaryError::GameError(message).into())
}
