//! Command arguments and the command buffer
//!
//! Arguments are staged in the scratch block before `ClientCommand` and
//! `ServerCommand` run, so `argv` and `args` only hand back addresses.

use super::{GameCaller, read_string};
use crate::host::GameHost;

pub(super) fn argc<H: GameHost>(caller: GameCaller<'_, H>) -> wasmtime::Result<i32> {
    Ok(i32::try_from(caller.data().host.argc()).unwrap_or(i32::MAX))
}

/// Address of argument `n`, or null past the staged slots.
pub(super) fn argv<H: GameHost>(caller: GameCaller<'_, H>, n: i32) -> wasmtime::Result<u32> {
    let scratch = caller.data().scratch()?;
    let slot = usize::try_from(n).ok().and_then(|n| scratch.cmd(n));
    Ok(slot.map_or(0, |addr| addr.get()))
}

pub(super) fn args<H: GameHost>(caller: GameCaller<'_, H>) -> wasmtime::Result<u32> {
    Ok(caller.data().scratch()?.scmd().get())
}

pub(super) fn add_command_string<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    text: u32,
) -> wasmtime::Result<()> {
    let text = read_string(&mut caller, text)?;
    caller.data_mut().host.add_command_string(&text);
    Ok(())
}

pub(super) fn debug_graph<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    value: f32,
    color: i32,
) -> wasmtime::Result<()> {
    caller.data_mut().host.debug_graph(value, color);
    Ok(())
}
