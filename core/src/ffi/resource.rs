//! Precache indices and configstrings

use super::{GameCaller, read_string};
use crate::host::GameHost;

pub(super) fn modelindex<H: GameHost>(mut caller: GameCaller<'_, H>, name: u32) -> wasmtime::Result<i32> {
    let name = read_string(&mut caller, name)?;
    Ok(caller.data_mut().host.model_index(&name))
}

pub(super) fn soundindex<H: GameHost>(mut caller: GameCaller<'_, H>, name: u32) -> wasmtime::Result<i32> {
    let name = read_string(&mut caller, name)?;
    Ok(caller.data_mut().host.sound_index(&name))
}

pub(super) fn imageindex<H: GameHost>(mut caller: GameCaller<'_, H>, name: u32) -> wasmtime::Result<i32> {
    let name = read_string(&mut caller, name)?;
    Ok(caller.data_mut().host.image_index(&name))
}

/// Set a configstring, remapping the index for legacy hosts.
pub(super) fn configstring<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    index: i32,
    value: u32,
) -> wasmtime::Result<()> {
    let value = read_string(&mut caller, value)?;
    let ctx = caller.data_mut();
    match ctx.compat.translate(index, &value) {
        Some(index) => ctx.host.configstring(index, &value),
        None => tracing::debug!(index, "Dropped configstring with no host slot"),
    }
    Ok(())
}
