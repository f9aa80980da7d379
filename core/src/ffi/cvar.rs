//! Console variables
//!
//! Every call returns the sandbox mirror of the resulting cvar, creating it
//! on first use.

use super::{GameCaller, read_optional_string, read_string};
use crate::error::BoundaryError;
use crate::host::{GameHost, HostCvar};
use crate::wasm::state::with_caches;

fn mirror<H: GameHost>(caller: &mut GameCaller<'_, H>, cvar: &HostCvar) -> Result<u32, BoundaryError> {
    let addr = with_caches(caller, |caches, heap| caches.cvars.get_or_create(heap, cvar, false))?;
    Ok(addr.get())
}

pub(super) fn cvar<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    name: u32,
    value: u32,
    flags: i32,
) -> wasmtime::Result<u32> {
    let name = read_string(&mut caller, name)?;
    let value = read_optional_string(&mut caller, value)?.unwrap_or_default();
    let cvar = caller.data_mut().host.cvar(&name, &value, flags);
    Ok(mirror(&mut caller, &cvar)?)
}

pub(super) fn cvar_set<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    name: u32,
    value: u32,
) -> wasmtime::Result<u32> {
    let name = read_string(&mut caller, name)?;
    let value = read_optional_string(&mut caller, value)?.unwrap_or_default();
    let cvar = caller.data_mut().host.cvar_set(&name, &value);
    Ok(mirror(&mut caller, &cvar)?)
}

pub(super) fn cvar_forceset<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    name: u32,
    value: u32,
) -> wasmtime::Result<u32> {
    let name = read_string(&mut caller, name)?;
    let value = read_optional_string(&mut caller, value)?.unwrap_or_default();
    let cvar = caller.data_mut().host.cvar_forceset(&name, &value);
    Ok(mirror(&mut caller, &cvar)?)
}
