//! Tagged allocation
//!
//! Blocks come from the module's own allocator and are tracked by tag so a
//! level change can release everything allocated for the level at once.

use super::GameCaller;
use crate::host::GameHost;
use crate::memory::SandboxAddr;
use crate::wasm::state::with_caches;

pub(super) fn tag_malloc<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    size: u32,
    tag: i32,
) -> wasmtime::Result<u32> {
    let addr = with_caches(&mut caller, |caches, heap| caches.tags.alloc(heap, size, tag))?;
    Ok(addr.get())
}

pub(super) fn tag_free<H: GameHost>(mut caller: GameCaller<'_, H>, addr: u32) -> wasmtime::Result<()> {
    with_caches(&mut caller, |caches, heap| {
        caches.tags.free_one(heap, SandboxAddr::new(addr))
    })?;
    Ok(())
}

pub(super) fn free_tags<H: GameHost>(mut caller: GameCaller<'_, H>, tag: i32) -> wasmtime::Result<()> {
    with_caches(&mut caller, |caches, heap| caches.tags.free_tag(heap, tag))?;
    Ok(())
}
