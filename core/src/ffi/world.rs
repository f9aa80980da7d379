//! Collision and visibility queries

use q2wasm_shared::SandboxTrace;
use wasmtime::AsContextMut;

use super::{GameCaller, entity_arg, vec3};
use crate::convert;
use crate::host::GameHost;
use crate::memory::{EntityIndex, MemoryView, SandboxAddr, SandboxHeap};
use crate::wasm::state::{split, sync_all_in_use, with_caches};

/// Sweep a box through the world, writing the result to `out`.
///
/// A null `passent` ignores nothing but the world itself.
#[allow(clippy::too_many_arguments)]
pub(super) fn trace<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    start_x: f32,
    start_y: f32,
    start_z: f32,
    mins_x: f32,
    mins_y: f32,
    mins_z: f32,
    maxs_x: f32,
    maxs_y: f32,
    maxs_z: f32,
    end_x: f32,
    end_y: f32,
    end_z: f32,
    passent: u32,
    content_mask: i32,
    out: u32,
) -> wasmtime::Result<()> {
    let out = SandboxAddr::new(out);
    let passent = entity_arg(&caller, passent)?.unwrap_or(EntityIndex::WORLD);
    {
        let (memory, _) = split(caller.as_context_mut())?;
        MemoryView::new(memory).check(out, size_of::<SandboxTrace>() as u32)?;
    }

    // Collision reads entity bounds, so every live entity must be current
    sync_all_in_use(caller.as_context_mut())?;

    let ctx = caller.data_mut();
    let result = ctx.host.trace(
        &ctx.edicts,
        vec3(start_x, start_y, start_z),
        vec3(mins_x, mins_y, mins_z),
        vec3(maxs_x, maxs_y, maxs_z),
        vec3(end_x, end_y, end_z),
        passent,
        content_mask,
    );

    with_caches(&mut caller, |caches, heap| {
        let surface = caches.surfaces.intern(heap, result.surface.as_ref())?;
        let layout = heap.context().layout()?;
        let record = convert::trace_to_sandbox(&result, &layout, surface);
        heap.view_mut().write(out, &record)
    })?;
    Ok(())
}

pub(super) fn pointcontents<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    x: f32,
    y: f32,
    z: f32,
) -> wasmtime::Result<i32> {
    Ok(caller.data_mut().host.point_contents(vec3(x, y, z)))
}

#[allow(clippy::too_many_arguments)]
pub(super) fn in_pvs<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ax: f32,
    ay: f32,
    az: f32,
    bx: f32,
    by: f32,
    bz: f32,
) -> wasmtime::Result<i32> {
    let visible = caller.data_mut().host.in_pvs(vec3(ax, ay, az), vec3(bx, by, bz));
    Ok(i32::from(visible))
}

#[allow(clippy::too_many_arguments)]
pub(super) fn in_phs<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ax: f32,
    ay: f32,
    az: f32,
    bx: f32,
    by: f32,
    bz: f32,
) -> wasmtime::Result<i32> {
    let audible = caller.data_mut().host.in_phs(vec3(ax, ay, az), vec3(bx, by, bz));
    Ok(i32::from(audible))
}

pub(super) fn areas_connected<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    area1: i32,
    area2: i32,
) -> wasmtime::Result<i32> {
    Ok(i32::from(caller.data_mut().host.areas_connected(area1, area2)))
}

pub(super) fn set_area_portal_state<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    portal: i32,
    open: i32,
) -> wasmtime::Result<()> {
    caller.data_mut().host.set_area_portal_state(portal, open != 0);
    Ok(())
}
