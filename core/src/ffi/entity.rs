//! Entity linkage and area queries

use q2wasm_shared::SandboxEdict;
use wasmtime::AsContextMut;

use super::{GameCaller, read_string, vec3};
use crate::error::BoundaryError;
use crate::host::{BoxArea, Edict, GameHost};
use crate::memory::{EntityIndex, MemoryView, MemoryViewMut, SandboxAddr};
use crate::mirror;
use crate::wasm::state::{split, sync_all_in_use};

/// Run a spatial index operation on one entity.
///
/// The fields the index reads are copied host side first; the fields it
/// writes, plus whatever `copy_back` selects, are copied back afterwards.
fn update_through_host<H: GameHost>(
    caller: &mut GameCaller<'_, H>,
    ent: u32,
    op: impl FnOnce(&mut H, &mut [Edict], EntityIndex),
    copy_back: impl FnOnce(&mut SandboxEdict, &Edict),
) -> Result<(), BoundaryError> {
    let (memory, ctx) = split(caller.as_context_mut())?;
    let layout = ctx.layout()?;
    let index = layout.require(SandboxAddr::new(ent))?;
    let mut sandbox = mirror::read_edict(memory, &layout, index)?;

    let host = &mut ctx.edicts[index.get()];
    mirror::copy_link_to_host(host, &sandbox);
    let first_link = host.linkcount == 0;

    op(&mut ctx.host, &mut ctx.edicts, index);

    let host = &ctx.edicts[index.get()];
    if first_link && host.linkcount != 0 {
        sandbox.s.old_origin = host.s.old_origin;
    }
    mirror::copy_link_to_sandbox(&mut sandbox, host);
    copy_back(&mut sandbox, host);
    mirror::write_edict(memory, &layout, index, &sandbox)
}

pub(super) fn linkentity<H: GameHost>(mut caller: GameCaller<'_, H>, ent: u32) -> wasmtime::Result<()> {
    update_through_host(
        &mut caller,
        ent,
        |host, edicts, index| host.link_entity(edicts, index),
        |_, _| {},
    )?;
    Ok(())
}

pub(super) fn unlinkentity<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
) -> wasmtime::Result<()> {
    update_through_host(
        &mut caller,
        ent,
        |host, edicts, index| host.unlink_entity(edicts, index),
        |_, _| {},
    )?;
    Ok(())
}

pub(super) fn setmodel<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
    name: u32,
) -> wasmtime::Result<()> {
    let name = read_string(&mut caller, name)?;
    update_through_host(
        &mut caller,
        ent,
        |host, edicts, index| host.set_model(edicts, index, &name),
        |sandbox, host| {
            sandbox.s.modelindex = host.s.modelindex;
            sandbox.mins = host.mins;
            sandbox.maxs = host.maxs;
        },
    )?;
    Ok(())
}

/// Collect entities whose bounds touch the box into `list`.
#[allow(clippy::too_many_arguments)]
pub(super) fn box_edicts<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    mins_x: f32,
    mins_y: f32,
    mins_z: f32,
    maxs_x: f32,
    maxs_y: f32,
    maxs_z: f32,
    list: u32,
    max_count: i32,
    area_type: i32,
) -> wasmtime::Result<i32> {
    let max_count = u32::try_from(max_count).map_err(|_| BoundaryError::InvalidArgument {
        function: "BoxEdicts",
        reason: format!("negative maxcount {max_count}"),
    })?;
    let list = SandboxAddr::new(list);
    let list_size = max_count.checked_mul(4).ok_or(BoundaryError::InvalidArgument {
        function: "BoxEdicts",
        reason: format!("maxcount {max_count} overflows the address space"),
    })?;
    {
        let (memory, _) = split(caller.as_context_mut())?;
        MemoryView::new(memory).check(list, list_size)?;
    }

    let Some(area) = BoxArea::from_raw(area_type) else {
        tracing::warn!(area_type, "BoxEdicts with unknown area type");
        return Ok(0);
    };

    sync_all_in_use(caller.as_context_mut())?;

    let ctx = caller.data_mut();
    let mut found = ctx.host.box_edicts(
        &ctx.edicts,
        vec3(mins_x, mins_y, mins_z),
        vec3(maxs_x, maxs_y, maxs_z),
        max_count as usize,
        area,
    );
    found.truncate(max_count as usize);

    let (memory, ctx) = split(caller.as_context_mut())?;
    let layout = ctx.layout()?;
    let mut view = MemoryViewMut::new(memory);
    for (slot, ent) in found.iter().enumerate() {
        let addr = layout.checked_addr(*ent)?;
        view.write(list.offset(slot as u32 * 4), &addr.get())?;
    }
    Ok(found.len() as i32)
}
