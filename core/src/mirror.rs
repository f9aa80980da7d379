//! Entity mirror between sandbox records and host entities
//!
//! The module's entity array is authoritative for game state; the host
//! array is what the server, collision and networking read. Before a call
//! into the module the host pushes the few fields only it changes
//! ([`pre_sync`]); afterwards it pulls entities back ([`post_sync`]),
//! skipping entities that were and still are unused.

use std::mem::offset_of;

use q2wasm_shared::{EntityState, GameClient, SandboxEdict};

use crate::error::BoundaryError;
use crate::host::Edict;
use crate::memory::{EntityIndex, EntityLayout, MemoryView, MemoryViewMut, SandboxAddr};

/// Counts from one [`post_sync`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Entities copied sandbox to host.
    pub synced: usize,
    /// Entities left untouched.
    pub skipped: usize,
}

pub fn read_edict(
    memory: &[u8],
    layout: &EntityLayout,
    index: EntityIndex,
) -> Result<SandboxEdict, BoundaryError> {
    MemoryView::new(memory).read(layout.checked_addr(index)?)
}

pub fn write_edict(
    memory: &mut [u8],
    layout: &EntityLayout,
    index: EntityIndex,
    edict: &SandboxEdict,
) -> Result<(), BoundaryError> {
    MemoryViewMut::new(memory).write(layout.checked_addr(index)?, edict)
}

/// The module's current entity count, bounded by both arrays.
pub fn reported_num_edicts(
    memory: &[u8],
    layout: &EntityLayout,
    host_capacity: usize,
) -> Result<usize, BoundaryError> {
    let raw: i32 = MemoryView::new(memory).read(layout.num_edicts_addr())?;
    usize::try_from(raw)
        .ok()
        .filter(|&n| n <= layout.max_edicts() && n <= host_capacity)
        .ok_or_else(|| {
            BoundaryError::InvalidLayout(format!(
                "module reports {raw} entities (limit {})",
                layout.max_edicts().min(host_capacity)
            ))
        })
}

/// Push entity numbers and pending events to the sandbox.
pub fn pre_sync(
    memory: &mut [u8],
    layout: &EntityLayout,
    edicts: &[Edict],
) -> Result<(), BoundaryError> {
    const NUMBER: u32 = (offset_of!(SandboxEdict, s) + offset_of!(EntityState, number)) as u32;
    const EVENT: u32 = (offset_of!(SandboxEdict, s) + offset_of!(EntityState, event)) as u32;

    let mut view = MemoryViewMut::new(memory);
    for (i, edict) in edicts.iter().enumerate() {
        let addr = layout.checked_addr(EntityIndex::new(i as u32))?;
        view.write(addr.offset(NUMBER), &edict.s.number)?;
        view.write(addr.offset(EVENT), &edict.s.event)?;
    }
    Ok(())
}

/// Pull entity state back after a call into the module.
///
/// Covers `max(previous count, reported count)` entities and leaves
/// `num_edicts` at the reported count. Entities skipped here have their
/// host event cleared, and a forced pass clears every event in range.
pub fn post_sync(
    memory: &[u8],
    layout: &EntityLayout,
    edicts: &mut [Edict],
    num_edicts: &mut usize,
    force: bool,
    client_len: usize,
) -> Result<SyncStats, BoundaryError> {
    let reported = reported_num_edicts(memory, layout, edicts.len())?;
    let count = (*num_edicts).max(reported).min(edicts.len());
    *num_edicts = reported;

    let mut stats = SyncStats::default();
    for (i, host) in edicts[..count].iter_mut().enumerate() {
        let sandbox = read_edict(memory, layout, EntityIndex::new(i as u32))?;
        if sync_entity(memory, layout, &sandbox, host, force, client_len)? {
            stats.synced += 1;
        } else {
            host.s.event = 0;
            stats.skipped += 1;
        }
    }
    if force {
        for host in &mut edicts[..count] {
            host.s.event = 0;
        }
    }
    tracing::trace!(?stats, count, force, "Synced entities from sandbox");
    Ok(stats)
}

/// Bring every in-use entity up to date before a spatial query.
pub fn sync_in_use(
    memory: &[u8],
    layout: &EntityLayout,
    edicts: &mut [Edict],
    num_edicts: usize,
    client_len: usize,
) -> Result<usize, BoundaryError> {
    let count = num_edicts.min(edicts.len());
    let mut synced = 0;
    for (i, host) in edicts[..count].iter_mut().enumerate() {
        let sandbox = read_edict(memory, layout, EntityIndex::new(i as u32))?;
        if sandbox.inuse != 0 && sync_entity(memory, layout, &sandbox, host, false, client_len)? {
            synced += 1;
        }
    }
    Ok(synced)
}

pub fn needs_sync(sandbox: &SandboxEdict, host: &Edict) -> bool {
    (sandbox.client != 0) != host.client.is_some()
        || (sandbox.inuse != 0) != host.inuse
        || sandbox.inuse != 0
}

/// Copy one entity sandbox to host. Returns whether anything was copied.
pub fn sync_entity(
    memory: &[u8],
    layout: &EntityLayout,
    sandbox: &SandboxEdict,
    host: &mut Edict,
    force: bool,
    client_len: usize,
) -> Result<bool, BoundaryError> {
    if !force && !needs_sync(sandbox, host) {
        return Ok(false);
    }

    copy_link_to_host(host, sandbox);
    host.owner = layout.validate(SandboxAddr::new(sandbox.owner))?;

    if sandbox.client == 0 {
        host.client = None;
    } else {
        let bytes = MemoryView::new(memory).to_host(SandboxAddr::new(sandbox.client), client_len as u32)?;
        let client = host.client.get_or_insert_with(Box::default);
        bytemuck::bytes_of_mut(client.as_mut())[..client_len].copy_from_slice(bytes);
    }
    Ok(true)
}

/// Fields the host's spatial index reads when linking.
pub fn copy_link_to_host(host: &mut Edict, sandbox: &SandboxEdict) {
    host.s = sandbox.s;
    host.inuse = sandbox.inuse != 0;
    host.svflags = sandbox.svflags;
    host.mins = sandbox.mins;
    host.maxs = sandbox.maxs;
    host.clipmask = sandbox.clipmask;
    host.solid = sandbox.solid;
    host.linkcount = sandbox.linkcount;
}

/// Fields the host's spatial index writes when linking.
pub fn copy_link_to_sandbox(sandbox: &mut SandboxEdict, host: &Edict) {
    let linked = u32::from(host.area_linked);
    sandbox.area.next = linked;
    sandbox.area.prev = linked;
    sandbox.linkcount = host.linkcount;
    sandbox.areanum = host.areanum;
    sandbox.areanum2 = host.areanum2;
    sandbox.absmin = host.absmin;
    sandbox.absmax = host.absmax;
    sandbox.size = host.size;
    sandbox.s.solid = host.s.solid;
}

/// Bytes of [`GameClient`] mirrored per client.
pub fn client_copy_len(legacy: bool) -> usize {
    GameClient::copy_len(legacy)
}
