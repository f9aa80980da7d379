//! Conversions between sandbox records and host types
//!
//! One function per direction per struct pair. Entity and surface
//! references are translated here; nothing else crosses unconverted.

use q2wasm_shared::{MAX_TOUCH, SandboxPmove, SandboxPmoveState, SandboxTrace};

use crate::cache::SurfaceCache;
use crate::error::BoundaryError;
use crate::host::{Pmove, PmoveState, Trace};
use crate::memory::{EntityLayout, SandboxAddr};

/// Narrow the module's 32-bit movement state to the host encoding.
///
/// Values the module produced from a previous host step always fit; the
/// truncation only affects values the host itself could never have sent.
pub fn pmove_state_to_host(state: &SandboxPmoveState) -> PmoveState {
    PmoveState {
        pm_type: state.pm_type,
        origin: state.origin.map(|v| v as i16),
        velocity: state.velocity.map(|v| v as i16),
        pm_flags: state.pm_flags as u8,
        pm_time: state.pm_time as u8,
        gravity: state.gravity as i16,
        delta_angles: state.delta_angles.map(|v| v as i16),
    }
}

pub fn pmove_state_to_sandbox(state: &PmoveState) -> SandboxPmoveState {
    SandboxPmoveState {
        pm_type: state.pm_type,
        origin: state.origin.map(i32::from),
        velocity: state.velocity.map(i32::from),
        pm_flags: i32::from(state.pm_flags),
        pm_time: i32::from(state.pm_time),
        gravity: i32::from(state.gravity),
        delta_angles: state.delta_angles.map(i32::from),
    }
}

/// Movement inputs for the host simulator. Outputs start cleared.
pub fn pmove_to_host(pm: &SandboxPmove) -> Pmove {
    Pmove {
        s: pmove_state_to_host(&pm.s),
        cmd: pm.cmd,
        snapinitial: pm.snapinitial != 0,
        touchents: Vec::new(),
        viewangles: pm.viewangles,
        viewheight: pm.viewheight,
        mins: pm.mins,
        maxs: pm.maxs,
        groundentity: None,
        watertype: pm.watertype,
        waterlevel: pm.waterlevel,
    }
}

/// Write simulator results back into the module's record.
pub fn apply_pmove_results(record: &mut SandboxPmove, pm: &Pmove, layout: &EntityLayout) {
    record.s = pmove_state_to_sandbox(&pm.s);
    record.snapinitial = i32::from(pm.snapinitial);
    let touched = pm.touchents.len().min(MAX_TOUCH);
    record.numtouch = touched as i32;
    record.touchents = [0; MAX_TOUCH];
    for (slot, ent) in record.touchents.iter_mut().zip(&pm.touchents[..touched]) {
        *slot = layout.index_to_addr(*ent).get();
    }
    record.viewangles = pm.viewangles;
    record.viewheight = pm.viewheight;
    record.mins = pm.mins;
    record.maxs = pm.maxs;
    record.groundentity = pm
        .groundentity
        .map_or(0, |ent| layout.index_to_addr(ent).get());
    record.watertype = pm.watertype;
    record.waterlevel = pm.waterlevel;
}

/// Trace result for the module. `surface` must already be interned.
pub fn trace_to_sandbox(trace: &Trace, layout: &EntityLayout, surface: SandboxAddr) -> SandboxTrace {
    SandboxTrace {
        allsolid: i32::from(trace.allsolid),
        startsolid: i32::from(trace.startsolid),
        fraction: trace.fraction,
        endpos: trace.endpos,
        plane: trace.plane,
        surface: surface.get(),
        contents: trace.contents,
        ent: trace.ent.map_or(0, |ent| layout.index_to_addr(ent).get()),
    }
}

/// Trace result produced by the module's own `PmoveTrace`.
pub fn trace_to_host(
    trace: &SandboxTrace,
    layout: &EntityLayout,
    surfaces: &SurfaceCache,
) -> Result<Trace, BoundaryError> {
    Ok(Trace {
        allsolid: trace.allsolid != 0,
        startsolid: trace.startsolid != 0,
        fraction: trace.fraction,
        endpos: trace.endpos,
        plane: trace.plane,
        surface: surfaces.resolve(SandboxAddr::new(trace.surface))?,
        contents: trace.contents,
        ent: layout.validate(SandboxAddr::new(trace.ent))?,
    })
}
