//! Player movement
//!
//! The host runs the simulation; collision during the step is answered by
//! the module's own `PmoveTrace` and `PmovePointContents` exports, which
//! re-enter the sandbox from inside this import.

use glam::Vec3;
use q2wasm_shared::{SandboxPmove, SandboxTrace};
use wasmtime::AsContextMut;

use super::GameCaller;
use crate::convert;
use crate::error::BoundaryError;
use crate::host::{GameHost, PmoveWorld, Trace};
use crate::memory::{MemoryView, MemoryViewMut, SandboxAddr};
use crate::wasm::state::split;

pub(super) fn pmove<H: GameHost>(mut caller: GameCaller<'_, H>, pm: u32) -> wasmtime::Result<()> {
    let addr = SandboxAddr::new(pm);
    let (memory, ctx) = split(caller.as_context_mut())?;
    let layout = ctx.layout()?;
    let record: SandboxPmove = MemoryView::new(memory).read(addr)?;
    let mut native = convert::pmove_to_host(&record);

    let mut world = PmoveCallbacks {
        caller: &mut caller,
        pm: addr,
        failure: None,
    };
    H::pmove(&mut native, &mut world);
    if let Some(err) = world.failure {
        return Err(err.into());
    }

    // The callbacks may have grown memory or rewritten the record
    let (memory, _) = split(caller.as_context_mut())?;
    let mut record: SandboxPmove = MemoryView::new(memory).read(addr)?;
    convert::apply_pmove_results(&mut record, &native, &layout);
    MemoryViewMut::new(memory).write(addr, &record)?;
    Ok(())
}

struct PmoveCallbacks<'a, 'b, H: GameHost> {
    caller: &'a mut GameCaller<'b, H>,
    pm: SandboxAddr,
    /// First callback failure; later callbacks short-circuit.
    failure: Option<BoundaryError>,
}

impl<H: GameHost> PmoveCallbacks<'_, '_, H> {
    fn try_trace(&mut self, start: Vec3, mins: Vec3, maxs: Vec3, end: Vec3) -> Result<Trace, BoundaryError> {
        let ctx = self.caller.data();
        let func = ctx.exports()?.pmove_trace.clone();
        let out = ctx.scratch()?.trace();
        func.call(
            &mut *self.caller,
            (
                self.pm.get(),
                start.x,
                start.y,
                start.z,
                mins.x,
                mins.y,
                mins.z,
                maxs.x,
                maxs.y,
                maxs.z,
                end.x,
                end.y,
                end.z,
                out.get(),
            ),
        )
        .map_err(|e| BoundaryError::from_call("PmoveTrace", e))?;

        let (memory, ctx) = split(self.caller.as_context_mut())?;
        let record: SandboxTrace = MemoryView::new(memory).read(out)?;
        convert::trace_to_host(&record, &ctx.layout()?, &ctx.caches.surfaces)
    }

    fn try_point_contents(&mut self, point: Vec3) -> Result<i32, BoundaryError> {
        let func = self.caller.data().exports()?.pmove_point_contents.clone();
        func.call(&mut *self.caller, (self.pm.get(), point.x, point.y, point.z))
            .map_err(|e| BoundaryError::from_call("PmovePointContents", e))
    }

    fn settle<T>(&mut self, result: Result<T, BoundaryError>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                self.failure = Some(err);
                fallback
            }
        }
    }
}

impl<H: GameHost> PmoveWorld for PmoveCallbacks<'_, '_, H> {
    fn trace(&mut self, start: Vec3, mins: Vec3, maxs: Vec3, end: Vec3) -> Trace {
        // Blocked where it starts, so the simulation stops moving
        let blocked = Trace {
            allsolid: true,
            startsolid: true,
            fraction: 0.0,
            endpos: start,
            ..Trace::default()
        };
        if self.failure.is_some() {
            return blocked;
        }
        let result = self.try_trace(start, mins, maxs, end);
        self.settle(result, blocked)
    }

    fn point_contents(&mut self, point: Vec3) -> i32 {
        if self.failure.is_some() {
            return 0;
        }
        let result = self.try_point_contents(point);
        self.settle(result, 0)
    }
}
