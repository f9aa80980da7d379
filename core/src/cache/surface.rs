//! Surface descriptor interning

use hashbrown::HashMap;
use q2wasm_shared::SandboxSurface;

use crate::error::BoundaryError;
use crate::host::{HostSurface, SurfaceId};
use crate::memory::{SandboxAddr, SandboxHeap};

/// Bidirectional map between host surfaces and their sandbox copies.
///
/// Surfaces belong to the loaded map, so the cache is cleared on every map
/// change. Nameless surfaces all share the static null record in the
/// scratch block.
#[derive(Debug, Default)]
pub struct SurfaceCache {
    by_host: HashMap<SurfaceId, SandboxAddr>,
    by_sandbox: HashMap<SandboxAddr, HostSurface>,
    null_record: SandboxAddr,
    /// Last nameless surface handed out, returned for the null record.
    null_surface: Option<HostSurface>,
}

impl SurfaceCache {
    pub fn set_null_record(&mut self, addr: SandboxAddr) {
        self.null_record = addr;
    }

    pub fn null_record(&self) -> SandboxAddr {
        self.null_record
    }

    /// Sandbox address for a trace's surface.
    pub fn intern(
        &mut self,
        heap: &mut impl SandboxHeap,
        surface: Option<&HostSurface>,
    ) -> Result<SandboxAddr, BoundaryError> {
        let Some(surface) = surface.filter(|s| !s.name.is_empty()) else {
            self.null_surface = surface.cloned();
            return Ok(self.null_record);
        };
        if let Some(&addr) = self.by_host.get(&surface.id) {
            return Ok(addr);
        }

        let record = SandboxSurface::new(&surface.name, surface.flags, surface.value);
        let addr = heap.malloc(size_of::<SandboxSurface>() as u32)?;
        heap.view_mut().write(addr, &record)?;
        self.by_host.insert(surface.id, addr);
        self.by_sandbox.insert(addr, surface.clone());
        Ok(addr)
    }

    /// Host surface for an address the module hands back.
    pub fn resolve(&self, addr: SandboxAddr) -> Result<Option<HostSurface>, BoundaryError> {
        if addr.is_null() {
            return Ok(None);
        }
        if addr == self.null_record {
            return Ok(self.null_surface.clone());
        }
        self.by_sandbox
            .get(&addr)
            .cloned()
            .map(Some)
            .ok_or(BoundaryError::StaleSurface(addr.get()))
    }

    /// Drop every entry and release the sandbox copies.
    pub fn clear(&mut self, heap: &mut impl SandboxHeap) -> Result<(), BoundaryError> {
        let released = self.by_sandbox.len();
        for (addr, _) in self.by_sandbox.drain() {
            heap.free(addr)?;
        }
        self.by_host.clear();
        self.null_surface = None;
        if released > 0 {
            tracing::debug!(released, "Cleared surface cache");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}
