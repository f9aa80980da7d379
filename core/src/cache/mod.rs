//! Handle caches shared across sandbox calls
//!
//! Each cache maps host objects to sandbox copies so repeated references
//! reuse one allocation. All sandbox memory they hold comes from the
//! module's allocator through a [`SandboxHeap`](crate::memory::SandboxHeap).

mod cvar;
mod surface;
mod tags;

pub use cvar::CvarCache;
pub use surface::SurfaceCache;
pub use tags::TagRegistry;

/// All caches owned by one game module.
#[derive(Debug, Default)]
pub struct Caches {
    pub cvars: CvarCache,
    pub surfaces: SurfaceCache,
    pub tags: TagRegistry,
}
