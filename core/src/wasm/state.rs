//! Store data for a running game module
//!
//! [`SandboxContext`] is the one object that owns everything a game module
//! needs across calls: the host, the host entity array, resolved exports,
//! the entity layout, scratch buffers and caches. Host services reach it
//! through wasmtime's `Caller`; the lifecycle manager through its `Store`.

use q2wasm_shared::SandboxEdict;
use wasmtime::{AsContextMut, Memory, StoreContextMut, StoreLimits, StoreLimitsBuilder, TypedFunc};

use super::exports::GameExports;
use super::scratch::ScratchBuffers;
use crate::cache::Caches;
use crate::compat::ConfigstringCompat;
use crate::config::BridgeConfig;
use crate::error::BoundaryError;
use crate::host::{Edict, GameHost};
use crate::memory::{EntityIndex, EntityLayout, SandboxAddr, SandboxHeap};
use crate::mirror;

pub struct SandboxContext<H: GameHost> {
    /// The host engine
    pub host: H,

    /// Host mirror of every entity slot
    pub edicts: Vec<Edict>,

    /// Entities currently in use by the module
    pub num_edicts: usize,

    pub max_clients: usize,

    /// Sandbox linear memory (set after instantiation)
    pub memory: Option<Memory>,

    /// Resolved exports (set during bootstrap)
    pub exports: Option<GameExports>,

    /// Entity array placement (set once the module is ready)
    pub layout: Option<EntityLayout>,

    /// Argument passing block (set during bootstrap)
    pub scratch: Option<ScratchBuffers>,

    pub caches: Caches,

    pub compat: ConfigstringCompat,

    /// Bytes of each client mirrored host side
    pub client_len: usize,

    pub limits: StoreLimits,

    #[cfg(feature = "wasi")]
    pub wasi: wasmtime_wasi::p1::WasiP1Ctx,
}

impl<H: GameHost> SandboxContext<H> {
    pub fn new(host: H, max_edicts: usize, max_clients: usize, config: &BridgeConfig) -> Self {
        let edicts = (0..max_edicts)
            .map(|i| {
                let mut edict = Edict::default();
                edict.s.number = i as i32;
                edict
            })
            .collect();
        Self {
            host,
            edicts,
            num_edicts: max_clients + 1,
            max_clients,
            memory: None,
            exports: None,
            layout: None,
            scratch: None,
            caches: Caches::default(),
            compat: ConfigstringCompat::new(config.legacy_compat),
            client_len: mirror::client_copy_len(config.legacy_compat),
            limits: StoreLimitsBuilder::new().memory_size(config.heap_size).build(),
            #[cfg(feature = "wasi")]
            wasi: super::wasi::build_context(config),
        }
    }

    pub fn memory(&self) -> Result<Memory, BoundaryError> {
        self.memory.ok_or(BoundaryError::NotReady("sandbox memory is not instantiated"))
    }

    pub fn exports(&self) -> Result<&GameExports, BoundaryError> {
        self.exports
            .as_ref()
            .ok_or(BoundaryError::NotReady("exports are not resolved"))
    }

    pub fn layout(&self) -> Result<EntityLayout, BoundaryError> {
        self.layout
            .ok_or(BoundaryError::NotReady("entity layout is not known"))
    }

    pub fn scratch(&self) -> Result<ScratchBuffers, BoundaryError> {
        self.scratch
            .ok_or(BoundaryError::NotReady("scratch buffers are not allocated"))
    }
}

/// Sandbox memory and the context, borrowed together.
pub fn split<'a, H: GameHost>(
    store: impl Into<StoreContextMut<'a, SandboxContext<H>>>,
) -> Result<(&'a mut [u8], &'a mut SandboxContext<H>), BoundaryError> {
    let mut store = store.into();
    let memory = store.data().memory()?;
    Ok(memory.data_and_store_mut(store))
}

/// Validate an entity reference and bring it up to date host side.
pub fn sync_entity_ref<'a, H: GameHost>(
    store: impl Into<StoreContextMut<'a, SandboxContext<H>>>,
    addr: SandboxAddr,
) -> Result<Option<EntityIndex>, BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    let Some(index) = layout.validate(addr)? else {
        return Ok(None);
    };
    let sandbox: SandboxEdict = mirror::read_edict(memory, &layout, index)?;
    mirror::sync_entity(
        memory,
        &layout,
        &sandbox,
        &mut ctx.edicts[index.get()],
        false,
        ctx.client_len,
    )?;
    Ok(Some(index))
}

/// Bring every in-use entity up to date host side.
pub fn sync_all_in_use<'a, H: GameHost>(
    store: impl Into<StoreContextMut<'a, SandboxContext<H>>>,
) -> Result<(), BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    mirror::sync_in_use(memory, &layout, &mut ctx.edicts, ctx.num_edicts, ctx.client_len)?;
    Ok(())
}

/// [`SandboxHeap`] over a live store, using the module's allocator.
pub struct StoreHeap<'a, H: GameHost> {
    store: StoreContextMut<'a, SandboxContext<H>>,
    memory: Memory,
    malloc: TypedFunc<u32, u32>,
    free: TypedFunc<u32, ()>,
}

impl<'a, H: GameHost> StoreHeap<'a, H> {
    pub fn new(store: StoreContextMut<'a, SandboxContext<H>>) -> Result<Self, BoundaryError> {
        let ctx = store.data();
        let memory = ctx.memory()?;
        let exports = ctx.exports()?;
        let malloc = exports.malloc.clone();
        let free = exports.free.clone();
        Ok(Self {
            store,
            memory,
            malloc,
            free,
        })
    }

    pub fn context(&mut self) -> &mut SandboxContext<H> {
        self.store.data_mut()
    }
}

impl<H: GameHost> SandboxHeap for StoreHeap<'_, H> {
    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }

    fn malloc(&mut self, size: u32) -> Result<SandboxAddr, BoundaryError> {
        let addr = self
            .malloc
            .call(&mut self.store, size)
            .map_err(|e| BoundaryError::from_call("malloc", e))?;
        if addr == 0 {
            return Err(BoundaryError::OutOfMemory(size));
        }
        Ok(SandboxAddr::new(addr))
    }

    fn free(&mut self, addr: SandboxAddr) -> Result<(), BoundaryError> {
        self.free
            .call(&mut self.store, addr.get())
            .map_err(|e| BoundaryError::from_call("free", e))
    }
}

/// Run `f` with the caches and a heap over `store`.
///
/// The caches are moved out of the context for the duration so both can be
/// borrowed mutably, and are put back even when `f` fails.
pub fn with_caches<S, H, R>(
    store: &mut S,
    f: impl FnOnce(&mut Caches, &mut StoreHeap<'_, H>) -> Result<R, BoundaryError>,
) -> Result<R, BoundaryError>
where
    S: AsContextMut<Data = SandboxContext<H>>,
    H: GameHost,
{
    let mut caches = std::mem::take(&mut store.as_context_mut().data_mut().caches);
    let result = StoreHeap::new(store.as_context_mut()).and_then(|mut heap| f(&mut caches, &mut heap));
    store.as_context_mut().data_mut().caches = caches;
    result
}
