//! Game module lifecycle and the host-facing game events

use std::path::PathBuf;

use q2wasm_shared::{
    CVAR_LATCH, DEFAULT_MAX_CLIENTS, DEFAULT_MAX_EDICTS, GAME_API_VERSION, GMF_ENHANCED_SAVEGAMES,
    MAX_CLIENTS, MAX_CMD_ARGS, MAX_EDICTS, MAX_INFO_STRING, MAX_OSPATH, MAX_STATS, SandboxEdict,
    TAG_GAME, TAG_LEVEL, UserCmd,
};
use wasmtime::{Instance, Linker, Module, Store};

use super::engine::SandboxEngine;
use super::exports::{GameExports, optional};
use super::scratch::ScratchBuffers;
use super::state::{SandboxContext, split, with_caches};
use crate::cache::Caches;
use crate::config::BridgeConfig;
use crate::error::BoundaryError;
use crate::ffi::register_game_imports;
use crate::host::{Edict, GameHost};
use crate::memory::{EntityIndex, EntityLayout, MemoryView, MemoryViewMut, SandboxAddr, SandboxHeap};
use crate::mirror::{self, SyncStats};
use crate::save_path::normalize_save_path;

/// Where a [`GameModule`] is in its life.
///
/// Steps run in order; any fatal boundary error moves to `Faulted`, from
/// which only [`GameModule::shutdown`] is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    Loaded,
    Instantiated,
    Bootstrapped,
    Ready,
    Faulted,
    TornDown,
}

type GameStore<H> = Store<SandboxContext<H>>;

/// A sandboxed game module and the host side of its entity mirror.
pub struct GameModule<H: GameHost> {
    engine: SandboxEngine,
    linker: Linker<SandboxContext<H>>,
    store: GameStore<H>,
    module: Option<Module>,
    instance: Option<Instance>,
    state: LifecycleState,
    config: BridgeConfig,
    save_root: PathBuf,
    /// Map name, entity string and spawn point handed to the last spawn.
    spawn_strings: Option<[SandboxAddr; 3]>,
}

impl<H: GameHost> GameModule<H> {
    /// Set up the engine and host imports. No module is loaded yet.
    pub fn new(mut host: H, mut config: BridgeConfig) -> Result<Self, BoundaryError> {
        config.apply_host_overrides(&mut host);
        let max_edicts = latched_count(&mut host, "maxentities", DEFAULT_MAX_EDICTS, MAX_EDICTS);
        let max_clients = latched_count(&mut host, "maxclients", DEFAULT_MAX_CLIENTS, MAX_CLIENTS)
            .min(max_edicts - 1);

        let engine = SandboxEngine::new(&config)?;
        let mut linker = Linker::new(engine.engine());
        register_game_imports(&mut linker)
            .map_err(|e| BoundaryError::Instantiate(format!("registering host imports: {e:#}")))?;
        #[cfg(feature = "wasi")]
        super::wasi::add_to_linker(&mut linker)
            .map_err(|e| BoundaryError::Instantiate(format!("registering WASI: {e:#}")))?;

        let context = SandboxContext::new(host, max_edicts, max_clients, &config);
        let mut store = Store::new(engine.engine(), context);
        store.limiter(|ctx| &mut ctx.limits);

        let save_root = config
            .save_root()
            .canonicalize()
            .unwrap_or_else(|_| config.save_root().to_path_buf());

        tracing::debug!(
            max_edicts,
            max_clients,
            stack_size = config.stack_size,
            heap_size = config.heap_size,
            "Created game module host"
        );

        Ok(Self {
            engine,
            linker,
            store,
            module: None,
            instance: None,
            state: LifecycleState::Unloaded,
            config,
            save_root,
            spawn_strings: None,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Locate and compile the module from the configured directory.
    pub fn load(&mut self) -> Result<(), BoundaryError> {
        self.expect_state(LifecycleState::Unloaded, "a game module is already loaded")?;
        let result = self.engine.load_from_dir(&self.config.module_dir);
        let module = self.fatal(result)?;
        self.module = Some(module);
        self.state = LifecycleState::Loaded;
        Ok(())
    }

    /// Compile a module from memory (binary or text format).
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), BoundaryError> {
        self.expect_state(LifecycleState::Unloaded, "a game module is already loaded")?;
        let result = self.engine.load_module(bytes);
        let module = self.fatal(result)?;
        self.module = Some(module);
        self.state = LifecycleState::Loaded;
        Ok(())
    }

    /// Run the module up to `Ready`, loading it first if needed.
    pub fn init(&mut self) -> Result<(), BoundaryError> {
        if self.state == LifecycleState::Unloaded {
            self.load()?;
        }
        self.expect_state(LifecycleState::Loaded, "game module cannot be initialised twice")?;

        let result = self.instantiate();
        self.fatal(result)?;
        let result = self.bootstrap();
        self.fatal(result)?;
        let result = self.ready();
        self.fatal(result)?;
        tracing::info!(
            num_edicts = self.store.data().num_edicts,
            "Game module ready"
        );
        Ok(())
    }

    fn instantiate(&mut self) -> Result<(), BoundaryError> {
        let module = self
            .module
            .as_ref()
            .ok_or(BoundaryError::NotReady("no game module is loaded"))?;
        SandboxEngine::validate_module_memory(module, self.config.heap_size)?;

        let instance = self
            .linker
            .instantiate(&mut self.store, module)
            .map_err(|e| BoundaryError::Instantiate(format!("{e:#}")))?;
        let memory = instance
            .get_memory(&mut self.store, "memory")
            .ok_or(BoundaryError::MissingExport("memory"))?;

        self.store.data_mut().memory = Some(memory);
        self.instance = Some(instance);
        self.state = LifecycleState::Instantiated;
        tracing::info!(memory = memory.data_size(&self.store), "Game module instantiated");
        Ok(())
    }

    fn bootstrap(&mut self) -> Result<(), BoundaryError> {
        let instance = self
            .instance
            .ok_or(BoundaryError::NotReady("game module is not instantiated"))?;

        if let Some(initialize) = optional::<(), ()>(&instance, &mut self.store, "_initialize")? {
            initialize
                .call(&mut self.store, ())
                .map_err(|e| BoundaryError::from_call("_initialize", e))?;
        }

        let exports = GameExports::resolve(&instance, &mut self.store)?;
        self.store.data_mut().exports = Some(exports);

        let scratch = with_caches(&mut self.store, |_, heap| ScratchBuffers::allocate(heap))?;
        let ctx = self.store.data_mut();
        ctx.scratch = Some(scratch);
        ctx.caches.surfaces.set_null_record(scratch.null_surface());

        self.state = LifecycleState::Bootstrapped;
        tracing::debug!(scratch = %scratch.base(), "Game module bootstrapped");
        Ok(())
    }

    fn ready(&mut self) -> Result<(), BoundaryError> {
        let exports = self.store.data().exports()?.clone();
        if let Some(get_game_api) = &exports.get_game_api {
            let accepted = get_game_api
                .call(&mut self.store, GAME_API_VERSION)
                .map_err(|e| BoundaryError::from_call("GetGameAPI", e))?;
            if accepted == 0 {
                return Err(BoundaryError::ApiVersionRejected(GAME_API_VERSION));
            }
        }
        exports
            .init
            .call(&mut self.store, ())
            .map_err(|e| BoundaryError::from_call("Init", e))?;

        fetch_layout(&mut self.store, &exports)?;
        self.announce_features();
        post_sync(&mut self.store, true)?;

        self.state = LifecycleState::Ready;
        Ok(())
    }

    /// Save files are written by the module itself, so advertise enhanced
    /// save games to the host.
    fn announce_features(&mut self) {
        let host = &mut self.store.data_mut().host;
        let features = host.cvar("g_features", "0", 0).value as i32;
        host.cvar_forceset("g_features", &(features | GMF_ENHANCED_SAVEGAMES).to_string());
    }

    /// Release everything the module holds. Safe to call in any state and
    /// more than once.
    pub fn shutdown(&mut self) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        if self.state == LifecycleState::Ready
            && let Err(err) = release_allocations(&mut self.store, self.spawn_strings.take())
        {
            tracing::warn!(error = %err, "Failed to release sandbox allocations during shutdown");
        }

        let ctx = self.store.data_mut();
        ctx.exports = None;
        ctx.layout = None;
        ctx.scratch = None;
        ctx.memory = None;
        ctx.caches = Caches::default();
        self.spawn_strings = None;
        self.instance = None;
        self.module = None;
        self.state = LifecycleState::TornDown;
        tracing::info!("Game module torn down");
    }

    // ------------------------------------------------------------------
    // Game events
    // ------------------------------------------------------------------

    /// Start a new map. Level allocations and surfaces from the previous
    /// map are released first.
    pub fn spawn_entities(
        &mut self,
        mapname: &str,
        entities: &str,
        spawnpoint: &str,
    ) -> Result<(), BoundaryError> {
        // A rejected call must not drop the previous map's strings
        self.require_ready()?;
        let previous = self.spawn_strings.take();
        let strings = self.dispatch(true, |store, exports| {
            let strings = with_caches(store, |caches, heap| {
                let released = caches.tags.free_tag(heap, TAG_LEVEL)?;
                caches.surfaces.clear(heap)?;
                for addr in previous.into_iter().flatten() {
                    heap.free(addr)?;
                }
                tracing::debug!(released, "Released level allocations");
                Ok([
                    heap.dup_str(mapname)?,
                    heap.dup_str(entities)?,
                    heap.dup_str(spawnpoint)?,
                ])
            })?;
            let [map, ents, spawn] = strings.map(SandboxAddr::get);
            exports
                .spawn_entities
                .call(&mut *store, (map, ents, spawn))
                .map_err(|e| BoundaryError::from_call("SpawnEntities", e))?;
            Ok(strings)
        })?;
        self.spawn_strings = Some(strings);
        tracing::info!(mapname, "Spawned entities");
        Ok(())
    }

    /// Returns whether the module accepted the client. `userinfo` receives
    /// any changes the module made to it.
    pub fn client_connect(
        &mut self,
        ent: EntityIndex,
        userinfo: &mut String,
    ) -> Result<bool, BoundaryError> {
        self.dispatch(false, |store, exports| {
            let addr = entity_addr(store, ent)?;
            let slot = write_userinfo(store, userinfo)?;
            let accepted = exports
                .client_connect
                .call(&mut *store, (addr.get(), slot.get()))
                .map_err(|e| BoundaryError::from_call("ClientConnect", e))?;
            *userinfo = read_scratch_string(store, slot)?;
            Ok(accepted != 0)
        })
    }

    pub fn client_begin(&mut self, ent: EntityIndex) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            let addr = entity_addr(store, ent)?;
            exports
                .client_begin
                .call(&mut *store, addr.get())
                .map_err(|e| BoundaryError::from_call("ClientBegin", e))
        })
    }

    pub fn client_userinfo_changed(
        &mut self,
        ent: EntityIndex,
        userinfo: &mut String,
    ) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            let addr = entity_addr(store, ent)?;
            let slot = write_userinfo(store, userinfo)?;
            exports
                .client_userinfo_changed
                .call(&mut *store, (addr.get(), slot.get()))
                .map_err(|e| BoundaryError::from_call("ClientUserinfoChanged", e))?;
            *userinfo = read_scratch_string(store, slot)?;
            Ok(())
        })
    }

    /// Dispatch the host's current console command to a client.
    pub fn client_command(&mut self, ent: EntityIndex) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            setup_args(store)?;
            let addr = entity_addr(store, ent)?;
            exports
                .client_command
                .call(&mut *store, addr.get())
                .map_err(|e| BoundaryError::from_call("ClientCommand", e))
        })
    }

    pub fn client_think(&mut self, ent: EntityIndex, cmd: &UserCmd) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            let addr = entity_addr(store, ent)?;
            let slot = store.data().scratch()?.ucmd();
            let (memory, _) = split(&mut *store)?;
            MemoryViewMut::new(memory).write(slot, cmd)?;
            exports
                .client_think
                .call(&mut *store, (addr.get(), slot.get()))
                .map_err(|e| BoundaryError::from_call("ClientThink", e))
        })
    }

    pub fn client_disconnect(&mut self, ent: EntityIndex) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            let addr = entity_addr(store, ent)?;
            exports
                .client_disconnect
                .call(&mut *store, addr.get())
                .map_err(|e| BoundaryError::from_call("ClientDisconnect", e))
        })
    }

    /// Advance the simulation one frame.
    pub fn run_frame(&mut self) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            exports
                .run_frame
                .call(&mut *store, ())
                .map_err(|e| BoundaryError::from_call("RunFrame", e))
        })
    }

    /// Dispatch the host's current `sv` console command.
    pub fn server_command(&mut self) -> Result<(), BoundaryError> {
        self.dispatch(false, |store, exports| {
            setup_args(store)?;
            exports
                .server_command
                .call(&mut *store, ())
                .map_err(|e| BoundaryError::from_call("ServerCommand", e))
        })
    }

    pub fn write_game(&mut self, filename: &str, autosave: bool) -> Result<(), BoundaryError> {
        let path = normalize_save_path(&self.save_root, filename);
        self.dispatch(false, |store, exports| {
            let slot = write_filename(store, &path)?;
            exports
                .write_game
                .call(&mut *store, (slot.get(), i32::from(autosave)))
                .map_err(|e| BoundaryError::from_call("WriteGame", e))
        })
    }

    /// Restore game state. The module may move its entity array while
    /// reading, so the layout is fetched again afterwards.
    pub fn read_game(&mut self, filename: &str) -> Result<(), BoundaryError> {
        let path = normalize_save_path(&self.save_root, filename);
        self.dispatch(true, |store, exports| {
            let slot = write_filename(store, &path)?;
            exports
                .read_game
                .call(&mut *store, slot.get())
                .map_err(|e| BoundaryError::from_call("ReadGame", e))?;
            fetch_layout(store, exports)?;
            Ok(())
        })
    }

    /// Save the current level.
    ///
    /// The host clears every client's `inuse` before an autosave and
    /// restores it afterwards. When no host client is in use this is taken
    /// to be an autosave and the module's client entities get the same
    /// treatment for the duration of the write.
    pub fn write_level(&mut self, filename: &str) -> Result<(), BoundaryError> {
        let path = normalize_save_path(&self.save_root, filename);
        let ctx = self.store.data();
        let autosave = !ctx.edicts[1..=ctx.max_clients].iter().any(|e| e.inuse);
        self.dispatch(false, |store, exports| {
            let slot = write_filename(store, &path)?;
            let saved = if autosave {
                Some(clear_client_inuse(store)?)
            } else {
                None
            };
            exports
                .write_level
                .call(&mut *store, slot.get())
                .map_err(|e| BoundaryError::from_call("WriteLevel", e))?;
            if let Some(saved) = saved {
                restore_client_inuse(store, &saved)?;
            }
            Ok(())
        })?;
        tracing::debug!(autosave, "Wrote level");
        Ok(())
    }

    pub fn read_level(&mut self, filename: &str) -> Result<(), BoundaryError> {
        let path = normalize_save_path(&self.save_root, filename);
        self.dispatch(true, |store, exports| {
            let slot = write_filename(store, &path)?;
            exports
                .read_level
                .call(&mut *store, slot.get())
                .map_err(|e| BoundaryError::from_call("ReadLevel", e))
        })
    }

    /// Call an auxiliary parameterless export, such as a console hook.
    ///
    /// An export that does not exist is reported without faulting the
    /// module.
    pub fn call_export(&mut self, name: &str) -> Result<(), BoundaryError> {
        self.require_ready()?;
        let instance = self
            .instance
            .ok_or(BoundaryError::NotReady("game module is not instantiated"))?;
        let func = instance
            .get_typed_func::<(), ()>(&mut self.store, name)
            .map_err(|e| BoundaryError::InvalidArgument {
                function: "call_export",
                reason: format!("no parameterless export `{name}`: {e:#}"),
            })?;
        self.dispatch(false, |store, _| {
            func.call(&mut *store, ())
                .map_err(|e| BoundaryError::from_call("auxiliary export", e))
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn host(&self) -> &H {
        &self.store.data().host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.store.data_mut().host
    }

    /// Host entity array, sized by `maxentities`.
    pub fn edicts(&self) -> &[Edict] {
        &self.store.data().edicts
    }

    pub fn edicts_mut(&mut self) -> &mut [Edict] {
        &mut self.store.data_mut().edicts
    }

    pub fn num_edicts(&self) -> usize {
        self.store.data().num_edicts
    }

    pub fn max_clients(&self) -> usize {
        self.store.data().max_clients
    }

    pub fn layout(&self) -> Option<EntityLayout> {
        self.store.data().layout
    }

    /// Stats the status bar draws as strings (legacy compatibility only).
    pub fn string_stats(&self) -> &[bool; MAX_STATS] {
        self.store.data().compat.string_stats()
    }

    pub fn sandbox_memory(&self) -> Option<&[u8]> {
        let memory = self.store.data().memory?;
        Some(memory.data(&self.store))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn expect_state(
        &self,
        expected: LifecycleState,
        message: &'static str,
    ) -> Result<(), BoundaryError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BoundaryError::NotReady(message))
        }
    }

    fn require_ready(&self) -> Result<(), BoundaryError> {
        self.expect_state(LifecycleState::Ready, "game module is not ready")
    }

    /// Report a boundary failure to the host once and fault the module.
    fn fatal<T>(&mut self, result: Result<T, BoundaryError>) -> Result<T, BoundaryError> {
        if let Err(err) = &result {
            tracing::error!(error = %err, state = ?self.state, "Fatal game module error");
            self.store.data_mut().host.error(&err.to_string());
            self.state = LifecycleState::Faulted;
        }
        result
    }

    /// Refresh cvars, pre-sync, run `call`, post-sync.
    fn dispatch<R>(
        &mut self,
        force: bool,
        call: impl FnOnce(&mut GameStore<H>, &GameExports) -> Result<R, BoundaryError>,
    ) -> Result<R, BoundaryError> {
        self.require_ready()?;
        let result = run_event(&mut self.store, force, call);
        self.fatal(result)
    }
}

fn run_event<H: GameHost, R>(
    store: &mut GameStore<H>,
    force: bool,
    call: impl FnOnce(&mut GameStore<H>, &GameExports) -> Result<R, BoundaryError>,
) -> Result<R, BoundaryError> {
    let exports = store.data().exports()?.clone();
    refresh_cvars(store)?;
    pre_sync(store)?;
    let result = call(store, &exports)?;
    post_sync(store, force)?;
    Ok(result)
}

/// A positive latched host cvar, clamped to `max`.
fn latched_count(host: &mut impl GameHost, name: &str, default: usize, max: usize) -> usize {
    let cvar = host.cvar(name, &default.to_string(), CVAR_LATCH);
    let value = cvar.value as i64;
    if value < 2 {
        tracing::warn!(cvar = name, value, default, "Invalid entity count, using default");
        return default;
    }
    (value as usize).min(max)
}

/// Query the module's entity array placement and check it against both
/// sandbox memory and the host array.
fn fetch_layout<H: GameHost>(
    store: &mut GameStore<H>,
    exports: &GameExports,
) -> Result<EntityLayout, BoundaryError> {
    let base = exports
        .get_edicts
        .call(&mut *store, ())
        .map_err(|e| BoundaryError::from_call("GetEdicts", e))?;
    let stride = exports
        .get_edict_size
        .call(&mut *store, ())
        .map_err(|e| BoundaryError::from_call("GetEdictSize", e))?;
    let max = exports
        .get_max_edicts
        .call(&mut *store, ())
        .map_err(|e| BoundaryError::from_call("GetMaxEdicts", e))?;
    let num_edicts_addr = exports
        .get_num_edicts
        .call(&mut *store, ())
        .map_err(|e| BoundaryError::from_call("GetNumEdicts", e))?;

    let memory_len = store.data().memory()?.data_size(&*store);
    let layout = EntityLayout::new(
        SandboxAddr::new(base),
        stride,
        max,
        SandboxAddr::new(num_edicts_addr),
        memory_len,
    )?;

    let ctx = store.data_mut();
    if layout.max_edicts() > ctx.edicts.len() {
        return Err(BoundaryError::InvalidLayout(format!(
            "module allows {} entities but the host array holds {}",
            layout.max_edicts(),
            ctx.edicts.len()
        )));
    }
    if layout.max_edicts() <= ctx.max_clients {
        return Err(BoundaryError::InvalidLayout(format!(
            "module allows {} entities, too few for {} clients",
            layout.max_edicts(),
            ctx.max_clients
        )));
    }
    ctx.layout = Some(layout);
    tracing::debug!(
        base = %layout.base(),
        stride = layout.stride(),
        max = layout.max_edicts(),
        "Fetched entity layout"
    );
    Ok(layout)
}

/// Push host cvar changes into the mirrors the module already holds.
fn refresh_cvars<H: GameHost>(store: &mut GameStore<H>) -> Result<(), BoundaryError> {
    if store.data().caches.cvars.is_empty() {
        return Ok(());
    }
    with_caches(store, |caches, heap| {
        for name in caches.cvars.names() {
            if let Some(cvar) = heap.context().host.take_modified_cvar(&name) {
                caches.cvars.get_or_create(heap, &cvar, true)?;
            }
        }
        Ok(())
    })
}

fn pre_sync<H: GameHost>(store: &mut GameStore<H>) -> Result<(), BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    let count = ctx.num_edicts.min(layout.max_edicts());
    mirror::pre_sync(memory, &layout, &ctx.edicts[..count])
}

fn post_sync<H: GameHost>(store: &mut GameStore<H>, force: bool) -> Result<SyncStats, BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    mirror::post_sync(
        memory,
        &layout,
        &mut ctx.edicts,
        &mut ctx.num_edicts,
        force,
        ctx.client_len,
    )
}

fn entity_addr<H: GameHost>(
    store: &GameStore<H>,
    ent: EntityIndex,
) -> Result<SandboxAddr, BoundaryError> {
    store.data().layout()?.checked_addr(ent)
}

/// Copy the host's current command line into the argument slots.
fn setup_args<H: GameHost>(store: &mut GameStore<H>) -> Result<(), BoundaryError> {
    let ctx = store.data();
    let scratch = ctx.scratch()?;
    let argc = ctx.host.argc().min(MAX_CMD_ARGS - 1);
    let argv: Vec<String> = (0..argc).map(|n| ctx.host.argv(n)).collect();
    let args = ctx.host.args();
    let (memory, _) = split(store)?;
    scratch.write_args(&mut MemoryViewMut::new(memory), &argv, &args)?;
    Ok(())
}

fn write_userinfo<H: GameHost>(
    store: &mut GameStore<H>,
    userinfo: &str,
) -> Result<SandboxAddr, BoundaryError> {
    let slot = store.data().scratch()?.userinfo();
    let (memory, _) = split(store)?;
    MemoryViewMut::new(memory).write_cstr(slot, MAX_INFO_STRING as u32, userinfo)?;
    Ok(slot)
}

fn write_filename<H: GameHost>(
    store: &mut GameStore<H>,
    path: &str,
) -> Result<SandboxAddr, BoundaryError> {
    let slot = store.data().scratch()?.filename();
    let (memory, _) = split(store)?;
    MemoryViewMut::new(memory).write_cstr(slot, MAX_OSPATH as u32, path)?;
    Ok(slot)
}

fn read_scratch_string<H: GameHost>(
    store: &mut GameStore<H>,
    slot: SandboxAddr,
) -> Result<String, BoundaryError> {
    let (memory, _) = split(store)?;
    MemoryView::new(memory).read_cstr(slot)
}

/// Clear `inuse` on every sandbox client entity, returning the old flags.
fn clear_client_inuse<H: GameHost>(store: &mut GameStore<H>) -> Result<Vec<i32>, BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    (1..=ctx.max_clients)
        .map(|i| {
            let index = EntityIndex::new(i as u32);
            let mut edict: SandboxEdict = mirror::read_edict(memory, &layout, index)?;
            let inuse = edict.inuse;
            edict.inuse = 0;
            mirror::write_edict(memory, &layout, index, &edict)?;
            Ok(inuse)
        })
        .collect()
}

fn restore_client_inuse<H: GameHost>(
    store: &mut GameStore<H>,
    saved: &[i32],
) -> Result<(), BoundaryError> {
    let (memory, ctx) = split(store)?;
    let layout = ctx.layout()?;
    for (i, &inuse) in saved.iter().enumerate() {
        let index = EntityIndex::new(i as u32 + 1);
        let mut edict: SandboxEdict = mirror::read_edict(memory, &layout, index)?;
        edict.inuse = inuse;
        mirror::write_edict(memory, &layout, index, &edict)?;
    }
    Ok(())
}

fn release_allocations<H: GameHost>(
    store: &mut GameStore<H>,
    spawn_strings: Option<[SandboxAddr; 3]>,
) -> Result<(), BoundaryError> {
    with_caches(store, |caches, heap| {
        let level = caches.tags.free_tag(heap, TAG_LEVEL)?;
        let game = caches.tags.free_tag(heap, TAG_GAME)?;
        caches.surfaces.clear(heap)?;
        for addr in spawn_strings.into_iter().flatten() {
            heap.free(addr)?;
        }
        tracing::debug!(level, game, "Released tagged allocations");
        Ok(())
    })
}
