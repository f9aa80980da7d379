//! Shared test utilities for integration and unit tests

use std::collections::BTreeMap;

use glam::Vec3;
use hashbrown::{HashMap, HashSet};

use crate::config::BridgeConfig;
use crate::error::BoundaryError;
use crate::host::{
    BoxArea, Edict, GameHost, HostCvar, HostSurface, MessageValue, Multicast, Pmove, PmoveWorld,
    PrintLevel, Sound, Trace,
};
use crate::memory::{EntityIndex, MemoryView, SandboxAddr, SandboxHeap};
use crate::wasm::GameModule;

// ============================================================================
// Test Host Implementation
// ============================================================================

/// Host that answers every query trivially and records what it was asked.
#[derive(Debug, Default)]
pub struct TestHost {
    pub console: Vec<String>,
    pub centerprints: Vec<(EntityIndex, String)>,
    pub errors: Vec<String>,

    pub cvars: HashMap<String, HostCvar>,
    pub modified: HashSet<String>,
    pub configstrings: Vec<(i32, String)>,
    pub models: Vec<String>,

    pub traces: usize,
    /// Surface reported by every trace.
    pub trace_surface: Option<HostSurface>,
    /// Entities in use host side at the last trace.
    pub traced_in_use: Vec<EntityIndex>,
    pub links: Vec<EntityIndex>,
    pub unlinks: Vec<EntityIndex>,
    pub portals: Vec<(i32, bool)>,

    /// Sound parameters with the emitter's origin as the host saw it.
    pub sounds: Vec<(Option<EntityIndex>, Sound, Vec3)>,
    pub messages: Vec<MessageValue>,
    pub multicasts: Vec<(Vec3, Multicast)>,
    pub unicasts: Vec<(EntityIndex, bool)>,

    /// Current command line, `argv(0)` first.
    pub args: Vec<String>,
    pub commands: Vec<String>,
}

impl TestHost {
    /// Set a cvar as if typed at the console, marking it modified.
    pub fn set_cvar(&mut self, name: &str, value: &str) {
        self.store_cvar(name, value, 0);
        self.modified.insert(name.to_string());
    }

    fn store_cvar(&mut self, name: &str, value: &str, flags: i32) -> HostCvar {
        let cvar = self.cvars.entry(name.to_string()).or_insert_with(|| HostCvar {
            name: name.to_string(),
            flags,
            ..HostCvar::default()
        });
        cvar.string = value.to_string();
        cvar.value = value.trim().parse().unwrap_or(0.0);
        cvar.clone()
    }

    pub fn cvar_string(&self, name: &str) -> Option<&str> {
        self.cvars.get(name).map(|cvar| cvar.string.as_str())
    }
}

impl GameHost for TestHost {
    fn bprint(&mut self, _level: PrintLevel, message: &str) {
        self.console.push(message.to_string());
    }

    fn dprint(&mut self, message: &str) {
        self.console.push(message.to_string());
    }

    fn cprint(&mut self, _edicts: &[Edict], _ent: Option<EntityIndex>, _level: PrintLevel, message: &str) {
        self.console.push(message.to_string());
    }

    fn centerprint(&mut self, _edicts: &[Edict], ent: EntityIndex, message: &str) {
        self.centerprints.push((ent, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn trace(
        &mut self,
        edicts: &[Edict],
        _start: Vec3,
        _mins: Vec3,
        _maxs: Vec3,
        end: Vec3,
        _passent: EntityIndex,
        _content_mask: i32,
    ) -> Trace {
        self.traces += 1;
        self.traced_in_use = edicts
            .iter()
            .enumerate()
            .filter(|(_, e)| e.inuse)
            .map(|(i, _)| EntityIndex::new(i as u32))
            .collect();
        Trace {
            fraction: 1.0,
            endpos: end,
            surface: self.trace_surface.clone(),
            ..Trace::default()
        }
    }

    fn point_contents(&mut self, _point: Vec3) -> i32 {
        0
    }

    fn in_pvs(&mut self, _a: Vec3, _b: Vec3) -> bool {
        true
    }

    fn in_phs(&mut self, _a: Vec3, _b: Vec3) -> bool {
        true
    }

    fn areas_connected(&mut self, area1: i32, area2: i32) -> bool {
        area1 == area2
    }

    fn set_area_portal_state(&mut self, portal: i32, open: bool) {
        self.portals.push((portal, open));
    }

    fn link_entity(&mut self, edicts: &mut [Edict], ent: EntityIndex) {
        let edict = &mut edicts[ent.get()];
        if edict.linkcount == 0 {
            edict.s.old_origin = edict.s.origin;
        }
        edict.linkcount += 1;
        edict.area_linked = true;
        edict.size = edict.maxs - edict.mins;
        edict.absmin = edict.s.origin + edict.mins;
        edict.absmax = edict.s.origin + edict.maxs;
        self.links.push(ent);
    }

    fn unlink_entity(&mut self, edicts: &mut [Edict], ent: EntityIndex) {
        edicts[ent.get()].area_linked = false;
        self.unlinks.push(ent);
    }

    fn set_model(&mut self, edicts: &mut [Edict], ent: EntityIndex, name: &str) {
        let index = self.model_index(name);
        let edict = &mut edicts[ent.get()];
        edict.s.modelindex = index;
        if name.starts_with('*') {
            edict.mins = Vec3::splat(-16.0);
            edict.maxs = Vec3::splat(16.0);
        }
    }

    fn box_edicts(
        &mut self,
        edicts: &[Edict],
        _mins: Vec3,
        _maxs: Vec3,
        max_count: usize,
        _area: BoxArea,
    ) -> Vec<EntityIndex> {
        edicts
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, e)| e.inuse)
            .map(|(i, _)| EntityIndex::new(i as u32))
            .take(max_count)
            .collect()
    }

    fn pmove(pm: &mut Pmove, world: &mut dyn PmoveWorld) {
        let origin = Vec3::ZERO;
        let trace = world.trace(origin, pm.mins, pm.maxs, origin + Vec3::new(0.0, 0.0, -1.0));
        pm.viewheight = trace.fraction;
        pm.watertype = world.point_contents(origin);
    }

    fn sound(&mut self, edicts: &[Edict], ent: Option<EntityIndex>, sound: &Sound) {
        let origin = ent.map_or(Vec3::ZERO, |ent| edicts[ent.get()].s.origin);
        self.sounds.push((ent, *sound, origin));
    }

    fn positioned_sound(
        &mut self,
        _edicts: &[Edict],
        origin: Vec3,
        ent: Option<EntityIndex>,
        sound: &Sound,
    ) {
        self.sounds.push((ent, *sound, origin));
    }

    fn write_message(&mut self, value: MessageValue) {
        self.messages.push(value);
    }

    fn multicast(&mut self, origin: Vec3, to: Multicast) {
        self.multicasts.push((origin, to));
    }

    fn unicast(&mut self, _edicts: &[Edict], ent: EntityIndex, reliable: bool) {
        self.unicasts.push((ent, reliable));
    }

    fn model_index(&mut self, name: &str) -> i32 {
        let position = match self.models.iter().position(|m| m == name) {
            Some(position) => position,
            None => {
                self.models.push(name.to_string());
                self.models.len() - 1
            }
        };
        position as i32 + 1
    }

    fn sound_index(&mut self, _name: &str) -> i32 {
        1
    }

    fn image_index(&mut self, _name: &str) -> i32 {
        1
    }

    fn configstring(&mut self, index: i32, value: &str) {
        self.configstrings.push((index, value.to_string()));
    }

    fn cvar(&mut self, name: &str, default: &str, flags: i32) -> HostCvar {
        match self.cvars.get(name) {
            Some(cvar) => cvar.clone(),
            None => self.store_cvar(name, default, flags),
        }
    }

    fn cvar_set(&mut self, name: &str, value: &str) -> HostCvar {
        self.modified.insert(name.to_string());
        self.store_cvar(name, value, 0)
    }

    fn cvar_forceset(&mut self, name: &str, value: &str) -> HostCvar {
        self.modified.insert(name.to_string());
        self.store_cvar(name, value, 0)
    }

    fn take_modified_cvar(&mut self, name: &str) -> Option<HostCvar> {
        if self.modified.remove(name) {
            self.cvars.get(name).cloned()
        } else {
            None
        }
    }

    fn argc(&self) -> usize {
        self.args.len()
    }

    fn argv(&self, n: usize) -> String {
        self.args.get(n).cloned().unwrap_or_default()
    }

    fn args(&self) -> String {
        self.args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default()
    }

    fn add_command_string(&mut self, text: &str) {
        self.commands.push(text.to_string());
    }
}

// ============================================================================
// Plain Memory Heap
// ============================================================================

/// Bump allocator over a byte vector, for cache tests without a module.
pub struct VecHeap {
    pub memory: Vec<u8>,
    next: u32,
    pub allocations: usize,
    pub frees: usize,
    /// Live blocks by address, with their sizes.
    pub live: BTreeMap<u32, u32>,
}

impl VecHeap {
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0; size],
            next: 256,
            allocations: 0,
            frees: 0,
            live: BTreeMap::new(),
        }
    }
}

impl SandboxHeap for VecHeap {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn malloc(&mut self, size: u32) -> Result<SandboxAddr, BoundaryError> {
        let addr = self.next;
        let end = addr.saturating_add(size).saturating_add(7) & !7;
        if end as usize > self.memory.len() {
            return Err(BoundaryError::OutOfMemory(size));
        }
        self.next = end;
        self.allocations += 1;
        self.live.insert(addr, size);
        Ok(SandboxAddr::new(addr))
    }

    fn free(&mut self, addr: SandboxAddr) -> Result<(), BoundaryError> {
        if self.live.remove(&addr.get()).is_none() {
            return Err(BoundaryError::UntrackedFree(addr.get()));
        }
        self.frees += 1;
        Ok(())
    }
}

// ============================================================================
// Test Game Module
// ============================================================================

pub const NUM_EDICTS_ADDR: u32 = 1024;
pub const CVAR_PTR_ADDR: u32 = 1028;
pub const MAP_PTR_ADDR: u32 = 1032;
pub const LEVEL_ALLOC_ADDR: u32 = 1036;
pub const BOX_COUNT_ADDR: u32 = 1040;
pub const API_VERSION_ADDR: u32 = 1044;
pub const FREE_COUNT_ADDR: u32 = 1048;
pub const FRAME_COUNT_ADDR: u32 = 1052;
pub const LEVEL_INUSE_ADDR: u32 = 1056;
pub const EDICT_BASE: u32 = 4096;
pub const EDICT_STRIDE: u32 = 272;
pub const MODULE_MAX_EDICTS: u32 = 64;
pub const TRACE_OUT_ADDR: u32 = 24576;
pub const BOX_LIST_ADDR: u32 = 28672;
pub const CLIENT_ADDR: u32 = 32768;
pub const PMOVE_ADDR: u32 = 40000;
/// Entity base after the test module's `ReadGame`.
pub const RESTORED_EDICT_BASE: u32 = 45056;
/// Unused entity whose record `ReadLevel` edits.
pub const IDLE_ENTITY: u32 = 3;

/// Entity the test module spawns, links and gives a model.
pub const SPAWNED_ENTITY: u32 = 5;

/// Address of entity `index` in the test module.
pub fn edict_addr(index: u32) -> u32 {
    EDICT_BASE + index * EDICT_STRIDE
}

/// A small but complete game module.
///
/// Observable results go to fixed addresses (see the `*_ADDR` constants) and
/// extra `exercise_*` exports exercise individual host services through
/// [`GameModule::call_export`].
pub fn game_wat() -> String {
    r#"
(module
    (import "q2" "dprint" (func $dprint (param i32)))
    (import "q2" "bprint" (func $bprint (param i32 i32)))
    (import "q2" "cprint" (func $cprint (param i32 i32 i32)))
    (import "q2" "centerprint" (func $centerprint (param i32 i32)))
    (import "q2" "error" (func $error (param i32)))
    (import "q2" "cvar" (func $cvar (param i32 i32 i32) (result i32)))
    (import "q2" "TagMalloc" (func $tag_malloc (param i32 i32) (result i32)))
    (import "q2" "TagFree" (func $tag_free (param i32)))
    (import "q2" "configstring" (func $configstring (param i32 i32)))
    (import "q2" "linkentity" (func $linkentity (param i32)))
    (import "q2" "setmodel" (func $setmodel (param i32 i32)))
    (import "q2" "BoxEdicts" (func $box_edicts (param f32 f32 f32 f32 f32 f32 i32 i32 i32) (result i32)))
    (import "q2" "Pmove" (func $pmove (param i32)))
    (import "q2" "trace" (func $trace (param f32 f32 f32 f32 f32 f32 f32 f32 f32 f32 f32 f32 i32 i32 i32)))
    (import "q2" "sound" (func $sound (param i32 i32 i32 f32 f32 f32)))
    (import "q2" "WriteByte" (func $write_byte (param i32)))
    (import "q2" "WriteString" (func $write_string (param i32)))
    (import "q2" "multicast" (func $multicast (param f32 f32 f32 i32)))
    (import "q2" "argv" (func $argv (param i32) (result i32)))
    (import "q2" "args" (func $args (result i32)))

    (memory (export "memory") 4)

    (global $heap (mut i32) (i32.const 65536))
    (global $edicts (mut i32) (i32.const 4096))

    (data (i32.const 1056) "\ff\ff\ff\ff")
    (data (i32.const 2048) "deathmatch\00")
    (data (i32.const 2064) "0\00")
    (data (i32.const 2080) "\\accepted\\1\00")
    (data (i32.const 2112) "models/target.md2\00")
    (data (i32.const 2144) "test message\00")
    (data (i32.const 2176) "fatal test\00")

    ;; Allocator

    (func $malloc (export "malloc") (param $size i32) (result i32)
        (local $ptr i32)
        (local $next i32)
        (local.set $ptr (global.get $heap))
        (local.set $next
            (i32.and
                (i32.add (i32.add (local.get $ptr) (local.get $size)) (i32.const 7))
                (i32.const -8)))
        (if (i32.gt_u (local.get $next) (i32.const 262144))
            (then (return (i32.const 0))))
        (global.set $heap (local.get $next))
        (local.get $ptr))

    (func (export "free") (param i32)
        (i32.store (i32.const 1048) (i32.add (i32.load (i32.const 1048)) (i32.const 1))))

    ;; Entity array

    (func (export "GetEdicts") (result i32) (global.get $edicts))
    (func (export "GetEdictSize") (result i32) (i32.const 272))
    (func (export "GetNumEdicts") (result i32) (i32.const 1024))
    (func (export "GetMaxEdicts") (result i32) (i32.const 64))

    ;; Lifecycle

    (func (export "GetGameAPI") (param $version i32) (result i32)
        (i32.store (i32.const 1044) (local.get $version))
        (i32.eq (local.get $version) (i32.const 3)))

    (func (export "Init")
        (i32.store (i32.const 1024) (i32.const 5))
        (i32.store offset=88 (i32.const 4096) (i32.const 1))
        (i32.store (i32.const 1028)
            (call $cvar (i32.const 2048) (i32.const 2064) (i32.const 0))))

    (func (export "SpawnEntities") (param $map i32) (param $ents i32) (param $spawn i32)
        (i32.store (i32.const 1032) (local.get $map))
        (i32.store (i32.const 1036) (call $tag_malloc (i32.const 64) (i32.const 766)))
        (call $configstring (i32.const 0) (local.get $map))
        ;; entity 5: in use, at x = 100, with a model, linked
        (i32.store (i32.const 1024) (i32.const 6))
        (i32.store offset=88 (i32.const 5456) (i32.const 1))
        (f32.store offset=4 (i32.const 5456) (f32.const 100))
        (call $setmodel (i32.const 5456) (i32.const 2112))
        (call $linkentity (i32.const 5456)))

    (func (export "ClientConnect") (param $ent i32) (param $userinfo i32) (result i32)
        (memory.copy (local.get $userinfo) (i32.const 2080) (i32.const 12))
        (i32.store offset=84 (local.get $ent) (i32.const 32768))
        (i32.store offset=88 (local.get $ent) (i32.const 1))
        (i32.const 1))

    (func (export "ClientBegin") (param $ent i32)
        (call $linkentity (local.get $ent)))

    (func (export "ClientUserinfoChanged") (param i32 i32))

    (func (export "ClientCommand") (param $ent i32)
        (call $dprint (call $argv (i32.const 1))))

    (func (export "ClientDisconnect") (param $ent i32)
        (i32.store offset=84 (local.get $ent) (i32.const 0))
        (i32.store offset=88 (local.get $ent) (i32.const 0)))

    (func (export "ClientThink") (param $ent i32) (param $cmd i32)
        (call $pmove (i32.const 40000)))

    (func (export "RunFrame")
        (i32.store (i32.const 1052) (i32.add (i32.load (i32.const 1052)) (i32.const 1))))

    (func (export "ServerCommand")
        (call $dprint (call $args)))

    (func (export "WriteGame") (param $filename i32) (param $autosave i32)
        (call $dprint (local.get $filename)))

    ;; a restored game reallocates the entity array
    (func (export "ReadGame") (param i32)
        (memory.copy (i32.const 45056) (i32.const 4096) (i32.const 17408))
        (global.set $edicts (i32.const 45056)))

    (func (export "WriteLevel") (param $filename i32)
        (i32.store (i32.const 1056) (i32.load (i32.const 4456))))

    ;; entity 3 stays unused but its origin changes
    (func (export "ReadLevel") (param i32)
        (f32.store offset=4 (i32.const 4912) (f32.const 77)))

    ;; Movement callbacks

    (func (export "PmoveTrace")
        (param $pm i32)
        (param f32 f32 f32 f32 f32 f32 f32 f32 f32)
        (param $ex f32) (param $ey f32) (param $ez f32)
        (param $out i32)
        (f32.store offset=8 (local.get $out) (f32.const 0.5))
        (f32.store offset=12 (local.get $out) (local.get $ex))
        (f32.store offset=16 (local.get $out) (local.get $ey))
        (f32.store offset=20 (local.get $out) (local.get $ez)))

    (func (export "PmovePointContents") (param i32 f32 f32 f32) (result i32)
        (i32.const 1))

    ;; Entry points driven directly by tests

    (func (export "exercise_idle_edit")
        (f32.store offset=4 (i32.const 4912) (f32.const 55)))

    (func (export "exercise_trace")
        (call $trace
            (f32.const 0) (f32.const 0) (f32.const 0)
            (f32.const -16) (f32.const -16) (f32.const -16)
            (f32.const 16) (f32.const 16) (f32.const 16)
            (f32.const 0) (f32.const 0) (f32.const -128)
            (i32.const 0) (i32.const -1) (i32.const 24576)))

    (func (export "exercise_box")
        (i32.store (i32.const 1040)
            (call $box_edicts
                (f32.const -1000) (f32.const -1000) (f32.const -1000)
                (f32.const 1000) (f32.const 1000) (f32.const 1000)
                (i32.const 28672) (i32.const 16) (i32.const 1))))

    (func (export "exercise_sound")
        (f32.store offset=8 (i32.const 5456) (f32.const 42))
        (call $sound (i32.const 5456) (i32.const 0) (i32.const 3)
            (f32.const 1) (f32.const 1) (f32.const 0)))

    (func (export "exercise_message")
        (call $write_byte (i32.const 7))
        (call $write_string (i32.const 2144))
        (call $multicast (f32.const 1) (f32.const 2) (f32.const 3) (i32.const 0)))

    (func (export "exercise_print")
        (call $bprint (i32.const 2) (i32.const 2144))
        (call $cprint (i32.const 0) (i32.const 1) (i32.const 2144))
        (call $centerprint (i32.const 0) (i32.const 2144)))

    (func (export "exercise_error")
        (call $error (i32.const 2176)))

    (func (export "exercise_trap")
        unreachable)

    (func (export "exercise_bad_entity")
        (call $linkentity (i32.const 4097)))

    (func (export "exercise_foreign_free")
        (call $tag_free (i32.const 12345)))

    (func (export "exercise_oom")
        (drop (call $tag_malloc (i32.const 1000000) (i32.const 765))))
)
"#
    .to_string()
}

/// [`game_wat`] compiled to a binary module.
pub fn game_wasm() -> Vec<u8> {
    wat::parse_str(game_wat()).unwrap()
}

/// A test module taken all the way to `Ready`.
pub fn ready_module(host: TestHost) -> GameModule<TestHost> {
    let mut module = GameModule::new(host, BridgeConfig::default()).unwrap();
    module.load_bytes(&game_wasm()).unwrap();
    module.init().unwrap();
    module
}

/// Read a value the test module left in its memory.
pub fn sandbox_read<T: bytemuck::Pod>(module: &GameModule<TestHost>, addr: u32) -> T {
    MemoryView::new(module.sandbox_memory().unwrap())
        .read(SandboxAddr::new(addr))
        .unwrap()
}
