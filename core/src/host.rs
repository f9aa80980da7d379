//! Host engine interface
//!
//! [`GameHost`] is everything the bridge needs from the surrounding server:
//! collision, the spatial index, the network message buffer, console
//! variables and the console itself. The bridge owns the host-side entity
//! array and passes it to the calls that need it.

use glam::Vec3;
use q2wasm_shared::{
    AREA_SOLID, AREA_TRIGGERS, EntityState, GameClient, MAX_ENT_CLUSTERS, MULTICAST_ALL,
    MULTICAST_ALL_R, MULTICAST_PHS, MULTICAST_PHS_R, MULTICAST_PVS, MULTICAST_PVS_R, PRINT_CHAT,
    PRINT_HIGH, PRINT_LOW, PRINT_MEDIUM, Plane, UserCmd,
};

use crate::memory::EntityIndex;

/// Host-side mirror of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edict {
    pub s: EntityState,
    /// Present while the sandbox entity has a client.
    pub client: Option<Box<GameClient>>,
    pub inuse: bool,
    pub linkcount: i32,
    /// Linked into the host's area nodes.
    pub area_linked: bool,
    pub num_clusters: i32,
    pub clusternums: [i32; MAX_ENT_CLUSTERS],
    pub headnode: i32,
    pub areanum: i32,
    pub areanum2: i32,
    pub svflags: i32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub absmin: Vec3,
    pub absmax: Vec3,
    pub size: Vec3,
    pub solid: i32,
    pub clipmask: i32,
    pub owner: Option<EntityIndex>,
}

/// Snapshot of a host cvar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostCvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub value: f32,
}

/// Stable identity of a host surface descriptor within one map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSurface {
    pub id: SurfaceId,
    pub name: String,
    pub flags: i32,
    pub value: i32,
}

/// Result of a host collision trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub allsolid: bool,
    pub startsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: Plane,
    pub surface: Option<HostSurface>,
    pub contents: i32,
    pub ent: Option<EntityIndex>,
}

/// Movement state in the host's native encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmoveState {
    pub pm_type: i32,
    pub origin: [i16; 3],
    pub velocity: [i16; 3],
    pub pm_flags: u8,
    pub pm_time: u8,
    pub gravity: i16,
    pub delta_angles: [i16; 3],
}

/// Input and output of one player movement step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pmove {
    pub s: PmoveState,
    pub cmd: UserCmd,
    pub snapinitial: bool,
    pub touchents: Vec<EntityIndex>,
    pub viewangles: Vec3,
    pub viewheight: f32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub groundentity: Option<EntityIndex>,
    pub watertype: i32,
    pub waterlevel: i32,
}

/// Collision callbacks available while the host simulates movement.
///
/// The bridge routes both to the game module's own `PmoveTrace` and
/// `PmovePointContents` exports. If a callback fails, it returns a default
/// value and the failure is reported once [`GameHost::pmove`] returns.
pub trait PmoveWorld {
    fn trace(&mut self, start: Vec3, mins: Vec3, maxs: Vec3, end: Vec3) -> Trace;

    fn point_contents(&mut self, point: Vec3) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintLevel {
    Low,
    Medium,
    High,
    Chat,
}

impl PrintLevel {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            PRINT_LOW => Some(Self::Low),
            PRINT_MEDIUM => Some(Self::Medium),
            PRINT_HIGH => Some(Self::High),
            PRINT_CHAT => Some(Self::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multicast {
    All { reliable: bool },
    Phs { reliable: bool },
    Pvs { reliable: bool },
}

impl Multicast {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            MULTICAST_ALL => Some(Self::All { reliable: false }),
            MULTICAST_PHS => Some(Self::Phs { reliable: false }),
            MULTICAST_PVS => Some(Self::Pvs { reliable: false }),
            MULTICAST_ALL_R => Some(Self::All { reliable: true }),
            MULTICAST_PHS_R => Some(Self::Phs { reliable: true }),
            MULTICAST_PVS_R => Some(Self::Pvs { reliable: true }),
            _ => None,
        }
    }
}

/// Which area list `BoxEdicts` searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxArea {
    Solid,
    Triggers,
}

impl BoxArea {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            AREA_SOLID => Some(Self::Solid),
            AREA_TRIGGERS => Some(Self::Triggers),
            _ => None,
        }
    }
}

/// A value appended to the pending network message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Char(i8),
    Byte(u8),
    Short(i16),
    Long(i32),
    Float(f32),
    String(String),
    Position(Vec3),
    Dir(Vec3),
    Angle(f32),
}

/// Parameters shared by `sound` and `positioned_sound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sound {
    pub channel: i32,
    pub sound_index: i32,
    pub volume: f32,
    pub attenuation: f32,
    pub time_offset: f32,
}

/// Services the host engine provides to the game module.
pub trait GameHost: Send + 'static {
    // Diagnostics

    fn bprint(&mut self, level: PrintLevel, message: &str);

    fn dprint(&mut self, message: &str);

    /// Print to one client, or to the console when `ent` is `None`.
    fn cprint(&mut self, edicts: &[Edict], ent: Option<EntityIndex>, level: PrintLevel, message: &str);

    fn centerprint(&mut self, edicts: &[Edict], ent: EntityIndex, message: &str);

    /// Fatal error. Called once per boundary failure, after which the game
    /// module is unusable.
    fn error(&mut self, message: &str);

    // World queries

    #[allow(clippy::too_many_arguments)]
    fn trace(
        &mut self,
        edicts: &[Edict],
        start: Vec3,
        mins: Vec3,
        maxs: Vec3,
        end: Vec3,
        passent: EntityIndex,
        content_mask: i32,
    ) -> Trace;

    fn point_contents(&mut self, point: Vec3) -> i32;

    fn in_pvs(&mut self, a: Vec3, b: Vec3) -> bool;

    fn in_phs(&mut self, a: Vec3, b: Vec3) -> bool;

    fn areas_connected(&mut self, area1: i32, area2: i32) -> bool;

    fn set_area_portal_state(&mut self, portal: i32, open: bool);

    // Entity linkage

    fn link_entity(&mut self, edicts: &mut [Edict], ent: EntityIndex);

    fn unlink_entity(&mut self, edicts: &mut [Edict], ent: EntityIndex);

    /// Set the entity's model, updating `s.modelindex` and, for inline
    /// models, its bounds.
    fn set_model(&mut self, edicts: &mut [Edict], ent: EntityIndex, name: &str);

    fn box_edicts(
        &mut self,
        edicts: &[Edict],
        mins: Vec3,
        maxs: Vec3,
        max_count: usize,
        area: BoxArea,
    ) -> Vec<EntityIndex>;

    /// Run one player movement step.
    fn pmove(pm: &mut Pmove, world: &mut dyn PmoveWorld)
    where
        Self: Sized;

    // Sound

    fn sound(&mut self, edicts: &[Edict], ent: Option<EntityIndex>, sound: &Sound);

    fn positioned_sound(
        &mut self,
        edicts: &[Edict],
        origin: Vec3,
        ent: Option<EntityIndex>,
        sound: &Sound,
    );

    // Messaging

    fn write_message(&mut self, value: MessageValue);

    fn multicast(&mut self, origin: Vec3, to: Multicast);

    fn unicast(&mut self, edicts: &[Edict], ent: EntityIndex, reliable: bool);

    // Resources

    fn model_index(&mut self, name: &str) -> i32;

    fn sound_index(&mut self, name: &str) -> i32;

    fn image_index(&mut self, name: &str) -> i32;

    fn configstring(&mut self, index: i32, value: &str);

    // Cvars

    /// Find or create a cvar.
    fn cvar(&mut self, name: &str, default: &str, flags: i32) -> HostCvar;

    fn cvar_set(&mut self, name: &str, value: &str) -> HostCvar;

    fn cvar_forceset(&mut self, name: &str, value: &str) -> HostCvar;

    /// Snapshot of `name` if it changed since last asked, clearing the
    /// host's modified flag.
    fn take_modified_cvar(&mut self, name: &str) -> Option<HostCvar>;

    // Commands

    fn argc(&self) -> usize;

    fn argv(&self, n: usize) -> String;

    fn args(&self) -> String;

    fn add_command_string(&mut self, text: &str);

    fn debug_graph(&mut self, _value: f32, _color: i32) {}
}
