//! Byte layouts of structures living in sandbox memory.
//!
//! Every struct here mirrors the wasm32 layout of the game module's C
//! declarations. Pointers inside the sandbox are 32-bit offsets, so they
//! appear as `u32` fields and must be translated before use.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::constants::{
    CMD_ARG_LEN, MAX_CMD_ARGS, MAX_CMD_LINE, MAX_ENT_CLUSTERS, MAX_INFO_STRING, MAX_OSPATH,
    MAX_STATS, MAX_SURFACE_NAME, MAX_TOUCH,
};

/// Network-visible entity state.
///
/// Shared verbatim between the sandbox record and the host mirror.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct EntityState {
    pub number: i32,
    pub origin: Vec3,
    pub angles: Vec3,
    pub old_origin: Vec3,
    pub modelindex: i32,
    pub modelindex2: i32,
    pub modelindex3: i32,
    pub modelindex4: i32,
    pub frame: i32,
    pub skinnum: i32,
    pub effects: u32,
    pub renderfx: u32,
    pub solid: i32,
    pub sound: i32,
    /// One-shot event, cleared after the frame it fires in.
    pub event: i32,
}

/// Doubly linked list node used by the server's area nodes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SandboxList {
    pub next: u32,
    pub prev: u32,
}

/// Leading, server-visible part of the game module's entity.
///
/// The module's real entity is larger; only this prefix is shared and the
/// remainder of each stride belongs to the game.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SandboxEdict {
    pub s: EntityState,
    /// Sandbox address of the [`GameClient`], or 0.
    pub client: u32,
    pub inuse: i32,
    pub linkcount: i32,
    pub area: SandboxList,
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
    /// Sandbox address of the owning entity, or 0.
    pub owner: u32,
}

/// Movement state as the game module declares it (32-bit fields).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SandboxPmoveState {
    pub pm_type: i32,
    pub origin: [i32; 3],
    pub velocity: [i32; 3],
    pub pm_flags: i32,
    pub pm_time: i32,
    pub gravity: i32,
    pub delta_angles: [i32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PlayerState {
    pub pmove: SandboxPmoveState,
    pub viewangles: Vec3,
    pub viewoffset: Vec3,
    pub kick_angles: Vec3,
    pub gunangles: Vec3,
    pub gunoffset: Vec3,
    pub gunindex: i32,
    pub gunframe: i32,
    pub blend: [f32; 4],
    pub fov: f32,
    pub rdflags: i32,
    pub stats: [i16; MAX_STATS],
}

/// Server-visible prefix of the game module's client.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GameClient {
    pub ps: PlayerState,
    pub ping: i32,
    /// Missing from legacy client layouts.
    pub client_num: i32,
}

impl GameClient {
    /// Bytes copied per client when mirroring.
    pub const fn copy_len(legacy: bool) -> usize {
        if legacy {
            size_of::<Self>() - size_of::<i32>()
        } else {
            size_of::<Self>()
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UserCmd {
    pub msec: u8,
    pub buttons: u8,
    pub angles: [i16; 3],
    pub forwardmove: i16,
    pub sidemove: i16,
    pub upmove: i16,
    pub impulse: u8,
    pub lightlevel: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    pub kind: u8,
    pub signbits: u8,
    pub pad: [u8; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SandboxTrace {
    pub allsolid: i32,
    pub startsolid: i32,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: Plane,
    /// Sandbox address of a [`SandboxSurface`].
    pub surface: u32,
    pub contents: i32,
    /// Sandbox address of the hit entity, or 0.
    pub ent: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SandboxSurface {
    pub name: [u8; MAX_SURFACE_NAME],
    pub flags: i32,
    pub value: i32,
}

impl SandboxSurface {
    /// Build a record, truncating `name` so the terminator always fits.
    pub fn new(name: &str, flags: i32, value: i32) -> Self {
        let mut record = Self {
            flags,
            value,
            ..Self::default()
        };
        let len = name.len().min(MAX_SURFACE_NAME - 1);
        record.name[..len].copy_from_slice(&name.as_bytes()[..len]);
        record
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_SURFACE_NAME);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SandboxCvar {
    pub name: u32,
    pub string: u32,
    pub latched_string: u32,
    pub flags: i32,
    pub modified: i32,
    pub value: f32,
    pub int_value: i32,
}

/// Movement record passed to the `Pmove` import.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SandboxPmove {
    pub s: SandboxPmoveState,
    pub cmd: UserCmd,
    pub snapinitial: i32,
    pub numtouch: i32,
    pub touchents: [u32; MAX_TOUCH],
    pub viewangles: Vec3,
    pub viewheight: f32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub groundentity: u32,
    pub watertype: i32,
    pub waterlevel: i32,
    /// Function table slots; the host calls the module's exports instead.
    pub trace: u32,
    pub pointcontents: u32,
}

/// Fixed block allocated once in the sandbox for passing arguments.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ScratchLayout {
    pub cmds: [[u8; CMD_ARG_LEN]; MAX_CMD_ARGS],
    pub scmd: [u8; MAX_CMD_LINE],
    pub userinfo: [u8; MAX_INFO_STRING],
    pub filename: [u8; MAX_OSPATH],
    pub ucmd: UserCmd,
    pub trace: SandboxTrace,
    pub vectors: [Vec3; 4],
    /// Static record every nameless surface maps to.
    pub null_surface: SandboxSurface,
}
