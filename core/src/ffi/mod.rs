//! Host services imported by the game module
//!
//! Every function here is bound under the `q2` import module. Arguments are
//! plain integers, floats and sandbox addresses; each address is validated
//! before it is read. A failed validation returns a [`BoundaryError`],
//! which wasmtime raises as a trap in the calling export.

mod command;
mod cvar;
mod entity;
mod memory;
mod message;
mod pmove;
mod print;
mod resource;
mod sound;
mod world;


use anyhow::Result;
use glam::Vec3;
use wasmtime::{AsContextMut, Caller, Linker};

use crate::error::BoundaryError;
use crate::host::GameHost;
use crate::memory::{EntityIndex, MemoryView, SandboxAddr};
use crate::wasm::SandboxContext;
use crate::wasm::state::split;

/// Import module name the game binds against.
pub const IMPORT_MODULE: &str = "q2";

type GameCaller<'a, H> = Caller<'a, SandboxContext<H>>;

/// Register every host service with the linker
pub fn register_game_imports<H: GameHost>(linker: &mut Linker<SandboxContext<H>>) -> Result<()> {
    // Diagnostics
    linker.func_wrap(IMPORT_MODULE, "dprint", print::dprint::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "bprint", print::bprint::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "cprint", print::cprint::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "centerprint", print::centerprint::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "error", print::error::<H>)?;

    // Cvars
    linker.func_wrap(IMPORT_MODULE, "cvar", cvar::cvar::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "cvar_set", cvar::cvar_set::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "cvar_forceset", cvar::cvar_forceset::<H>)?;

    // Tagged memory
    linker.func_wrap(IMPORT_MODULE, "TagMalloc", memory::tag_malloc::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "TagFree", memory::tag_free::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "FreeTags", memory::free_tags::<H>)?;

    // Resources
    linker.func_wrap(IMPORT_MODULE, "configstring", resource::configstring::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "modelindex", resource::modelindex::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "soundindex", resource::soundindex::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "imageindex", resource::imageindex::<H>)?;

    // Entity linkage
    linker.func_wrap(IMPORT_MODULE, "linkentity", entity::linkentity::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "unlinkentity", entity::unlinkentity::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "setmodel", entity::setmodel::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "BoxEdicts", entity::box_edicts::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "Pmove", pmove::pmove::<H>)?;

    // World queries
    linker.func_wrap(IMPORT_MODULE, "trace", world::trace::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "pointcontents", world::pointcontents::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "inPVS", world::in_pvs::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "inPHS", world::in_phs::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "AreasConnected", world::areas_connected::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "SetAreaPortalState", world::set_area_portal_state::<H>)?;

    // Sound
    linker.func_wrap(IMPORT_MODULE, "sound", sound::sound::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "positioned_sound", sound::positioned_sound::<H>)?;

    // Messaging
    linker.func_wrap(IMPORT_MODULE, "WriteChar", message::write_char::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteByte", message::write_byte::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteShort", message::write_short::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteLong", message::write_long::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteFloat", message::write_float::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteString", message::write_string::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WritePosition", message::write_position::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteDir", message::write_dir::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "WriteAngle", message::write_angle::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "unicast", message::unicast::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "multicast", message::multicast::<H>)?;

    // Commands
    linker.func_wrap(IMPORT_MODULE, "argc", command::argc::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "argv", command::argv::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "args", command::args::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "AddCommandString", command::add_command_string::<H>)?;
    linker.func_wrap(IMPORT_MODULE, "DebugGraph", command::debug_graph::<H>)?;

    Ok(())
}

/// NUL-terminated string argument. Null is rejected.
fn read_string<H: GameHost>(
    caller: &mut GameCaller<'_, H>,
    addr: u32,
) -> Result<String, BoundaryError> {
    let (memory, _) = split(caller.as_context_mut())?;
    MemoryView::new(memory).read_cstr(SandboxAddr::new(addr))
}

/// String argument where null means "none".
fn read_optional_string<H: GameHost>(
    caller: &mut GameCaller<'_, H>,
    addr: u32,
) -> Result<Option<String>, BoundaryError> {
    if addr == 0 {
        return Ok(None);
    }
    read_string(caller, addr).map(Some)
}

/// Entity argument; null is allowed.
fn entity_arg<H: GameHost>(
    caller: &GameCaller<'_, H>,
    addr: u32,
) -> Result<Option<EntityIndex>, BoundaryError> {
    caller.data().layout()?.validate(SandboxAddr::new(addr))
}

fn vec3(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, y, z)
}
