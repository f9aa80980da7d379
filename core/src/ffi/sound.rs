//! Entity and positioned sounds
//!
//! The emitting entity is brought up to date first so the host spatialises
//! the sound from where the game last moved it.

use wasmtime::AsContextMut;

use super::{GameCaller, vec3};
use crate::host::{GameHost, Sound};
use crate::memory::SandboxAddr;
use crate::wasm::state::sync_entity_ref;

fn params(channel: i32, sound_index: i32, volume: f32, attenuation: f32, time_offset: f32) -> Sound {
    Sound {
        channel,
        sound_index,
        volume,
        attenuation,
        time_offset,
    }
}

pub(super) fn sound<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
    channel: i32,
    sound_index: i32,
    volume: f32,
    attenuation: f32,
    time_offset: f32,
) -> wasmtime::Result<()> {
    // The host reads the emitter's origin
    let ent = sync_entity_ref(caller.as_context_mut(), SandboxAddr::new(ent))?;
    let ctx = caller.data_mut();
    let sound = params(channel, sound_index, volume, attenuation, time_offset);
    ctx.host.sound(&ctx.edicts, ent, &sound);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn positioned_sound<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    x: f32,
    y: f32,
    z: f32,
    ent: u32,
    channel: i32,
    sound_index: i32,
    volume: f32,
    attenuation: f32,
    time_offset: f32,
) -> wasmtime::Result<()> {
    let ent = sync_entity_ref(caller.as_context_mut(), SandboxAddr::new(ent))?;
    let ctx = caller.data_mut();
    let sound = params(channel, sound_index, volume, attenuation, time_offset);
    ctx.host.positioned_sound(&ctx.edicts, vec3(x, y, z), ent, &sound);
    Ok(())
}
