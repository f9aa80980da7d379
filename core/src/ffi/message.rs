//! Network message construction
//!
//! Values are appended to the host's pending message until `unicast` or
//! `multicast` sends it.

use super::{GameCaller, entity_arg, read_string, vec3};
use crate::host::{GameHost, MessageValue, Multicast};

fn write<H: GameHost>(caller: &mut GameCaller<'_, H>, value: MessageValue) -> wasmtime::Result<()> {
    caller.data_mut().host.write_message(value);
    Ok(())
}

// Integer arguments are truncated to the wire width, as a C caller would.

pub(super) fn write_char<H: GameHost>(mut caller: GameCaller<'_, H>, c: i32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Char(c as i8))
}

pub(super) fn write_byte<H: GameHost>(mut caller: GameCaller<'_, H>, c: i32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Byte(c as u8))
}

pub(super) fn write_short<H: GameHost>(mut caller: GameCaller<'_, H>, c: i32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Short(c as i16))
}

pub(super) fn write_long<H: GameHost>(mut caller: GameCaller<'_, H>, c: i32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Long(c))
}

pub(super) fn write_float<H: GameHost>(mut caller: GameCaller<'_, H>, f: f32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Float(f))
}

pub(super) fn write_string<H: GameHost>(mut caller: GameCaller<'_, H>, s: u32) -> wasmtime::Result<()> {
    let value = read_string(&mut caller, s)?;
    write(&mut caller, MessageValue::String(value))
}

pub(super) fn write_position<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    x: f32,
    y: f32,
    z: f32,
) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Position(vec3(x, y, z)))
}

pub(super) fn write_dir<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    x: f32,
    y: f32,
    z: f32,
) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Dir(vec3(x, y, z)))
}

pub(super) fn write_angle<H: GameHost>(mut caller: GameCaller<'_, H>, f: f32) -> wasmtime::Result<()> {
    write(&mut caller, MessageValue::Angle(f))
}

pub(super) fn unicast<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    ent: u32,
    reliable: i32,
) -> wasmtime::Result<()> {
    let Some(ent) = entity_arg(&caller, ent)? else {
        tracing::warn!("unicast without a target entity");
        return Ok(());
    };
    let ctx = caller.data_mut();
    ctx.host.unicast(&ctx.edicts, ent, reliable != 0);
    Ok(())
}

pub(super) fn multicast<H: GameHost>(
    mut caller: GameCaller<'_, H>,
    x: f32,
    y: f32,
    z: f32,
    to: i32,
) -> wasmtime::Result<()> {
    let Some(to) = Multicast::from_raw(to) else {
        tracing::warn!(to, "Dropping multicast with unknown destination");
        return Ok(());
    };
    caller.data_mut().host.multicast(vec3(x, y, z), to);
    Ok(())
}
