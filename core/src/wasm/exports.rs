//! Typed handles for every export the bridge calls

use wasmtime::{AsContextMut, Instance, TypedFunc, WasmParams, WasmResults};

use crate::error::BoundaryError;

/// `PmoveTrace(pm, start.xyz, mins.xyz, maxs.xyz, end.xyz, out)`
pub type PmoveTraceParams = (
    u32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    f32,
    u32,
);

/// Resolved once during bootstrap; a missing required export fails there
/// rather than on first use.
#[derive(Clone)]
pub struct GameExports {
    pub malloc: TypedFunc<u32, u32>,
    pub free: TypedFunc<u32, ()>,

    pub get_game_api: Option<TypedFunc<i32, i32>>,

    pub get_edicts: TypedFunc<(), u32>,
    pub get_edict_size: TypedFunc<(), u32>,
    pub get_num_edicts: TypedFunc<(), u32>,
    pub get_max_edicts: TypedFunc<(), u32>,

    pub init: TypedFunc<(), ()>,
    pub spawn_entities: TypedFunc<(u32, u32, u32), ()>,

    pub client_connect: TypedFunc<(u32, u32), i32>,
    pub client_begin: TypedFunc<u32, ()>,
    pub client_userinfo_changed: TypedFunc<(u32, u32), ()>,
    pub client_command: TypedFunc<u32, ()>,
    pub client_disconnect: TypedFunc<u32, ()>,
    pub client_think: TypedFunc<(u32, u32), ()>,

    pub run_frame: TypedFunc<(), ()>,
    pub server_command: TypedFunc<(), ()>,

    pub write_game: TypedFunc<(u32, i32), ()>,
    pub read_game: TypedFunc<u32, ()>,
    pub write_level: TypedFunc<u32, ()>,
    pub read_level: TypedFunc<u32, ()>,

    pub pmove_trace: TypedFunc<PmoveTraceParams, ()>,
    pub pmove_point_contents: TypedFunc<(u32, f32, f32, f32), i32>,
}

impl GameExports {
    pub fn resolve(instance: &Instance, mut store: impl AsContextMut) -> Result<Self, BoundaryError> {
        let mut store = store.as_context_mut();
        Ok(Self {
            malloc: required(instance, &mut store, "malloc")?,
            free: required(instance, &mut store, "free")?,
            get_game_api: optional(instance, &mut store, "GetGameAPI")?,
            get_edicts: required(instance, &mut store, "GetEdicts")?,
            get_edict_size: required(instance, &mut store, "GetEdictSize")?,
            get_num_edicts: required(instance, &mut store, "GetNumEdicts")?,
            get_max_edicts: required(instance, &mut store, "GetMaxEdicts")?,
            init: required(instance, &mut store, "Init")?,
            spawn_entities: required(instance, &mut store, "SpawnEntities")?,
            client_connect: required(instance, &mut store, "ClientConnect")?,
            client_begin: required(instance, &mut store, "ClientBegin")?,
            client_userinfo_changed: required(instance, &mut store, "ClientUserinfoChanged")?,
            client_command: required(instance, &mut store, "ClientCommand")?,
            client_disconnect: required(instance, &mut store, "ClientDisconnect")?,
            client_think: required(instance, &mut store, "ClientThink")?,
            run_frame: required(instance, &mut store, "RunFrame")?,
            server_command: required(instance, &mut store, "ServerCommand")?,
            write_game: required(instance, &mut store, "WriteGame")?,
            read_game: required(instance, &mut store, "ReadGame")?,
            write_level: required(instance, &mut store, "WriteLevel")?,
            read_level: required(instance, &mut store, "ReadLevel")?,
            pmove_trace: required(instance, &mut store, "PmoveTrace")?,
            pmove_point_contents: required(instance, &mut store, "PmovePointContents")?,
        })
    }
}

fn required<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: impl AsContextMut,
    name: &'static str,
) -> Result<TypedFunc<P, R>, BoundaryError> {
    optional(instance, store, name)?.ok_or(BoundaryError::MissingExport(name))
}

/// `None` when absent; an export with the wrong signature is still an error.
pub fn optional<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    mut store: impl AsContextMut,
    name: &'static str,
) -> Result<Option<TypedFunc<P, R>>, BoundaryError> {
    let Some(func) = instance.get_func(&mut store, name) else {
        return Ok(None);
    };
    func.typed(&store).map(Some).map_err(|e| {
        tracing::error!(export = name, "Export has the wrong signature: {e:#}");
        BoundaryError::MissingExport(name)
    })
}
