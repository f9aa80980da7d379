//! WASI preview 1 for modules built against a libc with file access
//!
//! The module directory is visible as `.` and the save root as `.saves`;
//! nothing else of the host filesystem is reachable.

use wasmtime::Linker;
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

use super::state::SandboxContext;
use crate::config::BridgeConfig;
use crate::host::GameHost;
use crate::save_path::SAVE_MOUNT;

pub fn build_context(config: &BridgeConfig) -> WasiP1Ctx {
    let mut builder = WasiCtxBuilder::new();
    builder.inherit_stderr();
    for (host_dir, guest_dir) in [
        (config.module_dir.as_path(), "."),
        (config.save_root(), SAVE_MOUNT),
    ] {
        if let Err(e) = builder.preopened_dir(host_dir, guest_dir, DirPerms::all(), FilePerms::all()) {
            tracing::warn!(
                dir = %host_dir.display(),
                guest = guest_dir,
                "Could not preopen directory for the game module: {e:#}"
            );
        }
    }
    builder.build_p1()
}

pub fn add_to_linker<H: GameHost>(linker: &mut Linker<SandboxContext<H>>) -> anyhow::Result<()> {
    p1::add_to_linker_sync(linker, |ctx: &mut SandboxContext<H>| &mut ctx.wasi)
}
