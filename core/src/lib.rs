//! q2wasm Core - Quake II game logic in a WebAssembly sandbox
//!
//! This crate hosts a game module compiled to WebAssembly and presents it to
//! a Quake II server as an ordinary game library. The server talks to
//! host-native types only; every sandbox address is validated and translated
//! at the boundary.
//!
//! # Architecture
//!
//! - [`GameHost`] - Trait implemented by the host engine (collision, console,
//!   network, cvars)
//! - [`GameModule`] - Lifecycle manager and the game events the server calls
//! - [`mirror`] - Host-side copy of the module's entity array
//! - [`cache`] - Cvar, surface and tagged-allocation caches
//! - [`ffi`] - Host services imported by the module

pub mod cache;
pub mod compat;
pub mod config;
pub mod convert;
pub mod error;
pub mod ffi;
pub mod host;
#[cfg(test)]
mod integration;
pub mod memory;
pub mod mirror;
pub mod save_path;
#[cfg(test)]
pub mod test_utils;
pub mod wasm;

// Re-export the host-facing surface
pub use config::BridgeConfig;
pub use error::BoundaryError;
pub use host::{
    BoxArea, Edict, GameHost, HostCvar, HostSurface, MessageValue, Multicast, Pmove, PmoveState,
    PmoveWorld, PrintLevel, Sound, SurfaceId, Trace,
};
pub use memory::{EntityIndex, EntityLayout, SandboxAddr};
pub use save_path::normalize_save_path;
pub use wasm::{GameModule, LifecycleState, PORTABLE_MODULE, PRECOMPILED_MODULE, SandboxEngine};

// Re-export the shared ABI for hosts that build on it
pub use q2wasm_shared as abi;
