//! WASM runtime wrapper
//!
//! Loads the game module into wasmtime and drives it through its
//! lifecycle.
//!
//! # Module Organization
//!
//! - [`engine`] - Engine configuration and module loading
//! - [`state`] - Store data shared by the lifecycle manager and host imports
//! - [`exports`] - Typed handles to the module's exports
//! - [`scratch`] - Fixed argument-passing block in sandbox memory
//! - [`instance`] - The lifecycle manager
//!
//! # Key Types
//!
//! - [`SandboxEngine`] - Wasmtime engine with the configured stack limit
//! - [`GameModule`] - Loaded game module and its host-facing events
//! - [`SandboxContext`] - The single owned context behind every call
//! - [`StoreHeap`] - Sandbox allocation through the module's allocator

pub mod engine;
pub mod exports;
pub mod instance;
pub mod scratch;
pub mod state;
#[cfg(feature = "wasi")]
pub mod wasi;

#[cfg(test)]
mod tests;

pub use engine::{PORTABLE_MODULE, PRECOMPILED_MODULE, SandboxEngine};
pub use exports::GameExports;
pub use instance::{GameModule, LifecycleState};
pub use scratch::ScratchBuffers;
pub use state::{SandboxContext, StoreHeap, with_caches};
