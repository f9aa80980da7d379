//! Shared types for q2wasm hosts and game modules.
//!
//! Everything here describes bytes as they sit in the sandbox's linear
//! memory: `#[repr(C)]` layouts matching a wasm32 game build, and the
//! protocol constants both sides agree on.

pub mod abi;
pub mod constants;

pub use abi::*;
pub use constants::*;
