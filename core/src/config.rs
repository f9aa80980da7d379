//! Bridge configuration (q2wasm.toml)
//!
//! Sandbox sizing, where to find the game module, and the legacy
//! compatibility switch. Stack and heap sizes can also be overridden at
//! runtime through latched host cvars.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use q2wasm_shared::CVAR_LATCH;
use serde::{Deserialize, Serialize};

use crate::host::GameHost;

/// Cvar overriding [`BridgeConfig::stack_size`].
pub const STACK_SIZE_CVAR: &str = "sys_wasmstacksize";

/// Cvar overriding [`BridgeConfig::heap_size`].
pub const HEAP_SIZE_CVAR: &str = "sys_wasmheapsize";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum native stack used while running sandbox code (default: 8 MiB)
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
    /// Maximum sandbox linear memory (default: 96 MiB)
    #[serde(default = "default_heap_size")]
    pub heap_size: usize,
    /// Directory searched for `game.cwasm` and `game.wasm` (default: ".")
    #[serde(default = "default_module_dir")]
    pub module_dir: PathBuf,
    /// Root that save paths are made relative to (default: `module_dir`)
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
    /// Legacy client layout and configstring numbering (default: false)
    #[serde(default)]
    pub legacy_compat: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            stack_size: default_stack_size(),
            heap_size: default_heap_size(),
            module_dir: default_module_dir(),
            save_dir: None,
            legacy_compat: false,
        }
    }
}

fn default_stack_size() -> usize {
    8 * 1024 * 1024
}

fn default_heap_size() -> usize {
    96 * 1024 * 1024
}

fn default_module_dir() -> PathBuf {
    PathBuf::from(".")
}

impl BridgeConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save_root(&self) -> &Path {
        self.save_dir.as_deref().unwrap_or(&self.module_dir)
    }

    /// Apply the host's sizing cvars, registering them with the configured
    /// values as defaults.
    pub fn apply_host_overrides(&mut self, host: &mut impl GameHost) {
        self.stack_size = sized_cvar(host, STACK_SIZE_CVAR, self.stack_size);
        self.heap_size = sized_cvar(host, HEAP_SIZE_CVAR, self.heap_size);
    }
}

fn sized_cvar(host: &mut impl GameHost, name: &str, current: usize) -> usize {
    let cvar = host.cvar(name, &current.to_string(), CVAR_LATCH);
    match cvar.string.trim().parse::<usize>() {
        Ok(size) if size > 0 => size,
        _ => {
            tracing::warn!(cvar = name, value = %cvar.string, "Ignoring invalid size");
            current
        }
    }
}
