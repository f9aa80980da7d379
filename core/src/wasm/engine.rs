//! WASM engine wrapper for locating and compiling game modules

use std::path::{Path, PathBuf};

use wasmtime::{Config, Engine, ExternType, Module};

use crate::config::BridgeConfig;
use crate::error::BoundaryError;

/// Precompiled module for this engine build, preferred when present.
pub const PRECOMPILED_MODULE: &str = "game.cwasm";

/// Portable module compiled at load time.
pub const PORTABLE_MODULE: &str = "game.wasm";

/// Wasmtime engine configured for one game module.
pub struct SandboxEngine {
    engine: Engine,
}

impl SandboxEngine {
    pub fn new(config: &BridgeConfig) -> Result<Self, BoundaryError> {
        let mut wasm_config = Config::new();
        wasm_config.max_wasm_stack(config.stack_size);
        let engine = Engine::new(&wasm_config)
            .map_err(|e| BoundaryError::Instantiate(format!("engine configuration: {e:#}")))?;
        Ok(Self { engine })
    }

    /// Get a reference to the underlying wasmtime engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a portable module (binary or text format).
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module, BoundaryError> {
        Module::new(&self.engine, bytes).map_err(|e| BoundaryError::Load(format!("{e:#}")))
    }

    /// Load a module produced by [`Self::precompile`].
    pub fn load_precompiled(&self, bytes: &[u8]) -> Result<Module, BoundaryError> {
        // SAFETY: precompiled modules are only read from the game directory,
        // which is trusted as much as the host binary itself. Wasmtime still
        // rejects artifacts from a different engine version or configuration.
        unsafe { Module::deserialize(&self.engine, bytes) }
            .map_err(|e| BoundaryError::Load(format!("{e:#}")))
    }

    /// Compile a portable module ahead of time for this engine.
    pub fn precompile(&self, wasm: &[u8]) -> Result<Vec<u8>, BoundaryError> {
        self.engine
            .precompile_module(wasm)
            .map_err(|e| BoundaryError::Load(format!("{e:#}")))
    }

    /// Find the module in `dir`, precompiled form first.
    pub fn locate_module(dir: &Path) -> Result<PathBuf, BoundaryError> {
        [PRECOMPILED_MODULE, PORTABLE_MODULE]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                BoundaryError::ModuleNotFound(format!(
                    "neither {PRECOMPILED_MODULE} nor {PORTABLE_MODULE} in {}",
                    dir.display()
                ))
            })
    }

    /// Locate, read and compile the game module from `dir`.
    pub fn load_from_dir(&self, dir: &Path) -> Result<Module, BoundaryError> {
        let path = Self::locate_module(dir)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| BoundaryError::Load(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Loading game module");
        if path.extension().is_some_and(|ext| ext == "cwasm") {
            self.load_precompiled(&bytes)
        } else {
            self.load_module(&bytes)
        }
    }

    /// Check that the module's declared memory fits the heap limit.
    pub fn validate_module_memory(module: &Module, heap_size: usize) -> Result<(), BoundaryError> {
        for export in module.exports() {
            if let ExternType::Memory(mem_type) = export.ty() {
                let min_bytes = mem_type.minimum() as usize * 65536; // WASM pages are 64KB
                if min_bytes > heap_size {
                    return Err(BoundaryError::Instantiate(format!(
                        "memory '{}' requires {min_bytes} bytes but the heap limit is {heap_size}",
                        export.name()
                    )));
                }
                if mem_type.maximum().is_none() {
                    tracing::debug!(
                        "Module memory '{}' has no maximum declared; host will limit to {} bytes",
                        export.name(),
                        heap_size
                    );
                }
            }
        }
        Ok(())
    }
}
