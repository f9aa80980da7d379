//! Boundary error type
//!
//! Every variant is fatal for the current game module: the bridge never
//! retries or rolls back a call that produced one of these.

/// A violation of the host/sandbox contract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundaryError {
    /// Address range lies outside the sandbox's linear memory.
    #[error("sandbox range {addr:#x}+{size} is outside linear memory ({memory_len} bytes)")]
    OutOfBounds {
        addr: u32,
        size: u32,
        memory_len: usize,
    },

    /// Null address where a value was required.
    #[error("null sandbox address where a value was required")]
    NullAddress,

    /// Address is not the start of an entity record.
    #[error(
        "sandbox address {addr:#x} is not a valid entity \
         (base {base:#x}, stride {stride}, end {end:#x})"
    )]
    InvalidEntity {
        addr: u32,
        base: u32,
        stride: u32,
        end: u32,
    },

    /// No terminator before the end of linear memory.
    #[error("unterminated string at sandbox address {0:#x}")]
    UnterminatedString(u32),

    /// The module reported an entity region the host cannot use.
    #[error("invalid entity layout: {0}")]
    InvalidLayout(String),

    /// Required export missing or with the wrong signature.
    #[error("game module does not export `{0}` with the expected signature")]
    MissingExport(&'static str),

    /// The sandbox trapped while running an export.
    #[error("game module call `{export}` failed: {message}")]
    Trap {
        export: &'static str,
        message: String,
    },

    /// The game called its own fatal error import.
    #[error("game error: {0}")]
    GameError(String),

    /// The module's allocator returned null.
    #[error("sandbox out of memory allocating {0} bytes")]
    OutOfMemory(u32),

    /// Free of an address the tag registry does not own.
    #[error("free of untracked sandbox allocation {0:#x}")]
    UntrackedFree(u32),

    /// Surface address not issued since the last map change.
    #[error("surface {0:#x} does not belong to the current map")]
    StaleSurface(u32),

    #[error("game module not found: {0}")]
    ModuleNotFound(String),

    #[error("failed to load game module: {0}")]
    Load(String),

    #[error("failed to instantiate game module: {0}")]
    Instantiate(String),

    /// `GetGameAPI` returned 0 for the host's API version.
    #[error("game module rejected game API version {0}")]
    ApiVersionRejected(i32),

    /// Operation attempted before the module reached the required state.
    #[error("game module is not ready: {0}")]
    NotReady(&'static str),

    #[error("invalid argument to `{function}`: {reason}")]
    InvalidArgument {
        function: &'static str,
        reason: String,
    },
}

impl BoundaryError {
    /// Recover the original boundary error from a failed export call.
    ///
    /// Host services fail by returning a `BoundaryError`, which wasmtime turns
    /// into a trap; anything else is a genuine trap raised by the module.
    pub fn from_call(export: &'static str, err: anyhow::Error) -> Self {
        match err.downcast::<BoundaryError>() {
            Ok(boundary) => boundary,
            Err(err) => Self::Trap {
                export,
                message: format!("{err:#}"),
            },
        }
    }
}
