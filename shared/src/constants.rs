//! Protocol constants shared by host bridges and game modules.
//!
//! Values follow the game's own headers; a game module compiled against
//! different values will not interoperate with this bridge.

/// Version passed to the module's optional `GetGameAPI` export.
pub const GAME_API_VERSION: i32 = 3;

// === Limits ===

/// Hard upper bound for the `maxentities` cvar.
pub const MAX_EDICTS: usize = 8192;

/// Default value of the `maxentities` cvar.
pub const DEFAULT_MAX_EDICTS: usize = 1024;

/// Hard upper bound for the `maxclients` cvar.
pub const MAX_CLIENTS: usize = 256;

/// Default value of the `maxclients` cvar.
pub const DEFAULT_MAX_CLIENTS: usize = 8;

/// Number of stat slots in a player state.
pub const MAX_STATS: usize = 32;

/// Number of PVS clusters tracked per entity.
pub const MAX_ENT_CLUSTERS: usize = 16;

/// Maximum entities touched by one movement step.
pub const MAX_TOUCH: usize = 32;

/// Maximum userinfo length including the terminator.
pub const MAX_INFO_STRING: usize = 512;

/// Surface name length including the terminator.
pub const MAX_SURFACE_NAME: usize = 32;

// === Command argument scratch ===

/// Number of `argv` slots in the scratch block.
pub const MAX_CMD_ARGS: usize = 16;

/// Size of one `argv` slot including the terminator.
pub const CMD_ARG_LEN: usize = 256;

/// Size of the `args` slot including the terminator.
pub const MAX_CMD_LINE: usize = 1024;

/// Size of the filename slot including the terminator.
pub const MAX_OSPATH: usize = 256;

// === Allocation tags ===

/// Allocations that live for the whole game.
pub const TAG_GAME: i32 = 765;

/// Allocations released on every map load.
pub const TAG_LEVEL: i32 = 766;

// === Cvar flags ===

pub const CVAR_ARCHIVE: i32 = 1;
pub const CVAR_USERINFO: i32 = 2;
pub const CVAR_SERVERINFO: i32 = 4;
pub const CVAR_NOSET: i32 = 8;
pub const CVAR_LATCH: i32 = 16;

/// `g_features` bit announcing that the game writes its own save files.
pub const GMF_ENHANCED_SAVEGAMES: i32 = 0x400;

// === Print levels ===

pub const PRINT_LOW: i32 = 0;
pub const PRINT_MEDIUM: i32 = 1;
pub const PRINT_HIGH: i32 = 2;
pub const PRINT_CHAT: i32 = 3;

// === Multicast destinations ===

pub const MULTICAST_ALL: i32 = 0;
pub const MULTICAST_PHS: i32 = 1;
pub const MULTICAST_PVS: i32 = 2;
pub const MULTICAST_ALL_R: i32 = 3;
pub const MULTICAST_PHS_R: i32 = 4;
pub const MULTICAST_PVS_R: i32 = 5;

// === BoxEdicts area selectors ===

pub const AREA_SOLID: i32 = 1;
pub const AREA_TRIGGERS: i32 = 2;

// === Configstrings ===

/// Index of the status bar layout program.
pub const CS_STATUSBAR: i32 = 5;

/// First configstring index after the fixed header slots.
pub const CS_MODELS: i32 = 32;
