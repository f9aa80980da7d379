//! Save file paths as the game module sees them
//!
//! The module can only reach the save root through the `.saves` mount, so
//! host paths are rewritten relative to it before being handed over.

use std::path::Path;

/// Directory the save root is visible as inside the sandbox.
pub const SAVE_MOUNT: &str = ".saves";

/// Rewrite a host save path as `.saves/<relative path>`.
///
/// Relative paths are taken as already relative to the save root. An
/// absolute path outside the root keeps only its file name.
pub fn normalize_save_path(save_root: &Path, path: &str) -> String {
    let path = path.replace('\\', "/");
    let root = save_root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');

    let relative = match path.strip_prefix(root) {
        Some(rest) if !root.is_empty() && rest.starts_with('/') => rest.trim_start_matches('/'),
        _ if !is_absolute(&path) => path.trim_start_matches("./"),
        _ => {
            let name = path.rsplit('/').next().unwrap_or_default();
            tracing::warn!(%path, root, "Save path outside save root, keeping file name only");
            name
        }
    };
    format!("{SAVE_MOUNT}/{relative}")
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.as_bytes().get(1) == Some(&b':')
}
