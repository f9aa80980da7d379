//! Legacy configstring translation
//!
//! Game modules built against the extended configstring numbering talk to
//! hosts that still use the original one. When enabled, this stage remaps
//! each index category linearly and records which stats the status bar
//! program draws as strings.

use q2wasm_shared::{CS_MODELS, CS_STATUSBAR, MAX_STATS};

/// Sizes of each configstring category after the fixed header slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigstringLayout {
    pub models: i32,
    pub sounds: i32,
    pub images: i32,
    pub lights: i32,
    pub items: i32,
    pub player_skins: i32,
    pub general: i32,
}

impl ConfigstringLayout {
    /// Numbering of the original host engine.
    pub const NATIVE: Self = Self {
        models: 256,
        sounds: 256,
        images: 256,
        lights: 256,
        items: 256,
        player_skins: 256,
        general: 512,
    };

    /// Numbering used by extended game modules.
    pub const EXTENDED: Self = Self {
        models: 8192,
        sounds: 2048,
        images: 512,
        lights: 256,
        items: 256,
        player_skins: 256,
        general: 512,
    };

    fn categories(&self) -> [i32; 7] {
        [
            self.models,
            self.sounds,
            self.images,
            self.lights,
            self.items,
            self.player_skins,
            self.general,
        ]
    }

    /// One past the last valid index.
    pub fn max_configstrings(&self) -> i32 {
        CS_MODELS + self.categories().iter().sum::<i32>()
    }
}

/// Map `index` from one numbering to another.
///
/// Header slots are shared. Returns `None` when the index falls outside
/// `from`, or past the end of its category in `to`.
pub fn remap_configstring(
    index: i32,
    from: &ConfigstringLayout,
    to: &ConfigstringLayout,
) -> Option<i32> {
    if index < 0 {
        return None;
    }
    if index < CS_MODELS {
        return Some(index);
    }
    let mut from_start = CS_MODELS;
    let mut to_start = CS_MODELS;
    for (from_len, to_len) in from.categories().into_iter().zip(to.categories()) {
        if index < from_start + from_len {
            let offset = index - from_start;
            return (offset < to_len).then_some(to_start + offset);
        }
        from_start += from_len;
        to_start += to_len;
    }
    None
}

/// Stat slots the status bar draws with `stat_string`.
pub fn parse_string_stats(program: &str) -> [bool; MAX_STATS] {
    let mut stats = [false; MAX_STATS];
    let mut tokens = Tokens::new(program);
    while let Some(token) = tokens.next() {
        if token == "stat_string"
            && let Some(slot) = tokens.next()
            && let Ok(slot) = slot.parse::<usize>()
            && slot < MAX_STATS
        {
            stats[slot] = true;
        }
    }
    stats
}

/// Whitespace-separated tokens with `//` and `/* */` comments skipped and
/// double-quoted strings kept whole.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_blank(&mut self) {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(after) = self.rest.strip_prefix("//") {
                self.rest = after.find('\n').map_or("", |i| &after[i + 1..]);
            } else if let Some(after) = self.rest.strip_prefix("/*") {
                self.rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            } else {
                return;
            }
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.skip_blank();
        if self.rest.is_empty() {
            return None;
        }
        if let Some(quoted) = self.rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            self.rest = quoted.get(end + 1..).unwrap_or("");
            return Some(&quoted[..end]);
        }
        let end = self
            .rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }
}

/// Optional translation stage in front of the host's configstring service.
#[derive(Debug, Clone)]
pub struct ConfigstringCompat {
    enabled: bool,
    string_stats: [bool; MAX_STATS],
}

impl ConfigstringCompat {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            string_stats: [false; MAX_STATS],
        }
    }

    /// Host index for a configstring the module set, or `None` to drop it.
    pub fn translate(&mut self, index: i32, value: &str) -> Option<i32> {
        if !self.enabled {
            return Some(index);
        }
        let Some(host_index) =
            remap_configstring(index, &ConfigstringLayout::EXTENDED, &ConfigstringLayout::NATIVE)
        else {
            tracing::warn!(index, "Configstring index has no host equivalent, dropping");
            return None;
        };
        if host_index == CS_STATUSBAR {
            self.string_stats = parse_string_stats(value);
        }
        Some(host_index)
    }

    /// Stat slots last seen drawn as strings.
    pub fn string_stats(&self) -> &[bool; MAX_STATS] {
        &self.string_stats
    }
}
