//! Sandbox mirrors of host cvars

use hashbrown::HashMap;
use q2wasm_shared::SandboxCvar;

use crate::error::BoundaryError;
use crate::host::HostCvar;
use crate::memory::{SandboxAddr, SandboxHeap};

/// A sandbox string buffer and the bytes it can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StringSlot {
    addr: SandboxAddr,
    capacity: u32,
}

#[derive(Debug, Clone, Copy)]
struct MappedCvar {
    record: SandboxAddr,
    string: StringSlot,
    latched: StringSlot,
}

/// One persistent sandbox record per cvar name the module has asked for.
///
/// The host cvar is the source of truth. Names are matched
/// case-insensitively, as the host does.
#[derive(Debug, Default)]
pub struct CvarCache {
    mapped: HashMap<String, MappedCvar>,
}

impl CvarCache {
    /// Return the mirror for `cvar`, creating it on first reference and
    /// refreshing it on every later one.
    pub fn get_or_create(
        &mut self,
        heap: &mut impl SandboxHeap,
        cvar: &HostCvar,
        modified: bool,
    ) -> Result<SandboxAddr, BoundaryError> {
        let key = cvar.name.to_ascii_lowercase();
        let mut mapped = match self.mapped.get(&key) {
            Some(mapped) => *mapped,
            None => {
                let record = heap.calloc(size_of::<SandboxCvar>() as u32)?;
                let name = heap.dup_str(&cvar.name)?;
                let header = SandboxCvar {
                    name: name.get(),
                    ..SandboxCvar::default()
                };
                heap.view_mut().write(record, &header)?;
                MappedCvar {
                    record,
                    string: StringSlot::default(),
                    latched: StringSlot::default(),
                }
            }
        };
        refresh(heap, &mut mapped, cvar, modified)?;
        self.mapped.insert(key, mapped);
        Ok(mapped.record)
    }

    /// Names of every mirrored cvar.
    pub fn names(&self) -> Vec<String> {
        self.mapped.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }
}

fn refresh(
    heap: &mut impl SandboxHeap,
    mapped: &mut MappedCvar,
    cvar: &HostCvar,
    modified: bool,
) -> Result<(), BoundaryError> {
    update_string(heap, Some(&cvar.string), &mut mapped.string)?;
    update_string(heap, cvar.latched_string.as_deref(), &mut mapped.latched)?;

    let mut record: SandboxCvar = heap.view().read(mapped.record)?;
    record.string = mapped.string.addr.get();
    record.latched_string = mapped.latched.addr.get();
    record.flags = cvar.flags;
    record.value = cvar.value;
    record.int_value = cvar.value as i32;
    record.modified = i32::from(modified);
    heap.view_mut().write(mapped.record, &record)
}

/// Bring a string buffer in line with `value`, reallocating only when it
/// has to grow.
fn update_string(
    heap: &mut impl SandboxHeap,
    value: Option<&str>,
    slot: &mut StringSlot,
) -> Result<(), BoundaryError> {
    let Some(value) = value else {
        if !slot.addr.is_null() {
            heap.free(slot.addr)?;
            *slot = StringSlot::default();
        }
        return Ok(());
    };

    if !slot.addr.is_null() && heap.view().cstr_bytes(slot.addr)? == value.as_bytes() {
        return Ok(());
    }

    let needed = u32::try_from(value.len() + 1).map_err(|_| BoundaryError::OutOfMemory(u32::MAX))?;
    if needed > slot.capacity {
        if !slot.addr.is_null() {
            heap.free(slot.addr)?;
        }
        *slot = StringSlot {
            addr: heap.malloc(needed)?,
            capacity: needed,
        };
    }
    heap.view_mut().write_cstr(slot.addr, slot.capacity, value)
}
