//! Placement of the game module's entity array

use q2wasm_shared::SandboxEdict;

use super::{EntityIndex, SandboxAddr};
use crate::error::BoundaryError;

/// Where the module keeps its entities, as reported after `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLayout {
    base: u32,
    stride: u32,
    max_edicts: u32,
    num_edicts_addr: SandboxAddr,
}

impl EntityLayout {
    /// Validate the reported layout against the current memory size.
    ///
    /// The whole `[base, base + stride * max_edicts)` region and the entity
    /// count word must lie inside memory, and each stride must hold at least
    /// the shared entity prefix.
    pub fn new(
        base: SandboxAddr,
        stride: u32,
        max_edicts: u32,
        num_edicts_addr: SandboxAddr,
        memory_len: usize,
    ) -> Result<Self, BoundaryError> {
        if base.is_null() {
            return Err(BoundaryError::InvalidLayout("entity base is null".into()));
        }
        if (stride as usize) < size_of::<SandboxEdict>() {
            return Err(BoundaryError::InvalidLayout(format!(
                "entity stride {stride} is smaller than the {} byte entity header",
                size_of::<SandboxEdict>()
            )));
        }
        if max_edicts == 0 {
            return Err(BoundaryError::InvalidLayout("module reports zero entities".into()));
        }
        let end = stride
            .checked_mul(max_edicts)
            .and_then(|len| base.get().checked_add(len))
            .filter(|&end| end as usize <= memory_len)
            .ok_or_else(|| {
                BoundaryError::InvalidLayout(format!(
                    "{max_edicts} entities of {stride} bytes at {base} exceed {memory_len} bytes of memory"
                ))
            })?;
        if num_edicts_addr.is_null()
            || num_edicts_addr.get() as usize + size_of::<i32>() > memory_len
        {
            return Err(BoundaryError::InvalidLayout(format!(
                "entity count address {num_edicts_addr} is outside memory"
            )));
        }
        debug_assert!(end > base.get());
        Ok(Self {
            base: base.get(),
            stride,
            max_edicts,
            num_edicts_addr,
        })
    }

    pub fn base(&self) -> SandboxAddr {
        SandboxAddr::new(self.base)
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn max_edicts(&self) -> usize {
        self.max_edicts as usize
    }

    /// First byte past the entity array.
    pub fn end(&self) -> SandboxAddr {
        SandboxAddr::new(self.base + self.stride * self.max_edicts)
    }

    /// Address of the module's live entity count.
    pub fn num_edicts_addr(&self) -> SandboxAddr {
        self.num_edicts_addr
    }

    pub fn index_to_addr(&self, index: EntityIndex) -> SandboxAddr {
        SandboxAddr::new(self.base + index.get() as u32 * self.stride)
    }

    /// Inverse of [`Self::index_to_addr`] for addresses already validated.
    pub fn addr_to_index(&self, addr: SandboxAddr) -> EntityIndex {
        EntityIndex::new((addr.get() - self.base) / self.stride)
    }

    /// Resolve an entity reference coming from the sandbox.
    ///
    /// Null is a valid "no entity"; any other address must be the start of
    /// an entity record inside the array.
    pub fn validate(&self, addr: SandboxAddr) -> Result<Option<EntityIndex>, BoundaryError> {
        if addr.is_null() {
            return Ok(None);
        }
        let raw = addr.get();
        if raw < self.base || raw >= self.end().get() || (raw - self.base) % self.stride != 0 {
            return Err(BoundaryError::InvalidEntity {
                addr: raw,
                base: self.base,
                stride: self.stride,
                end: self.end().get(),
            });
        }
        Ok(Some(self.addr_to_index(addr)))
    }

    /// Like [`Self::validate`], rejecting null.
    pub fn require(&self, addr: SandboxAddr) -> Result<EntityIndex, BoundaryError> {
        self.validate(addr)?.ok_or(BoundaryError::NullAddress)
    }

    /// Check a host-side index before handing its address to the module.
    pub fn checked_addr(&self, index: EntityIndex) -> Result<SandboxAddr, BoundaryError> {
        if index.get() >= self.max_edicts() {
            return Err(BoundaryError::InvalidArgument {
                function: "entity",
                reason: format!("index {} exceeds {} entities", index.get(), self.max_edicts),
            });
        }
        Ok(self.index_to_addr(index))
    }
}
