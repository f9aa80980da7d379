//! Tagged allocations made on the module's behalf

use hashbrown::HashMap;

use crate::error::BoundaryError;
use crate::memory::{SandboxAddr, SandboxHeap};

/// Sandbox blocks handed out by `TagMalloc`, grouped by lifetime tag.
#[derive(Debug, Default)]
pub struct TagRegistry {
    blocks: HashMap<SandboxAddr, i32>,
}

impl TagRegistry {
    /// Allocate a zero-filled block under `tag`.
    pub fn alloc(
        &mut self,
        heap: &mut impl SandboxHeap,
        size: u32,
        tag: i32,
    ) -> Result<SandboxAddr, BoundaryError> {
        let addr = heap.calloc(size)?;
        self.blocks.insert(addr, tag);
        Ok(addr)
    }

    /// Release one block. Null is ignored; anything untracked is fatal.
    pub fn free_one(
        &mut self,
        heap: &mut impl SandboxHeap,
        addr: SandboxAddr,
    ) -> Result<(), BoundaryError> {
        if addr.is_null() {
            return Ok(());
        }
        if self.blocks.remove(&addr).is_none() {
            return Err(BoundaryError::UntrackedFree(addr.get()));
        }
        heap.free(addr)
    }

    /// Release every block under `tag`, returning how many there were.
    pub fn free_tag(
        &mut self,
        heap: &mut impl SandboxHeap,
        tag: i32,
    ) -> Result<usize, BoundaryError> {
        let mut doomed: Vec<SandboxAddr> = self
            .blocks
            .iter()
            .filter(|&(_, &t)| t == tag)
            .map(|(&addr, _)| addr)
            .collect();
        doomed.sort_unstable();
        for addr in &doomed {
            self.blocks.remove(addr);
            heap.free(*addr)?;
        }
        if !doomed.is_empty() {
            tracing::debug!(tag, freed = doomed.len(), "Freed tagged allocations");
        }
        Ok(doomed.len())
    }

    pub fn count(&self, tag: i32) -> usize {
        self.blocks.values().filter(|&&t| t == tag).count()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
