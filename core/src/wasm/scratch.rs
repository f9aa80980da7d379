//! Fixed argument-passing block in sandbox memory

use std::mem::offset_of;

use q2wasm_shared::{CMD_ARG_LEN, MAX_CMD_ARGS, MAX_CMD_LINE, ScratchLayout};

use crate::error::BoundaryError;
use crate::memory::{MemoryViewMut, SandboxAddr, SandboxHeap};

/// Address of the scratch block. Slot addresses are derived from
/// [`ScratchLayout`] so host and module agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchBuffers {
    base: SandboxAddr,
}

impl ScratchBuffers {
    pub fn allocate(heap: &mut impl SandboxHeap) -> Result<Self, BoundaryError> {
        let base = heap.calloc(size_of::<ScratchLayout>() as u32)?;
        tracing::debug!(%base, size = size_of::<ScratchLayout>(), "Allocated scratch buffers");
        Ok(Self { base })
    }

    pub fn at(base: SandboxAddr) -> Self {
        Self { base }
    }

    pub fn base(&self) -> SandboxAddr {
        self.base
    }

    /// Argument slot `n`, or `None` past the last slot.
    pub fn cmd(&self, n: usize) -> Option<SandboxAddr> {
        (n < MAX_CMD_ARGS).then(|| self.field(offset_of!(ScratchLayout, cmds) + n * CMD_ARG_LEN))
    }

    pub fn scmd(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, scmd))
    }

    pub fn userinfo(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, userinfo))
    }

    pub fn filename(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, filename))
    }

    pub fn ucmd(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, ucmd))
    }

    pub fn trace(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, trace))
    }

    pub fn null_surface(&self) -> SandboxAddr {
        self.field(offset_of!(ScratchLayout, null_surface))
    }

    fn field(&self, offset: usize) -> SandboxAddr {
        self.base.offset(offset as u32)
    }

    /// Fill the argument slots for one command dispatch.
    ///
    /// At most `MAX_CMD_ARGS - 1` arguments are copied so the slot after the
    /// last one is always emptied.
    pub fn write_args(
        &self,
        memory: &mut MemoryViewMut<'_>,
        argv: &[String],
        args: &str,
    ) -> Result<usize, BoundaryError> {
        let count = argv.len().min(MAX_CMD_ARGS - 1);
        for (n, arg) in argv[..count].iter().enumerate() {
            if let Some(slot) = self.cmd(n) {
                memory.write_cstr(slot, CMD_ARG_LEN as u32, arg)?;
            }
        }
        if let Some(slot) = self.cmd(count) {
            memory.write_cstr(slot, CMD_ARG_LEN as u32, "")?;
        }
        memory.write_cstr(self.scmd(), MAX_CMD_LINE as u32, args)?;
        Ok(count)
    }
}
