//! Address translation between the host and the sandbox
//!
//! The sandbox addresses its linear memory with 32-bit offsets. The host
//! never dereferences one directly: every access goes through a
//! [`MemoryView`] or [`MemoryViewMut`], which range-check the offset
//! against the memory's current size first.
//!
//! # Key Types
//!
//! - [`SandboxAddr`] - Offset into sandbox memory (0 is null)
//! - [`EntityIndex`] - Host-side entity handle
//! - [`EntityLayout`] - Entity array placement inside the sandbox
//! - [`SandboxHeap`] - Allocation inside the sandbox

mod layout;

use std::ops::Range;

use bytemuck::Pod;

use crate::error::BoundaryError;

pub use layout::EntityLayout;

/// Offset into the sandbox's linear memory.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SandboxAddr(u32);

impl SandboxAddr {
    pub const NULL: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` further on. Saturates; range checks reject the result.
    pub const fn offset(self, bytes: u32) -> Self {
        Self(self.0.saturating_add(bytes))
    }
}

impl std::fmt::Display for SandboxAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Index into the host entity array.
///
/// This is the host's entity handle; it is never passed to the sandbox
/// without going through [`EntityLayout::index_to_addr`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityIndex(u32);

impl EntityIndex {
    /// The world entity.
    pub const WORLD: Self = Self(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Read-only, bounds-checked view of sandbox memory.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Validate `[addr, addr + size)` and return it as a byte range.
    pub fn check(&self, addr: SandboxAddr, size: u32) -> Result<Range<usize>, BoundaryError> {
        check_range(self.bytes.len(), addr, size)
    }

    /// Translate a sandbox range into host memory.
    pub fn to_host(&self, addr: SandboxAddr, size: u32) -> Result<&'a [u8], BoundaryError> {
        let range = self.check(addr, size)?;
        Ok(&self.bytes[range])
    }

    /// Sandbox address of a slice previously obtained from this memory.
    pub fn to_sandbox(&self, host: &[u8]) -> SandboxAddr {
        let base = self.bytes.as_ptr() as usize;
        let ptr = host.as_ptr() as usize;
        debug_assert!(ptr >= base && ptr + host.len() <= base + self.bytes.len());
        SandboxAddr(ptr.wrapping_sub(base) as u32)
    }

    pub fn read<T: Pod>(&self, addr: SandboxAddr) -> Result<T, BoundaryError> {
        let bytes = self.to_host(addr, size_of::<T>() as u32)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Bytes of a NUL-terminated string, without the terminator.
    pub fn cstr_bytes(&self, addr: SandboxAddr) -> Result<&'a [u8], BoundaryError> {
        if addr.is_null() {
            return Err(BoundaryError::NullAddress);
        }
        let start = self.check(addr, 0)?.start;
        let tail = &self.bytes[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(BoundaryError::UnterminatedString(addr.get()))?;
        Ok(&tail[..len])
    }

    pub fn read_cstr(&self, addr: SandboxAddr) -> Result<String, BoundaryError> {
        let bytes = self.cstr_bytes(addr)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Mutable, bounds-checked view of sandbox memory.
#[derive(Debug)]
pub struct MemoryViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> MemoryViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn view(&self) -> MemoryView<'_> {
        MemoryView::new(self.bytes)
    }

    pub fn to_host_mut(
        &mut self,
        addr: SandboxAddr,
        size: u32,
    ) -> Result<&mut [u8], BoundaryError> {
        let range = check_range(self.bytes.len(), addr, size)?;
        Ok(&mut self.bytes[range])
    }

    pub fn write<T: Pod>(&mut self, addr: SandboxAddr, value: &T) -> Result<(), BoundaryError> {
        let bytes = bytemuck::bytes_of(value);
        self.to_host_mut(addr, bytes.len() as u32)?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, addr: SandboxAddr, size: u32, byte: u8) -> Result<(), BoundaryError> {
        self.to_host_mut(addr, size)?.fill(byte);
        Ok(())
    }

    /// Write `value` into a `capacity`-byte slot, truncating so the
    /// terminator always fits.
    pub fn write_cstr(
        &mut self,
        addr: SandboxAddr,
        capacity: u32,
        value: &str,
    ) -> Result<(), BoundaryError> {
        let slot = self.to_host_mut(addr, capacity)?;
        let Some(max) = slot.len().checked_sub(1) else {
            return Err(BoundaryError::OutOfBounds {
                addr: addr.get(),
                size: capacity,
                memory_len: 0,
            });
        };
        let text = truncate_to_char_boundary(value, max);
        slot[..text.len()].copy_from_slice(text.as_bytes());
        slot[text.len()] = 0;
        Ok(())
    }
}

/// Longest prefix of `value` no longer than `max` bytes.
pub fn truncate_to_char_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn check_range(memory_len: usize, addr: SandboxAddr, size: u32) -> Result<Range<usize>, BoundaryError> {
    let out_of_bounds = || BoundaryError::OutOfBounds {
        addr: addr.get(),
        size,
        memory_len,
    };
    if addr.is_null() && size > 0 {
        return Err(BoundaryError::NullAddress);
    }
    let start = addr.get() as usize;
    let end = start.checked_add(size as usize).ok_or_else(out_of_bounds)?;
    if end > memory_len {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

/// Allocation and access inside the sandbox.
///
/// Implemented over a live wasmtime store by [`crate::wasm::StoreHeap`],
/// which routes `malloc`/`free` to the module's allocator exports.
pub trait SandboxHeap {
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Allocate `size` bytes. Null results are reported as out of memory.
    fn malloc(&mut self, size: u32) -> Result<SandboxAddr, BoundaryError>;

    fn free(&mut self, addr: SandboxAddr) -> Result<(), BoundaryError>;

    fn view(&self) -> MemoryView<'_> {
        MemoryView::new(self.memory())
    }

    fn view_mut(&mut self) -> MemoryViewMut<'_> {
        MemoryViewMut::new(self.memory_mut())
    }

    /// Copy `value` into a fresh, NUL-terminated sandbox allocation.
    fn dup_str(&mut self, value: &str) -> Result<SandboxAddr, BoundaryError> {
        let size = u32::try_from(value.len() + 1).map_err(|_| BoundaryError::OutOfMemory(u32::MAX))?;
        let addr = self.malloc(size)?;
        self.view_mut().write_cstr(addr, size, value)?;
        Ok(addr)
    }

    /// Allocate and zero-fill.
    fn calloc(&mut self, size: u32) -> Result<SandboxAddr, BoundaryError> {
        let addr = self.malloc(size)?;
        self.view_mut().fill(addr, size, 0)?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_host_accepts_exact_end() {
        let memory = vec![0u8; 64];
        let view = MemoryView::new(&memory);
        assert_eq!(view.to_host(SandboxAddr::new(60), 4).unwrap().len(), 4);
        assert!(view.to_host(SandboxAddr::new(64), 0).is_ok());
    }

    #[test]
    fn test_to_host_rejects_range_past_end() {
        let memory = vec![0u8; 64];
        let view = MemoryView::new(&memory);
        assert!(matches!(
            view.to_host(SandboxAddr::new(63), 2),
            Err(BoundaryError::OutOfBounds { addr: 63, size: 2, memory_len: 64 })
        ));
        assert!(view.to_host(SandboxAddr::new(u32::MAX), 2).is_err());
    }

    #[test]
    fn test_to_host_rejects_null_with_size() {
        let memory = vec![0u8; 64];
        let view = MemoryView::new(&memory);
        assert_eq!(view.to_host(SandboxAddr::NULL, 1), Err(BoundaryError::NullAddress));
        assert!(view.to_host(SandboxAddr::NULL, 0).is_ok());
    }

    #[test]
    fn test_to_sandbox_inverts_to_host() {
        let memory = vec![0u8; 128];
        let view = MemoryView::new(&memory);
        let slice = view.to_host(SandboxAddr::new(40), 8).unwrap();
        assert_eq!(view.to_sandbox(slice), SandboxAddr::new(40));
    }

    #[test]
    fn test_read_cstr() {
        let mut memory = vec![0u8; 32];
        memory[8..13].copy_from_slice(b"hello");
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_cstr(SandboxAddr::new(8)).unwrap(), "hello");
        assert_eq!(view.read_cstr(SandboxAddr::NULL), Err(BoundaryError::NullAddress));
    }

    #[test]
    fn test_read_cstr_unterminated() {
        let memory = vec![b'a'; 16];
        let view = MemoryView::new(&memory);
        assert_eq!(
            view.read_cstr(SandboxAddr::new(4)),
            Err(BoundaryError::UnterminatedString(4))
        );
    }

    #[test]
    fn test_write_cstr_truncates() {
        let mut memory = vec![0xffu8; 16];
        let mut view = MemoryViewMut::new(&mut memory);
        view.write_cstr(SandboxAddr::new(4), 4, "abcdef").unwrap();
        assert_eq!(&memory[4..8], b"abc\0");
        assert_eq!(memory[8], 0xff);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate_to_char_boundary("héllo", 2), "h");
        assert_eq!(truncate_to_char_boundary("abc", 8), "abc");
    }

    #[test]
    fn test_pod_round_trip_through_memory() {
        let mut memory = vec![0u8; 64];
        let mut view = MemoryViewMut::new(&mut memory);
        view.write(SandboxAddr::new(5), &0x1234_5678u32).unwrap();
        assert_eq!(view.view().read::<u32>(SandboxAddr::new(5)).unwrap(), 0x1234_5678);
    }
}
