//! Flat byte-addressed memory.
//!
//! One growable arena holds stack slots, globals and runtime heap blocks.
//! Addresses below [`Memory::BASE`] are never handed out, so the null
//! pointer and small offsets from it always fault. Nothing is ever freed.

use std::ops::Range;

use rustc_hash::FxHashMap;

use crate::trap::{EvalResult, Trap};

/// A runtime heap block: the array storage behind a `{len, ptr}` record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapBlock {
    /// Bytes reserved at the block address.
    pub capacity: u64,
    /// Bytes handed out to arrays so far; appends extend in place only at
    /// this mark.
    pub used: u64,
}

#[derive(Debug)]
pub struct Memory {
    bytes: Vec<u8>,
    read_only: Vec<Range<u64>>,
    heap: FxHashMap<u64, HeapBlock>,
    limit: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// First valid address.
    pub const BASE: u64 = 16;
    /// Default cap on total allocation.
    pub const DEFAULT_LIMIT: u64 = 64 << 20;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: u64) -> Self {
        Memory {
            bytes: vec![0; 16],
            read_only: Vec::new(),
            heap: FxHashMap::default(),
            limit,
        }
    }

    /// Bytes in use, including the reserved prefix.
    pub fn used(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reserve `size` zeroed bytes aligned to `align`.
    pub fn alloc(&mut self, size: u64, align: u64) -> EvalResult<u64> {
        let align = align.max(1);
        let start = self.used().div_ceil(align) * align;
        let end = start
            .checked_add(size.max(1))
            .filter(|end| *end <= self.limit)
            .ok_or(Trap::OutOfMemory(size))?;
        let end = usize::try_from(end).map_err(|_| Trap::OutOfMemory(size))?;
        self.bytes.resize(end, 0);
        Ok(start)
    }

    /// Reserve a runtime heap block with `used` of its `capacity` bytes
    /// in use. The block is aligned to at least 8 bytes.
    pub fn alloc_heap(&mut self, capacity: u64, used: u64, align: u64) -> EvalResult<u64> {
        let addr = self.alloc(capacity, align.max(8))?;
        tracing::trace!(addr, capacity, used, "heap block");
        self.heap.insert(addr, HeapBlock { capacity, used });
        Ok(addr)
    }

    /// The heap block starting exactly at `addr`.
    pub fn heap_block(&self, addr: u64) -> Option<HeapBlock> {
        self.heap.get(&addr).copied()
    }

    /// Move the in-use mark of the block at `addr`.
    pub fn set_heap_used(&mut self, addr: u64, used: u64) {
        if let Some(block) = self.heap.get_mut(&addr) {
            block.used = used.min(block.capacity);
        }
    }

    /// Mark `[addr, addr + len)` read-only.
    pub fn protect(&mut self, addr: u64, len: u64) {
        self.read_only.push(addr..addr + len);
    }

    fn range(&self, addr: u64, len: u64) -> EvalResult<Range<usize>> {
        let bad = Trap::BadAddress { addr, len };
        if addr < Self::BASE {
            return Err(bad);
        }
        let end = addr.checked_add(len).ok_or_else(|| bad.clone())?;
        if end > self.used() {
            return Err(bad);
        }
        let start = usize::try_from(addr).map_err(|_| bad.clone())?;
        let end = usize::try_from(end).map_err(|_| bad)?;
        Ok(start..end)
    }

    fn writable(&self, addr: u64, len: u64) -> EvalResult<Range<usize>> {
        let range = self.range(addr, len)?;
        let end = addr + len;
        if len > 0 && self.read_only.iter().any(|r| addr < r.end && r.start < end) {
            return Err(Trap::WriteToConstant(addr));
        }
        Ok(range)
    }

    pub fn read(&self, addr: u64, len: u64) -> EvalResult<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) -> EvalResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let range = self.writable(addr, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Copy `len` bytes; the regions may overlap.
    pub fn copy(&mut self, dst: u64, src: u64, len: u64) -> EvalResult<()> {
        if len == 0 {
            return Ok(());
        }
        let from = self.range(src, len)?;
        let to = self.writable(dst, len)?;
        self.bytes.copy_within(from, to.start);
        Ok(())
    }

    pub fn fill(&mut self, dst: u64, byte: u8, len: u64) -> EvalResult<()> {
        if len == 0 {
            return Ok(());
        }
        let range = self.writable(dst, len)?;
        self.bytes[range].fill(byte);
        Ok(())
    }

    /// Read a little-endian unsigned integer of `width` bytes.
    pub fn read_uint(&self, addr: u64, width: u64) -> EvalResult<u64> {
        let bytes = self.read(addr, width)?;
        let mut raw = [0u8; 8];
        let n = bytes.len().min(8);
        raw[..n].copy_from_slice(&bytes[..n]);
        Ok(u64::from_le_bytes(raw))
    }

    /// Write the low `width` bytes of `value`, little-endian.
    pub fn write_uint(&mut self, addr: u64, width: u64, value: u64) -> EvalResult<()> {
        let bytes = value.to_le_bytes();
        let n = usize::try_from(width.min(8)).unwrap_or(8);
        self.write(addr, &bytes[..n])
    }
}

/// Whether `[a, a + len)` and `[b, b + len)` intersect.
pub fn overlaps(a: u64, b: u64, len: u64) -> bool {
    len > 0 && a < b.saturating_add(len) && b < a.saturating_add(len)
}
