//! Simulated runtime entry points.
//!
//! Behaves like the array runtime the lowering links against, on the
//! machine's flat memory:
//!
//! - arrays live in heap blocks that track capacity and an in-use mark;
//!   appends extend in place only when the array ends at that mark
//! - postblit and destructor hooks are recorded as events, not run
//! - contract violations (length mismatch, overlap, inexact casts, bounds
//!   failures) surface as [`Trap`]s
//!
//! Element-wise entry points (`ctor`, `assign`, `set`) receive the element
//! descriptor. Allocation, growth, concatenation and comparison entry points
//! receive the array descriptor and reach the element through it.

use std::cmp::Ordering;

use keel_ir::{ElementFlags, RuntimeFn, ScalarClass, TypeInfo};

use crate::machine::{Event, Machine};
use crate::memory::overlaps;
use crate::trap::{EvalResult, Trap};
use crate::value::{encode, mask, sign_extend, Val};

/// How fresh elements are initialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Fill {
    Zero,
    Default,
    /// Left uninitialized; filled with a recognizable pattern.
    Garbage,
}

const GARBAGE: u8 = 0xAA;

/// Positional argument access with errors naming the entry point.
struct Args<'a> {
    f: RuntimeFn,
    args: &'a [Val],
}

impl Args<'_> {
    fn get(&self, i: usize) -> EvalResult<&Val> {
        self.args
            .get(i)
            .ok_or_else(|| Trap::BadRuntimeCall(self.f, format!("missing argument {i}")))
    }

    fn word(&self, i: usize) -> EvalResult<u64> {
        self.get(i)?
            .bits()
            .map_err(|e| Trap::BadRuntimeCall(self.f, e.to_string()))
    }

    fn slice(&self, i: usize) -> EvalResult<(u64, u64)> {
        self.get(i)?
            .as_slice()
            .map_err(|e| Trap::BadRuntimeCall(self.f, e.to_string()))
    }
}

impl<'m> Machine<'m> {
    /// Execute runtime entry point `f`.
    pub(crate) fn call_runtime(&mut self, f: RuntimeFn, args: &[Val]) -> EvalResult<Option<Val>> {
        if args.len() != f.params().len() {
            return Err(Trap::BadRuntimeCall(
                f,
                format!("expected {} arguments, got {}", f.params().len(), args.len()),
            ));
        }
        let a = Args { f, args };
        let result = match f {
            RuntimeFn::NewArrayZeroed | RuntimeFn::NewArrayInit | RuntimeFn::NewArrayUninit => {
                let fill = match f {
                    RuntimeFn::NewArrayZeroed => Fill::Zero,
                    RuntimeFn::NewArrayInit => Fill::Default,
                    _ => Fill::Garbage,
                };
                let ti = self.info(a.word(0)?)?;
                self.new_array(ti, a.word(1)?, fill)?
            }
            RuntimeFn::NewMultiArrayZeroed | RuntimeFn::NewMultiArrayInit => {
                let fill = if f == RuntimeFn::NewMultiArrayZeroed {
                    Fill::Zero
                } else {
                    Fill::Default
                };
                let ti = self.info(a.word(0)?)?;
                let (n, list) = a.slice(1)?;
                let word = self.layout.word();
                let step = self.layout.size_of(&word);
                let dims = (0..n)
                    .map(|i| self.load(&word, list + i * step)?.bits())
                    .collect::<EvalResult<Vec<_>>>()?;
                self.new_multi_array(ti, &dims, fill)?
            }
            RuntimeFn::SetLengthZeroed | RuntimeFn::SetLengthInit => {
                let fill = if f == RuntimeFn::SetLengthZeroed {
                    Fill::Zero
                } else {
                    Fill::Default
                };
                let ti = self.info(a.word(0)?)?;
                self.set_length(ti, a.word(1)?, a.word(2)?, fill)?
            }
            RuntimeFn::ArrayCtor => {
                let ti = self.info(a.word(0)?)?;
                let (src, dst) = (a.slice(1)?, a.slice(2)?);
                check_lengths(dst.0, src.0)?;
                let bytes = dst.0 * ti.size;
                if overlaps(dst.1, src.1, bytes) {
                    return Err(Trap::OverlappingCopy {
                        dst: dst.1,
                        src: src.1,
                        len: bytes,
                    });
                }
                self.memory.copy(dst.1, src.1, bytes)?;
                self.postblit_range(ti, dst.1, dst.0);
                Val::slice(dst.0, dst.1)
            }
            RuntimeFn::ArrayAssignAliasing | RuntimeFn::ArrayAssignRaw => {
                let ti = self.info(a.word(0)?)?;
                let (src, dst) = (a.slice(1)?, a.slice(2)?);
                check_lengths(dst.0, src.0)?;
                let bytes = dst.0 * ti.size;
                if f == RuntimeFn::ArrayAssignRaw && overlaps(dst.1, src.1, bytes) {
                    return Err(Trap::OverlappingCopy {
                        dst: dst.1,
                        src: src.1,
                        len: bytes,
                    });
                }
                self.destroy_range(ti, dst.1, dst.0);
                self.memory.copy(dst.1, src.1, bytes)?;
                self.postblit_range(ti, dst.1, dst.0);
                Val::slice(dst.0, dst.1)
            }
            RuntimeFn::ArraySetCtor | RuntimeFn::ArraySetAssign => {
                let ti = self.info(a.word(0)?)?;
                let (value, dst, count) = (a.word(1)?, a.word(2)?, a.word(3)?);
                let bytes = self.memory.read(value, ti.size)?.to_vec();
                for i in 0..count {
                    let at = dst + i * ti.size;
                    if f == RuntimeFn::ArraySetAssign
                        && ti.flags.contains(ElementFlags::NEEDS_DESTRUCTION)
                    {
                        self.record(Event::Destroy { ty: ti.ty, addr: at });
                    }
                    self.memory.write(at, &bytes)?;
                    if ti.flags.contains(ElementFlags::NEEDS_COPY_CONSTRUCT) {
                        self.record(Event::Postblit { ty: ti.ty, addr: at });
                    }
                }
                Val::Ptr(dst)
            }
            RuntimeFn::AppendCapacity => {
                let elem = self.elem_info(self.info(a.word(0)?)?)?;
                let slot = a.word(1)?;
                let (old, ptr) = self.grow(slot, elem.size, elem.align, a.word(2)?)?;
                Val::slice(old + a.word(2)?, ptr)
            }
            RuntimeFn::AppendArray => {
                let elem = self.elem_info(self.info(a.word(0)?)?)?;
                let slot = a.word(1)?;
                let (n, src) = a.slice(2)?;
                // Read first: `src` may be the array being grown.
                let bytes = self.memory.read(src, n * elem.size)?.to_vec();
                let (old, ptr) = self.grow(slot, elem.size, elem.align, n)?;
                let at = ptr + old * elem.size;
                self.memory.write(at, &bytes)?;
                self.postblit_range(elem, at, n);
                Val::slice(old + n, ptr)
            }
            RuntimeFn::AppendCodePointUtf8 | RuntimeFn::AppendCodePointUtf16 => {
                let slot = a.word(0)?;
                let cp = mask(a.word(1)?, 32);
                let c = u32::try_from(cp)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(Trap::InvalidCodePoint(cp))?;
                let (unit, bytes) = if f == RuntimeFn::AppendCodePointUtf8 {
                    let mut buf = [0u8; 4];
                    (1, c.encode_utf8(&mut buf).as_bytes().to_vec())
                } else {
                    let mut buf = [0u16; 2];
                    let units = c.encode_utf16(&mut buf);
                    (2, units.iter().flat_map(|u| u.to_le_bytes()).collect())
                };
                let n = bytes.len() as u64 / unit;
                let (old, ptr) = self.grow(slot, unit, unit, n)?;
                self.memory.write(ptr + old * unit, &bytes)?;
                Val::slice(old + n, ptr)
            }
            RuntimeFn::CatBinary => {
                let ti = self.info(a.word(0)?)?;
                self.concat(ti, &[a.slice(1)?, a.slice(2)?])?
            }
            RuntimeFn::CatNary => {
                let ti = self.info(a.word(0)?)?;
                let (n, list) = a.slice(1)?;
                let step = self.layout.size_of(&self.layout.slice_record());
                let parts = (0..n)
                    .map(|i| self.load_record(list + i * step))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.concat(ti, &parts)?
            }
            RuntimeFn::SliceCopyChecked => {
                let (dst, dst_len) = (a.word(0)?, a.word(1)?);
                let (src, src_len) = (a.word(2)?, a.word(3)?);
                check_lengths(dst_len, src_len)?;
                if overlaps(dst, src, dst_len) {
                    return Err(Trap::OverlappingCopy {
                        dst,
                        src,
                        len: dst_len,
                    });
                }
                self.memory.copy(dst, src, dst_len)?;
                return Ok(None);
            }
            RuntimeFn::ArrayEquals => {
                let elem = self.elem_info(self.info(a.word(2)?)?)?;
                let equal = self.equals(elem, a.slice(0)?, a.slice(1)?)?;
                Val::Int(u64::from(equal))
            }
            RuntimeFn::ArrayCompare => {
                let elem = self.elem_info(self.info(a.word(2)?)?)?;
                let order = self.compare(elem.scalar, elem.size, a.slice(0)?, a.slice(1)?)?;
                ordering_val(order)
            }
            RuntimeFn::ArrayCompareChar => {
                let order = self.compare(ScalarClass::Char, 1, a.slice(0)?, a.slice(1)?)?;
                ordering_val(order)
            }
            RuntimeFn::CastLength => {
                let (len, from, to) = (a.word(0)?, a.word(1)?, a.word(2)?);
                if to == 0 {
                    return Err(Trap::BadRuntimeCall(f, "zero target size".to_owned()));
                }
                let bytes = len
                    .checked_mul(from)
                    .ok_or_else(|| Trap::BadRuntimeCall(f, "length overflow".to_owned()))?;
                if bytes % to != 0 {
                    return Err(Trap::InexactCast { bytes, elem: to });
                }
                Val::Int(mask(bytes / to, self.word_bits()))
            }
            RuntimeFn::BoundsFail => {
                let (len, ptr) = a.slice(0)?;
                let file = String::from_utf8_lossy(self.memory.read(ptr, len)?).into_owned();
                let line = u32::try_from(mask(a.word(1)?, 32)).unwrap_or(u32::MAX);
                tracing::debug!(%file, line, "bounds failure");
                return Err(Trap::BoundsFail { file, line });
            }
        };
        Ok(Some(result))
    }

    // Descriptors

    fn info(&self, addr: u64) -> EvalResult<&'m TypeInfo> {
        let module = self.module;
        module
            .type_infos
            .get(self.type_at(addr)?)
            .ok_or(Trap::UnknownTypeInfo(addr))
    }

    fn elem_info(&self, array: &TypeInfo) -> EvalResult<&'m TypeInfo> {
        let module = self.module;
        array
            .elem
            .and_then(|e| module.type_infos.get(e))
            .ok_or_else(|| Trap::malformed(format!("descriptor {:?} has no element", array.ty)))
    }

    /// Bytes of the default value of `ti`.
    fn default_bytes(&mut self, ti: &TypeInfo) -> EvalResult<Vec<u8>> {
        let size = usize::try_from(ti.size).map_err(|_| Trap::OutOfMemory(ti.size))?;
        let mut out = vec![0u8; size];
        if let Some(init) = ti.init {
            let module = self.module;
            let ty = module.consts.ty_of(init);
            let value = self.const_val(init)?;
            let n = usize::try_from(self.layout.size_of(ty))
                .map_err(|_| Trap::OutOfMemory(ti.size))?;
            let mut bytes = vec![0u8; n];
            encode(&self.layout, ty, &value, &mut bytes)?;
            let n = n.min(size);
            out[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(out)
    }

    fn fill_elements(
        &mut self,
        ptr: u64,
        count: u64,
        elem: &TypeInfo,
        fill: Fill,
    ) -> EvalResult<()> {
        let bytes = count * elem.size;
        match fill {
            Fill::Zero => self.memory.fill(ptr, 0, bytes),
            Fill::Garbage => self.memory.fill(ptr, GARBAGE, bytes),
            Fill::Default => {
                let value = self.default_bytes(elem)?;
                if value.iter().all(|b| *b == 0) {
                    return self.memory.fill(ptr, 0, bytes);
                }
                for i in 0..count {
                    self.memory.write(ptr + i * elem.size, &value)?;
                }
                Ok(())
            }
        }
    }

    // Allocation

    fn new_array(&mut self, array: &TypeInfo, len: u64, fill: Fill) -> EvalResult<Val> {
        let elem = self.elem_info(array)?;
        if len == 0 {
            return Ok(Val::slice(0, 0));
        }
        let bytes = len.checked_mul(elem.size).ok_or(Trap::OutOfMemory(u64::MAX))?;
        let ptr = self.memory.alloc_heap(bytes, bytes, elem.align)?;
        self.fill_elements(ptr, len, elem, fill)?;
        tracing::trace!(len, ptr, ?fill, "new array");
        Ok(Val::slice(len, ptr))
    }

    fn new_multi_array(&mut self, array: &TypeInfo, dims: &[u64], fill: Fill) -> EvalResult<Val> {
        let (&n, rest) = dims
            .split_first()
            .ok_or_else(|| Trap::malformed("multi-dimensional allocation without dimensions"))?;
        if rest.is_empty() {
            return self.new_array(array, n, fill);
        }
        let inner = self.elem_info(array)?;
        if n == 0 {
            return Ok(Val::slice(0, 0));
        }
        let record = self.layout.size_of(&self.layout.slice_record());
        let bytes = n.checked_mul(record).ok_or(Trap::OutOfMemory(u64::MAX))?;
        let ptr = self.memory.alloc_heap(bytes, bytes, record)?;
        for i in 0..n {
            let (len, data) = self.new_multi_array(inner, rest, fill)?.as_slice()?;
            self.store_record(ptr + i * record, len, data)?;
        }
        Ok(Val::slice(n, ptr))
    }

    fn set_length(
        &mut self,
        array: &TypeInfo,
        new_len: u64,
        slot: u64,
        fill: Fill,
    ) -> EvalResult<Val> {
        let elem = self.elem_info(array)?;
        let (len, ptr) = self.load_record(slot)?;
        if new_len <= len {
            self.store_record(slot, new_len, ptr)?;
            return Ok(Val::slice(new_len, ptr));
        }
        let (old, ptr) = self.grow(slot, elem.size, elem.align, new_len - len)?;
        self.fill_elements(ptr + old * elem.size, new_len - old, elem, fill)?;
        Ok(Val::slice(new_len, ptr))
    }

    /// Make room for `extra` more elements in the array stored at `slot`,
    /// updating the stored record. Returns the old length and the possibly
    /// moved pointer.
    fn grow(&mut self, slot: u64, size: u64, align: u64, extra: u64) -> EvalResult<(u64, u64)> {
        let (len, ptr) = self.load_record(slot)?;
        let new_len = len.checked_add(extra).ok_or(Trap::OutOfMemory(u64::MAX))?;
        let need = new_len.checked_mul(size).ok_or(Trap::OutOfMemory(u64::MAX))?;
        let have = len * size;
        let in_place = ptr != 0
            && self
                .memory
                .heap_block(ptr)
                .is_some_and(|b| b.used == have && b.capacity >= need);
        let ptr = if in_place {
            self.memory.set_heap_used(ptr, need);
            ptr
        } else {
            let capacity = need.max(have.saturating_mul(2));
            let fresh = self.memory.alloc_heap(capacity, need, align)?;
            self.memory.copy(fresh, ptr, have)?;
            tracing::trace!(from = ptr, to = fresh, capacity, "array moved");
            fresh
        };
        self.store_record(slot, new_len, ptr)?;
        Ok((len, ptr))
    }

    fn concat(&mut self, array: &TypeInfo, parts: &[(u64, u64)]) -> EvalResult<Val> {
        let elem = self.elem_info(array)?;
        let total = parts
            .iter()
            .try_fold(0u64, |acc, (len, _)| acc.checked_add(*len))
            .ok_or(Trap::OutOfMemory(u64::MAX))?;
        if total == 0 {
            return Ok(Val::slice(0, 0));
        }
        let bytes = total * elem.size;
        let ptr = self.memory.alloc_heap(bytes, bytes, elem.align)?;
        let mut at = ptr;
        for &(len, src) in parts {
            self.memory.copy(at, src, len * elem.size)?;
            at += len * elem.size;
        }
        self.postblit_range(elem, ptr, total);
        Ok(Val::slice(total, ptr))
    }

    // Copy hooks

    fn postblit_range(&mut self, elem: &TypeInfo, ptr: u64, count: u64) {
        if elem.flags.contains(ElementFlags::NEEDS_COPY_CONSTRUCT) {
            for i in 0..count {
                self.record(Event::Postblit {
                    ty: elem.ty,
                    addr: ptr + i * elem.size,
                });
            }
        }
    }

    fn destroy_range(&mut self, elem: &TypeInfo, ptr: u64, count: u64) {
        if elem.flags.contains(ElementFlags::NEEDS_DESTRUCTION) {
            for i in 0..count {
                self.record(Event::Destroy {
                    ty: elem.ty,
                    addr: ptr + i * elem.size,
                });
            }
        }
    }

    // Comparison

    fn equals(&self, elem: &TypeInfo, a: (u64, u64), b: (u64, u64)) -> EvalResult<bool> {
        if a.0 != b.0 {
            return Ok(false);
        }
        let bytes_a = self.memory.read(a.1, a.0 * elem.size)?;
        let bytes_b = self.memory.read(b.1, b.0 * elem.size)?;
        if elem.scalar != ScalarClass::Float {
            return Ok(bytes_a == bytes_b);
        }
        let size = usize::try_from(elem.size).map_err(|_| Trap::OutOfMemory(elem.size))?;
        Ok(bytes_a
            .chunks(size.max(1))
            .zip(bytes_b.chunks(size.max(1)))
            .all(|(x, y)| float_of(x) == float_of(y)))
    }

    fn compare(
        &self,
        class: ScalarClass,
        size: u64,
        a: (u64, u64),
        b: (u64, u64),
    ) -> EvalResult<Ordering> {
        let bytes_a = self.memory.read(a.1, a.0 * size)?;
        let bytes_b = self.memory.read(b.1, b.0 * size)?;
        let width = usize::try_from(size).map_err(|_| Trap::OutOfMemory(size))?.max(1);
        for (x, y) in bytes_a.chunks(width).zip(bytes_b.chunks(width)) {
            let order = compare_elem(class, x, y);
            if order != Ordering::Equal {
                return Ok(order);
            }
        }
        Ok(a.0.cmp(&b.0))
    }
}

fn check_lengths(dst: u64, src: u64) -> EvalResult<()> {
    if dst == src {
        Ok(())
    } else {
        Err(Trap::LengthMismatch { dst, src })
    }
}

fn read_le(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(raw)
}

fn float_of(bytes: &[u8]) -> f64 {
    let raw = read_le(bytes);
    if bytes.len() == 4 {
        f64::from(f32::from_bits(u32::try_from(raw).unwrap_or(0)))
    } else {
        f64::from_bits(raw)
    }
}

fn compare_elem(class: ScalarClass, x: &[u8], y: &[u8]) -> Ordering {
    match class {
        ScalarClass::Signed => {
            let bits = u32::try_from(x.len() * 8).unwrap_or(64);
            sign_extend(read_le(x), bits).cmp(&sign_extend(read_le(y), bits))
        }
        ScalarClass::Unsigned | ScalarClass::Char => read_le(x).cmp(&read_le(y)),
        ScalarClass::Float => float_of(x)
            .partial_cmp(&float_of(y))
            .unwrap_or(Ordering::Equal),
        ScalarClass::Aggregate => x.cmp(y),
    }
}

/// `-1`, `0` or `1` as an `i32` value.
fn ordering_val(order: Ordering) -> Val {
    let n: i32 = match order {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    Val::Int(u64::from(u32::from_ne_bytes(n.to_ne_bytes())))
}

#[cfg(test)]
mod tests;
