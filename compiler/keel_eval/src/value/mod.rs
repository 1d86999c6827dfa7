//! Runtime values and their in-memory encoding.
//!
//! Values are little-endian in memory. Integers are held zero-extended to
//! 64 bits and masked to their machine width; floats are held as `f64`
//! and rounded when stored as `float`.

use keel_ir::{DataLayout, MemTy};

use crate::trap::{EvalResult, Trap};

/// An evaluated value.
#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Int(u64),
    Float(f64),
    Ptr(u64),
    /// Struct, array or vector members in order.
    Agg(Vec<Val>),
}

impl Val {
    /// A `{len, ptr}` dynamic array value.
    pub fn slice(len: u64, ptr: u64) -> Self {
        Val::Agg(vec![Val::Int(len), Val::Ptr(ptr)])
    }

    /// Integer or address bits of a scalar.
    pub fn bits(&self) -> EvalResult<u64> {
        match self {
            Val::Int(v) | Val::Ptr(v) => Ok(*v),
            Val::Float(f) => Ok(f.to_bits()),
            Val::Agg(_) => Err(Trap::malformed("aggregate used as a scalar")),
        }
    }

    pub fn as_f64(&self) -> EvalResult<f64> {
        match self {
            Val::Float(f) => Ok(*f),
            other => Err(Trap::malformed(format!("{other:?} used as a float"))),
        }
    }

    pub fn fields(&self) -> EvalResult<&[Val]> {
        match self {
            Val::Agg(fields) => Ok(fields),
            other => Err(Trap::malformed(format!("{other:?} used as an aggregate"))),
        }
    }

    /// `(len, ptr)` of a dynamic array value.
    pub fn as_slice(&self) -> EvalResult<(u64, u64)> {
        match self.fields()? {
            [len, ptr] => Ok((len.bits()?, ptr.bits()?)),
            _ => Err(Trap::malformed("dynamic array value is not a pair")),
        }
    }

    /// The all-zero value of `ty`.
    pub fn zero(ty: &MemTy) -> Self {
        match ty {
            MemTy::F32 | MemTy::F64 => Val::Float(0.0),
            MemTy::Ptr => Val::Ptr(0),
            MemTy::Array(elem, len) | MemTy::Vector(elem, len) => {
                let len = usize::try_from(*len).unwrap_or(0);
                Val::Agg(vec![Val::zero(elem); len])
            }
            MemTy::Struct { fields, .. } => Val::Agg(fields.iter().map(Val::zero).collect()),
            _ => Val::Int(0),
        }
    }
}

/// Mask `value` to `bits` wide.
#[inline]
pub fn mask(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Sign-extend the low `bits` of `value` to 64 bits.
#[inline]
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return i64::from_ne_bytes(value.to_ne_bytes());
    }
    let shift = 64 - bits;
    i64::from_ne_bytes((value << shift).to_ne_bytes()) >> shift
}

/// Write `value` of type `ty` into `out`, which is exactly `size_of(ty)`
/// bytes.
pub fn encode(layout: &DataLayout, ty: &MemTy, value: &Val, out: &mut [u8]) -> EvalResult<()> {
    match ty {
        MemTy::F32 => {
            #[expect(clippy::cast_possible_truncation, reason = "float stores round to f32")]
            let f = value.as_f64()? as f32;
            out.copy_from_slice(&f.to_le_bytes());
        }
        MemTy::F64 => out.copy_from_slice(&value.as_f64()?.to_le_bytes()),
        MemTy::Array(elem, _) | MemTy::Vector(elem, _) => {
            let size = chunk(layout.size_of(elem))?;
            for (field, dst) in value.fields()?.iter().zip(out.chunks_mut(size.max(1))) {
                encode(layout, elem, field, &mut dst[..size])?;
            }
        }
        MemTy::Struct { fields, .. } => {
            for (i, (field_ty, field)) in (0u32..).zip(fields.iter().zip(value.fields()?)) {
                let start = chunk(layout.offset_of(ty, i))?;
                let end = start + chunk(layout.size_of(field_ty))?;
                let dst = out
                    .get_mut(start..end)
                    .ok_or_else(|| Trap::malformed(format!("field {i} outside `{ty}`")))?;
                encode(layout, field_ty, field, dst)?;
            }
        }
        // I1..I64 and Ptr
        _ => {
            let bytes = value.bits()?.to_le_bytes();
            let n = out.len().min(8);
            out[..n].copy_from_slice(&bytes[..n]);
        }
    }
    Ok(())
}

/// Read a value of type `ty` from `bytes`, which is exactly `size_of(ty)`
/// bytes.
pub fn decode(layout: &DataLayout, ty: &MemTy, bytes: &[u8]) -> EvalResult<Val> {
    Ok(match ty {
        MemTy::F32 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(bytes);
            Val::Float(f64::from(f32::from_le_bytes(raw)))
        }
        MemTy::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Val::Float(f64::from_le_bytes(raw))
        }
        MemTy::Array(elem, len) | MemTy::Vector(elem, len) => {
            let size = chunk(layout.size_of(elem))?;
            let len = chunk(*len)?;
            let mut elems = Vec::with_capacity(len);
            for i in 0..len {
                let src = bytes
                    .get(i * size..(i + 1) * size)
                    .ok_or_else(|| Trap::malformed(format!("element {i} outside `{ty}`")))?;
                elems.push(decode(layout, elem, src)?);
            }
            Val::Agg(elems)
        }
        MemTy::Struct { fields, .. } => {
            let mut out = Vec::with_capacity(fields.len());
            for (i, field_ty) in (0u32..).zip(fields) {
                let start = chunk(layout.offset_of(ty, i))?;
                let end = start + chunk(layout.size_of(field_ty))?;
                let src = bytes
                    .get(start..end)
                    .ok_or_else(|| Trap::malformed(format!("field {i} outside `{ty}`")))?;
                out.push(decode(layout, field_ty, src)?);
            }
            Val::Agg(out)
        }
        MemTy::Ptr => Val::Ptr(read_le(bytes)),
        _ => Val::Int(read_le(bytes)),
    })
}

fn read_le(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(raw)
}

fn chunk(n: u64) -> EvalResult<usize> {
    usize::try_from(n).map_err(|_| Trap::malformed(format!("size {n} exceeds the host")))
}

#[cfg(test)]
mod tests;
