//! NDR decoding: the [`NdrDecode`] trait and the [`NdrReader`] cursor
//!
//! Decoding mirrors the writer. A unique pointer reads only its referent ID
//! where it appears and registers a pending referent; the bodies are decoded
//! first-in first-out when the enclosing top-level parameter has been read
//! and parked in a slot table. Once the queue is empty the parked bodies are
//! resolved from the last slot back to the first, so every body a pointer
//! takes out of the table already holds its own resolved referents and no
//! step recurses along a chain of pointers.

use std::any::Any;
use std::collections::VecDeque;

use bytes::{Buf, Bytes};
use tracing::{trace, warn};

use crate::{NdrContext, NdrError, Result};

/// Trait for types that can be decoded from NDR format
pub trait NdrDecode: Sized {
    /// Decode a value at the reader's current position
    fn ndr_decode(r: &mut NdrReader) -> Result<Self>;

    /// Get the NDR alignment requirement for this type
    fn ndr_align() -> usize {
        1
    }

    /// Smallest number of bytes one value can occupy on the wire.
    ///
    /// Used to reject declared element counts that cannot fit in what is
    /// left of the stub before anything is allocated.
    fn ndr_min_size() -> usize {
        1
    }

    /// Move parked pointer bodies into the pointers inside `self`.
    ///
    /// Types without pointers keep the default no-op.
    fn ndr_resolve(&mut self, _r: &mut NdrReader) -> Result<()> {
        Ok(())
    }
}

/// Handle to a pointer body that has been announced but not yet decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referent {
    id: u32,
    slot: usize,
}

impl Referent {
    /// The referent ID read from the wire
    pub fn id(&self) -> u32 {
        self.id
    }
}

type DecodeBoxed = fn(&mut NdrReader) -> Result<Box<dyn Any>>;
type ResolveBoxed = fn(&mut dyn Any, &mut NdrReader) -> Result<()>;

fn decode_boxed<T: NdrDecode + 'static>(r: &mut NdrReader) -> Result<Box<dyn Any>> {
    Ok(Box::new(T::ndr_decode(r)?))
}

fn resolve_boxed<T: NdrDecode + 'static>(value: &mut dyn Any, r: &mut NdrReader) -> Result<()> {
    match value.downcast_mut::<T>() {
        Some(value) => value.ndr_resolve(r),
        None => Ok(()),
    }
}

/// Pointer body waiting to be read
struct PendingReferent {
    referent: Referent,
    depth: usize,
    decode: DecodeBoxed,
}

/// Decoded pointer body waiting for its pointer
struct Parked {
    value: Option<Box<dyn Any>>,
    resolve: ResolveBoxed,
}

macro_rules! read_scalar {
    ($($name:ident($ty:ty) => $le:ident / $be:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                self.aligned(std::mem::size_of::<$ty>())?;
                Ok(if self.ctx.little_endian {
                    self.buf.$le()
                } else {
                    self.buf.$be()
                })
            }
        )*
    };
}

/// Reading cursor for one NDR stub
pub struct NdrReader {
    buf: Bytes,
    position: usize,
    ctx: NdrContext,
    pending: VecDeque<PendingReferent>,
    slots: Vec<Parked>,
    /// Pointer depth of the body being decoded, 0 outside a drain
    depth: usize,
    /// Slots below this index have been resolved
    resolved: usize,
}

impl NdrReader {
    /// Create a reader over a complete stub
    pub fn new(buf: Bytes, ctx: NdrContext) -> Self {
        Self {
            buf,
            position: 0,
            ctx,
            pending: VecDeque::new(),
            slots: Vec::new(),
            depth: 0,
            resolved: 0,
        }
    }

    /// The context this reader decodes with
    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Offset from the start of the stub
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let have = self.buf.remaining();
        if have < needed {
            return Err(NdrError::TruncatedInput { needed, have });
        }
        Ok(())
    }

    /// Skip padding up to the given boundary
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.position, alignment);
        self.ensure(padding)?;
        self.buf.advance(padding);
        self.position += padding;
        Ok(())
    }

    fn aligned(&mut self, size: usize) -> Result<()> {
        self.align(size)?;
        self.ensure(size)?;
        self.position += size;
        Ok(())
    }

    read_scalar! {
        read_u8(u8) => get_u8 / get_u8;
        read_i8(i8) => get_i8 / get_i8;
        read_u16(u16) => get_u16_le / get_u16;
        read_i16(i16) => get_i16_le / get_i16;
        read_u32(u32) => get_u32_le / get_u32;
        read_i32(i32) => get_i32_le / get_i32;
        read_u64(u64) => get_u64_le / get_u64;
        read_i64(i64) => get_i64_le / get_i64;
        read_f32(f32) => get_f32_le / get_f32;
        read_f64(f64) => get_f64_le / get_f64;
    }

    /// Take `len` raw bytes with no alignment
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        self.position += len;
        Ok(self.buf.split_to(len))
    }

    /// Read a conformance, offset or actual count
    pub fn read_size(&mut self) -> Result<usize> {
        let count = self.read_u32()?;
        usize::try_from(count).map_err(|_| NdrError::IntegerOverflow(usize::MAX))
    }

    /// Check a declared element count against the stub and the context limit.
    ///
    /// Must run before anything sized by `count` is allocated.
    pub fn check_count(&self, count: usize, element_size: usize) -> Result<usize> {
        let limit = self.ctx.max_elements;
        if count > limit {
            warn!(count, limit, "declared element count exceeds limit");
            return Err(NdrError::AllocationLimitExceeded {
                requested: count,
                limit,
            });
        }
        let remaining = self.remaining();
        let fits = count
            .checked_mul(element_size)
            .map_or(false, |needed| needed <= remaining);
        if !fits {
            warn!(
                declared = count,
                element_size,
                remaining,
                position = self.position,
                "rejecting oversized length"
            );
            return Err(NdrError::OversizedLength {
                declared: count,
                element_size,
                remaining,
            });
        }
        Ok(count)
    }

    /// Decode a value in place
    pub fn read<T: NdrDecode>(&mut self) -> Result<T> {
        T::ndr_decode(self)
    }

    /// Read a unique or full pointer's referent ID.
    ///
    /// Zero means absent. Any other ID registers a pending body to be decoded
    /// by the next drain, one level below the body currently being read.
    /// IDs are not deduplicated: each occurrence decodes its own body.
    pub fn read_pointer<T: NdrDecode + 'static>(&mut self) -> Result<Option<Referent>> {
        let id = self.read_u32()?;
        if id == 0 {
            return Ok(None);
        }
        let depth = self.depth + 1;
        let limit = self.ctx.max_depth;
        if depth > limit {
            warn!(depth, limit, referent_id = id, "pointer nesting too deep");
            return Err(NdrError::NestingTooDeep { depth, limit });
        }
        let referent = Referent {
            id,
            slot: self.slots.len(),
        };
        self.slots.push(Parked {
            value: None,
            resolve: resolve_boxed::<T>,
        });
        self.pending.push_back(PendingReferent {
            referent,
            depth,
            decode: decode_boxed::<T>,
        });
        Ok(Some(referent))
    }

    /// Decode every pending pointer body in FIFO order, then resolve them.
    ///
    /// Bodies announced while draining are appended and decoded in the same
    /// pass. A body's referents always sit in later slots than the body
    /// itself, so walking the new slots backwards resolves children before
    /// their parents.
    pub fn read_deferred(&mut self) -> Result<()> {
        let outer = self.depth;
        let drained = self.drain();
        self.depth = outer;
        drained?;

        for slot in (self.resolved..self.slots.len()).rev() {
            let resolve = self.slots[slot].resolve;
            if let Some(mut value) = self.slots[slot].value.take() {
                resolve(&mut *value, self)?;
                self.slots[slot].value = Some(value);
            }
        }
        self.resolved = self.slots.len();
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(item) = self.pending.pop_front() {
            trace!(
                referent_id = item.referent.id,
                depth = item.depth,
                position = self.position,
                "reading deferred referent"
            );
            self.depth = item.depth;
            let value = (item.decode)(self)?;
            self.slots[item.referent.slot].value = Some(value);
        }
        Ok(())
    }

    /// Take a decoded pointer body out of the slot table
    pub fn take_referent<T: 'static>(&mut self, referent: Referent) -> Result<T> {
        let value = self
            .slots
            .get_mut(referent.slot)
            .and_then(|parked| parked.value.take())
            .ok_or(NdrError::UnresolvedReferent(referent.id))?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| NdrError::UnresolvedReferent(referent.id))
    }

    /// Decode a top-level parameter, drain its pointer bodies and resolve them
    pub fn read_param<T: NdrDecode>(&mut self) -> Result<T> {
        let mut value = T::ndr_decode(self)?;
        self.read_deferred()?;
        value.ndr_resolve(self)?;
        Ok(value)
    }
}
