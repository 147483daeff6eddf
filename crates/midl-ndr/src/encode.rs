//! NDR encoding: the [`NdrEncode`] trait and the [`NdrWriter`] cursor
//!
//! A writer owns the output buffer, the referent ID counter and the queue of
//! deferred pointer bodies for a single stub. Pointer bodies are never written
//! where the pointer appears; they are queued and emitted first-in first-out
//! once the enclosing top-level parameter is complete, so nested pointers end
//! up breadth-first.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{NdrContext, NdrError, Result};

/// First referent ID handed out by a writer
pub const FIRST_REFERENT_ID: u32 = 0x0002_0000;

/// Step between consecutive referent IDs
pub const REFERENT_ID_STEP: u32 = 4;

/// Trait for types that can be encoded to NDR format
pub trait NdrEncode {
    /// Encode this value at the writer's current position.
    ///
    /// Pointer bodies reachable from `self` may be queued on the writer, which
    /// is why the borrow has to outlive the writer's queue.
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    /// Get the NDR alignment requirement for this type
    fn ndr_align() -> usize
    where
        Self: Sized,
    {
        1
    }
}

/// Pointer body waiting to be written
struct DeferredItem<'a> {
    referent_id: u32,
    value: &'a dyn NdrEncode,
}

/// Monotonic referent ID source
///
/// `None` once the ID space is used up; 0 is never handed out because it
/// means "absent" on the wire.
#[derive(Debug, Clone, Copy)]
struct ReferentCounter {
    next: Option<u32>,
}

impl ReferentCounter {
    fn new() -> Self {
        Self {
            next: Some(FIRST_REFERENT_ID),
        }
    }

    fn mint(&mut self) -> Result<u32> {
        let id = self.next.ok_or(NdrError::ReferentIdsExhausted)?;
        self.next = id.checked_add(REFERENT_ID_STEP);
        Ok(id)
    }
}

/// `write_*` for one scalar: natural alignment, then the context's byte order
macro_rules! write_scalar {
    ($($name:ident($ty:ty) => $le:ident / $be:ident;)*) => {
        $(
            pub fn $name(&mut self, value: $ty) {
                self.align(std::mem::size_of::<$ty>());
                if self.ctx.little_endian {
                    self.buf.$le(value);
                } else {
                    self.buf.$be(value);
                }
            }
        )*
    };
}

/// Writing cursor for one NDR stub
pub struct NdrWriter<'a> {
    buf: BytesMut,
    ctx: NdrContext,
    referents: ReferentCounter,
    deferred: VecDeque<DeferredItem<'a>>,
}

impl<'a> NdrWriter<'a> {
    /// Create an empty writer
    pub fn new(ctx: NdrContext) -> Self {
        Self::with_capacity(ctx, 256)
    }

    /// Create an empty writer with a preallocated buffer
    pub fn with_capacity(ctx: NdrContext, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ctx,
            referents: ReferentCounter::new(),
            deferred: VecDeque::new(),
        }
    }

    /// The context this writer encodes with
    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Offset from the start of the stub
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Number of pointer bodies still queued
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Write zero padding up to the given boundary
    pub fn align(&mut self, alignment: usize) {
        let padding = NdrContext::align_padding(self.buf.len(), alignment);
        self.buf.put_bytes(0, padding);
    }

    write_scalar! {
        write_u8(u8) => put_u8 / put_u8;
        write_i8(i8) => put_i8 / put_i8;
        write_u16(u16) => put_u16_le / put_u16;
        write_i16(i16) => put_i16_le / put_i16;
        write_u32(u32) => put_u32_le / put_u32;
        write_i32(i32) => put_i32_le / put_i32;
        write_u64(u64) => put_u64_le / put_u64;
        write_i64(i64) => put_i64_le / put_i64;
        write_f32(f32) => put_f32_le / put_f32;
        write_f64(f64) => put_f64_le / put_f64;
    }

    /// Copy raw bytes with no alignment
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a conformance, offset or actual count
    pub fn write_size(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| NdrError::IntegerOverflow(count))?;
        self.write_u32(count);
        Ok(())
    }

    /// Encode a value in place
    pub fn write<T: NdrEncode>(&mut self, value: &'a T) -> Result<()> {
        value.ndr_encode(self)
    }

    /// Write a unique or full pointer.
    ///
    /// An absent target writes referent ID 0 and queues nothing. A present
    /// target gets a fresh ID and its body is queued. Returns the ID written.
    pub fn write_pointer<T: NdrEncode>(&mut self, target: Option<&'a T>) -> Result<u32> {
        match target {
            None => {
                self.write_u32(0);
                Ok(0)
            }
            Some(value) => {
                let referent_id = self.referents.mint()?;
                self.write_u32(referent_id);
                self.deferred.push_back(DeferredItem { referent_id, value });
                Ok(referent_id)
            }
        }
    }

    /// Write a `[ref]` pointer body inline.
    ///
    /// Ref pointers carry no referent ID; an absent value breaks the
    /// interface contract.
    pub fn write_ref<T: NdrEncode>(&mut self, field: &'static str, target: Option<&'a T>) -> Result<()> {
        match target {
            Some(value) => value.ndr_encode(self),
            None => Err(NdrError::PointerContractMismatch(field)),
        }
    }

    /// Drain the deferred queue in FIFO order.
    ///
    /// Bodies queued while draining are appended and drained in the same pass.
    pub fn write_deferred(&mut self) -> Result<()> {
        while let Some(item) = self.deferred.pop_front() {
            trace!(
                referent_id = item.referent_id,
                position = self.buf.len(),
                "writing deferred referent"
            );
            item.value.ndr_encode(self)?;
        }
        Ok(())
    }

    /// Encode a top-level parameter followed by every body it queued
    pub fn write_param<T: NdrEncode>(&mut self, value: &'a T) -> Result<()> {
        value.ndr_encode(self)?;
        self.write_deferred()
    }

    /// Drain anything still queued and hand over the stub
    pub fn finish(mut self) -> Result<Bytes> {
        self.write_deferred()?;
        Ok(self.buf.freeze())
    }
}
