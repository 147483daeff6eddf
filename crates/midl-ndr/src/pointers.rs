//! NDR pointer types
//!
//! NDR supports three pointer semantics:
//!
//! - Reference (`[ref]`): Non-null, data follows inline, no wire representation
//! - Unique (`[unique]`): Nullable, 4-byte referent ID, body deferred
//! - Full (`[ptr]`): Nullable, 4-byte referent ID, body deferred; aliasing is
//!   allowed by the IDL but every occurrence still carries its own body here
//!
//! Unique and full pointers only write their referent ID where they appear.
//! Their bodies go through the writer's deferred queue; on the way in they
//! stay pending until the enclosing parameter's bodies have been read and
//! resolved, then [`NdrDecode::ndr_resolve`] moves them in.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Referent, Result};

/// Reference pointer - non-null, data follows inline
///
/// The `[ref]` attribute in MIDL. The pointer itself is not transmitted;
/// the pointee data is always present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefPtr<T>(pub T);

impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: NdrEncode> NdrEncode for RefPtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.0.ndr_encode(w)
    }

    fn ndr_align() -> usize {
        T::ndr_align()
    }
}

impl<T: NdrDecode> NdrDecode for RefPtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(Self(T::ndr_decode(r)?))
    }

    fn ndr_align() -> usize {
        T::ndr_align()
    }

    fn ndr_min_size() -> usize {
        T::ndr_min_size()
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        self.0.ndr_resolve(r)
    }
}

enum Slot<T> {
    Null,
    Value(Box<T>),
    Pending(Referent),
}

/// Unique pointer - nullable, no aliasing
pub struct UniquePtr<T>(Slot<T>);

impl<T> Default for UniquePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self(Slot::Value(Box::new(value)))
    }

    pub fn null() -> Self {
        Self(Slot::Null)
    }

    /// `false` for a decoded pointer whose body is still pending
    pub fn is_null(&self) -> bool {
        matches!(self.0, Slot::Null)
    }

    pub fn as_ref(&self) -> Option<&T> {
        match &self.0 {
            Slot::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match &mut self.0 {
            Slot::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self.0 {
            Slot::Value(value) => Some(*value),
            _ => None,
        }
    }

    /// Referent still waiting for its body, if any
    pub fn pending(&self) -> Option<Referent> {
        match self.0 {
            Slot::Pending(referent) => Some(referent),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for UniquePtr<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::null, Self::new)
    }
}

impl<T: Clone> Clone for UniquePtr<T> {
    fn clone(&self) -> Self {
        Self(match &self.0 {
            Slot::Null => Slot::Null,
            Slot::Value(value) => Slot::Value(value.clone()),
            Slot::Pending(referent) => Slot::Pending(*referent),
        })
    }
}

impl<T: PartialEq> PartialEq for UniquePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Slot::Null, Slot::Null) => true,
            (Slot::Value(a), Slot::Value(b)) => a == b,
            (Slot::Pending(a), Slot::Pending(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Eq> Eq for UniquePtr<T> {}

impl<T: fmt::Debug> fmt::Debug for UniquePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Slot::Null => f.write_str("null"),
            Slot::Value(value) => f.debug_tuple("UniquePtr").field(value).finish(),
            Slot::Pending(referent) => write!(f, "pending({:#010x})", referent.id()),
        }
    }
}

impl<T: NdrEncode> NdrEncode for UniquePtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        match &self.0 {
            Slot::Null => w.write_pointer::<T>(None)?,
            Slot::Value(value) => w.write_pointer(Some(value.as_ref()))?,
            Slot::Pending(referent) => return Err(NdrError::UnresolvedReferent(referent.id())),
        };
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<T: NdrDecode + 'static> NdrDecode for UniquePtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(match r.read_pointer::<T>()? {
            None => Self(Slot::Null),
            Some(referent) => Self(Slot::Pending(referent)),
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        // the reader resolved the body before handing it out
        if let Slot::Pending(referent) = &self.0 {
            let value: T = r.take_referent(*referent)?;
            self.0 = Slot::Value(Box::new(value));
        }
        Ok(())
    }
}

/// Full pointer - nullable, aliasing allowed
///
/// Shares the unique wire form; identical targets are not collapsed onto one
/// referent ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPtr<T>(pub UniquePtr<T>);

impl<T> Default for FullPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> FullPtr<T> {
    pub fn new(value: T) -> Self {
        Self(UniquePtr::new(value))
    }

    pub fn null() -> Self {
        Self(UniquePtr::null())
    }
}

impl<T> Deref for FullPtr<T> {
    type Target = UniquePtr<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for FullPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: NdrEncode> NdrEncode for FullPtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.0.ndr_encode(w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<T: NdrDecode + 'static> NdrDecode for FullPtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(Self(UniquePtr::ndr_decode(r)?))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        self.0.ndr_resolve(r)
    }
}
