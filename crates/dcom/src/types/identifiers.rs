//! DCOM identifier types (MS-DCOM 2.2.18)
//!
//! Calls are addressed to an interface instance by its IPID; interfaces
//! themselves are named by IID.

use std::fmt;

use midl_ndr::{Guid, NdrDecode, NdrEncode, NdrReader, NdrWriter};

/// Interface Pointer Identifier (16 bytes)
///
/// Identifies one interface on one object inside an object exporter. The
/// transport carries it in the request PDU's object field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipid(pub Guid);

impl Ipid {
    /// Size of IPID in bytes (16 bytes, same as UUID)
    pub const SIZE: usize = 16;

    /// Create a new IPID from a GUID
    pub const fn new(guid: Guid) -> Self {
        Self(guid)
    }

    /// Generate a random IPID
    pub fn generate() -> Self {
        Self(Guid::new_v4())
    }

    /// Create a nil IPID
    pub const fn nil() -> Self {
        Self(Guid::NIL)
    }

    /// Check if this is the nil IPID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Get the underlying GUID
    pub fn guid(&self) -> &Guid {
        &self.0
    }
}

impl Default for Ipid {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for Ipid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPID({})", self.0)
    }
}

impl fmt::Display for Ipid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl NdrEncode for Ipid {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        self.0.ndr_encode(w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for Ipid {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        Ok(Self(Guid::ndr_decode(r)?))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        Self::SIZE
    }
}
