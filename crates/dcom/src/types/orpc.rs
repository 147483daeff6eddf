//! ORPC (Object RPC) header types (MS-DCOM 2.2.13, 2.2.14)
//!
//! Every ORPC request stub starts with an ORPCTHIS and every response stub
//! with an ORPCTHAT. Both may carry an extension array through a unique
//! pointer, so they are written as top-level parameters and their extension
//! bodies follow the fixed part.

use midl_ndr::{
    ndr_struct, ConformantArray, Guid, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter,
    UniquePtr,
};

/// COM version structure (MS-DCOM 2.2.11)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComVersion {
    /// Major version number
    pub major: u16,
    /// Minor version number
    pub minor: u16,
}

impl ComVersion {
    /// Size in bytes
    pub const SIZE: usize = 4;

    /// DCOM version 5.1 (Windows 2000)
    pub const DCOM_5_1: Self = Self { major: 5, minor: 1 };
    /// DCOM version 5.4 (Windows XP/2003)
    pub const DCOM_5_4: Self = Self { major: 5, minor: 4 };
    /// DCOM version 5.6 (Windows Vista)
    pub const DCOM_5_6: Self = Self { major: 5, minor: 6 };
    /// DCOM version 5.7 (Windows 7)
    pub const DCOM_5_7: Self = Self { major: 5, minor: 7 };

    /// Create a new COM version
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

ndr_struct!(ComVersion { major: u16, minor: u16 });

/// One ORPC extension (MS-DCOM 2.2.21.1)
///
/// A conformant struct: the data is padded to a multiple of eight bytes and
/// that padded length is the conformance written ahead of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrpcExtent {
    /// Extension identifier
    pub id: Guid,
    /// Extension data, without padding
    pub data: Vec<u8>,
}

impl OrpcExtent {
    pub fn new(id: Guid, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    fn padded_len(&self) -> usize {
        (self.data.len() + 7) & !7
    }
}

impl NdrEncode for OrpcExtent {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let padded = self.padded_len();
        w.write_size(padded)?;
        self.id.ndr_encode(w)?;
        w.write_size(self.data.len())?;
        w.write_bytes(&self.data);
        for _ in self.data.len()..padded {
            w.write_u8(0);
        }
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for OrpcExtent {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let padded = r.read_size()?;
        let id = Guid::ndr_decode(r)?;
        let size = r.read_size()?;
        if size > padded {
            return Err(NdrError::ConformanceMismatch {
                max_count: padded as u32,
                offset: 0,
                actual_count: size as u32,
            });
        }
        r.check_count(padded, 1)?;
        let bytes = r.read_bytes(padded)?;
        Ok(Self {
            id,
            data: bytes[..size].to_vec(),
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        24
    }
}

/// ORPC extension array (MS-DCOM 2.2.21)
///
/// The extent pointers live in a conformant array whose length is `size`
/// rounded up to an even count; the extra slot is a null pointer.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcExtentArray {
    /// Number of extents
    pub size: u32,
    /// Reserved (must be 0)
    pub reserved: u32,
    extent: UniquePtr<ConformantArray<UniquePtr<OrpcExtent>>>,
}

ndr_struct!(OrpcExtentArray {
    size: u32,
    reserved: u32,
    extent: UniquePtr<ConformantArray<UniquePtr<OrpcExtent>>>,
});

fn extent_count(len: usize) -> midl_ndr::Result<u32> {
    u32::try_from(len).map_err(|_| NdrError::IntegerOverflow(len))
}

impl OrpcExtentArray {
    /// Build the array, failing if the count does not fit the `size` field
    pub fn new(extents: Vec<OrpcExtent>) -> midl_ndr::Result<Self> {
        let len = extents.len();
        let size = extent_count(len)?;
        if size == 0 {
            return Ok(Self::default());
        }
        let mut slots: Vec<_> = extents.into_iter().map(UniquePtr::new).collect();
        slots.resize_with((len + 1) & !1, UniquePtr::null);
        Ok(Self {
            size,
            reserved: 0,
            extent: UniquePtr::new(ConformantArray::new(slots)),
        })
    }

    /// Non-null extents in wire order
    pub fn extents(&self) -> impl Iterator<Item = &OrpcExtent> {
        self.extent
            .as_ref()
            .into_iter()
            .flat_map(|array| array.elements.iter().filter_map(UniquePtr::as_ref))
    }

    /// Extent with the given identifier
    pub fn find(&self, id: &Guid) -> Option<&OrpcExtent> {
        self.extents().find(|extent| extent.id == *id)
    }
}

/// ORPCTHIS structure (MS-DCOM 2.2.13)
///
/// Sent with every ORPC request from client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrpcThis {
    /// COM version
    pub version: ComVersion,
    /// Flags (must be 0)
    pub flags: u32,
    /// Reserved (must be 0)
    pub reserved1: u32,
    /// Causality ID (UUID identifying the call chain)
    pub causality_id: Guid,
    /// Optional extension array
    pub extensions: UniquePtr<OrpcExtentArray>,
}

ndr_struct!(OrpcThis {
    version: ComVersion,
    flags: u32,
    reserved1: u32,
    causality_id: Guid,
    extensions: UniquePtr<OrpcExtentArray>,
});

impl OrpcThis {
    /// Size of the fixed part, extension pointer included
    pub const MIN_SIZE: usize = 4 + 4 + 4 + 16 + 4;

    /// Create a new ORPCTHIS with a fresh causality ID
    pub fn new() -> Self {
        Self::with_causality(Guid::new_v4())
    }

    /// Create with a specific causality ID
    pub fn with_causality(causality_id: Guid) -> Self {
        Self {
            version: crate::DCOM_VERSION,
            flags: 0,
            reserved1: 0,
            causality_id,
            extensions: UniquePtr::null(),
        }
    }

    pub fn with_extensions(mut self, extents: Vec<OrpcExtent>) -> midl_ndr::Result<Self> {
        self.extensions = UniquePtr::new(OrpcExtentArray::new(extents)?);
        Ok(self)
    }
}

impl Default for OrpcThis {
    fn default() -> Self {
        Self::new()
    }
}

/// ORPCTHAT structure (MS-DCOM 2.2.14)
///
/// Sent with every ORPC response from server to client.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcThat {
    /// Flags (must be 0)
    pub flags: u32,
    /// Optional extension array
    pub extensions: UniquePtr<OrpcExtentArray>,
}

ndr_struct!(OrpcThat {
    flags: u32,
    extensions: UniquePtr<OrpcExtentArray>,
});

impl OrpcThat {
    /// Size of the fixed part, extension pointer included
    pub const MIN_SIZE: usize = 8;

    /// Create a new empty ORPCTHAT
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(mut self, extents: Vec<OrpcExtent>) -> midl_ndr::Result<Self> {
        self.extensions = UniquePtr::new(OrpcExtentArray::new(extents)?);
        Ok(self)
    }
}

/// Well-known extension identifiers
pub mod extent_ids {
    use midl_ndr::Guid;

    const OLE_NODE: [u8; 8] = [0xc0, 0, 0, 0, 0, 0, 0, 0x46];

    /// Error information extension (MS-DCOM 2.2.21.2)
    pub const ERROR_INFO: Guid = Guid::from_fields(0x0000_031c, 0, 0, OLE_NODE);
    /// Context extension (MS-DCOM 2.2.21.4)
    pub const CONTEXT: Guid = Guid::from_fields(0x0000_0334, 0, 0, OLE_NODE);
}
