//! Marshaled interface pointers (MS-DCOM 2.2.14 `MInterfacePointer`)
//!
//! Interface pointers travel as an opaque OBJREF inside a conformant byte
//! blob. Interpreting the OBJREF (standard, custom, handler) is the object
//! exporter's business; here it is only carried and sanity-checked.

use midl_ndr::{Bytes, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter};

use super::{DcomError, Result};

/// OBJREF signature, "MEOW" in little-endian
pub const OBJREF_SIGNATURE: u32 = 0x574F_454D;

/// `MInterfacePointer { ulCntData, [size_is(ulCntData)] abData[] }`
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InterfacePointer {
    /// Marshaled OBJREF
    pub data: Bytes,
}

impl InterfacePointer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// First four bytes of the OBJREF, if present
    pub fn signature(&self) -> Option<u32> {
        let head: [u8; 4] = self.data.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(head))
    }

    /// Reject blobs that are not an OBJREF
    pub fn check_objref(&self) -> Result<()> {
        match self.signature() {
            Some(OBJREF_SIGNATURE) => Ok(()),
            Some(other) => Err(DcomError::InvalidObjRef(format!(
                "bad signature {other:#010x}"
            ))),
            None => Err(DcomError::InvalidObjRef(format!(
                "{} bytes is too short",
                self.data.len()
            ))),
        }
    }
}

impl NdrEncode for InterfacePointer {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        // conformant struct: conformance first, then ulCntData and the bytes
        w.write_size(self.data.len())?;
        w.write_size(self.data.len())?;
        w.write_bytes(&self.data);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for InterfacePointer {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let max_count = r.read_u32()?;
        let count = r.read_u32()?;
        if count != max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                offset: 0,
                actual_count: count,
            });
        }
        let count = r.check_count(count as usize, 1)?;
        Ok(Self {
            data: r.read_bytes(count)?,
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        8
    }
}
