//! NDR primitive type implementations
//!
//! NDR primitive types and their encodings:
//!
//! | MIDL Type     | Rust Type | Size | Alignment |
//! |---------------|-----------|------|-----------|
//! | boolean       | bool      | 1    | 1         |
//! | byte/char     | u8        | 1    | 1         |
//! | small         | i8        | 1    | 1         |
//! | short         | i16       | 2    | 2         |
//! | long/int      | i32       | 4    | 4         |
//! | hyper         | i64       | 8    | 8         |
//! | unsigned short| u16       | 2    | 2         |
//! | unsigned long | u32       | 4    | 4         |
//! | unsigned hyper| u64       | 8    | 8         |
//! | float         | f32       | 4    | 4         |
//! | double        | f64       | 8    | 8         |
//! | wchar_t       | u16       | 2    | 2         |
//! | GUID          | Guid      | 16   | 4         |

use std::fmt;

use crate::{NdrDecode, NdrEncode, NdrReader, NdrWriter, Result};

macro_rules! impl_ndr_primitive {
    ($ty:ty, $size:expr, $write:ident, $read:ident) => {
        impl NdrEncode for $ty {
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.$write(*self);
                Ok(())
            }

            fn ndr_align() -> usize {
                $size
            }
        }

        impl NdrDecode for $ty {
            fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
                r.$read()
            }

            fn ndr_align() -> usize {
                $size
            }

            fn ndr_min_size() -> usize {
                $size
            }
        }
    };
}

impl_ndr_primitive!(u8, 1, write_u8, read_u8);
impl_ndr_primitive!(i8, 1, write_i8, read_i8);
impl_ndr_primitive!(u16, 2, write_u16, read_u16);
impl_ndr_primitive!(i16, 2, write_i16, read_i16);
impl_ndr_primitive!(u32, 4, write_u32, read_u32);
impl_ndr_primitive!(i32, 4, write_i32, read_i32);
impl_ndr_primitive!(u64, 8, write_u64, read_u64);
impl_ndr_primitive!(i64, 8, write_i64, read_i64);
impl_ndr_primitive!(f32, 4, write_f32, read_f32);
impl_ndr_primitive!(f64, 8, write_f64, read_f64);

/// NDR boolean - encoded as a single byte (0x00 = false, 0x01 = true)
impl NdrEncode for bool {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_u8(u8::from(*self));
        Ok(())
    }
}

impl NdrDecode for bool {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(r.read_u8()? != 0)
    }
}

/// GUID as it travels in NDR: three little fields and eight bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Nil GUID
    pub const NIL: Self = Self {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Parse from string "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx" (braces allowed)
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s.trim()).ok().map(Self::from)
    }

    /// Random (version 4) GUID
    pub fn new_v4() -> Self {
        uuid::Uuid::new_v4().into()
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl From<uuid::Uuid> for Guid {
    fn from(uuid: uuid::Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Self::from_fields(data1, data2, data3, *data4)
    }
}

impl From<Guid> for uuid::Uuid {
    fn from(guid: Guid) -> Self {
        uuid::Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&uuid::Uuid::from(*self).hyphenated(), f)
    }
}

impl NdrEncode for Guid {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_u32(self.data1);
        w.write_u16(self.data2);
        w.write_u16(self.data3);
        w.write_bytes(&self.data4);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for Guid {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let data1 = r.read_u32()?;
        let data2 = r.read_u16()?;
        let data3 = r.read_u16()?;
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&r.read_bytes(8)?);
        Ok(Self::from_fields(data1, data2, data3, data4))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        16
    }
}
