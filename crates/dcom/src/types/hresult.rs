//! HRESULT return codes
//!
//! Every ORPC response ends with a 32-bit return code:
//!
//! ```text
//!  31  30..28  27........16  15...........0
//! [S] [ R C N ] [ facility ] [    code     ]
//! ```
//!
//! A set severity bit (negative value) is a failure. Zero is plain success and
//! a positive value is success carrying a warning or informational code.

use std::fmt;

use midl_ndr::{NdrDecode, NdrEncode, NdrReader, NdrWriter};

/// Facility of codes mapped from Win32 errors
pub const FACILITY_WIN32: u16 = 7;

/// Facility of codes defined by the interface itself
pub const FACILITY_ITF: u16 = 4;

/// How a return code reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `S_OK`
    Success,
    /// Success with a nonzero status (`S_FALSE` and friends)
    Warning { code: u16 },
    /// Failure
    Failure { facility: u16, code: u16 },
}

/// A 32-bit HRESULT-shaped return code
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HResult(pub i32);

impl HResult {
    /// Operation successful
    pub const S_OK: Self = Self::from_u32(0x0000_0000);
    /// Operation successful, returning false
    pub const S_FALSE: Self = Self::from_u32(0x0000_0001);
    /// Not implemented
    pub const E_NOTIMPL: Self = Self::from_u32(0x8000_4001);
    /// No such interface supported
    pub const E_NOINTERFACE: Self = Self::from_u32(0x8000_4002);
    /// Invalid pointer
    pub const E_POINTER: Self = Self::from_u32(0x8000_4003);
    /// Unspecified error
    pub const E_FAIL: Self = Self::from_u32(0x8000_4005);
    /// Unexpected failure
    pub const E_UNEXPECTED: Self = Self::from_u32(0x8000_FFFF);
    /// Out of memory
    pub const E_OUTOFMEMORY: Self = Self::from_u32(0x8007_000E);
    /// Invalid argument
    pub const E_INVALIDARG: Self = Self::from_u32(0x8007_0057);
    /// Access denied
    pub const E_ACCESSDENIED: Self = Self::from_u32(0x8007_0005);
    /// Class not registered
    pub const REGDB_E_CLASSNOTREG: Self = Self::from_u32(0x8004_0154);
    /// Object or server not available
    pub const CO_E_OBJNOTCONNECTED: Self = Self::from_u32(0x8004_01FD);
    /// RPC server unavailable
    pub const RPC_E_SERVER_DIED: Self = Self::from_u32(0x8001_0007);

    /// Reinterpret the unsigned wire value
    pub const fn from_u32(value: u32) -> Self {
        Self(value as i32)
    }

    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Map a Win32 error code (`HRESULT_FROM_WIN32`)
    pub const fn from_win32(code: u32) -> Self {
        if code == 0 {
            Self::S_OK
        } else {
            Self::from_u32(0x8000_0000 | ((FACILITY_WIN32 as u32) << 16) | (code & 0xFFFF))
        }
    }

    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Facility bits (16..=27)
    pub const fn facility(self) -> u16 {
        ((self.as_u32() >> 16) & 0x0FFF) as u16
    }

    /// Low 16 bits
    pub const fn code(self) -> u16 {
        (self.as_u32() & 0xFFFF) as u16
    }

    /// The Win32 error behind a failure from the Win32 facility
    pub const fn win32_code(self) -> Option<u16> {
        if self.is_failure() && self.facility() == FACILITY_WIN32 {
            Some(self.code())
        } else {
            None
        }
    }

    pub const fn outcome(self) -> Outcome {
        if self.0 == 0 {
            Outcome::Success
        } else if self.0 > 0 {
            Outcome::Warning { code: self.code() }
        } else {
            Outcome::Failure {
                facility: self.facility(),
                code: self.code(),
            }
        }
    }

    /// Well-known name, if this is one of the constants above
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::E_ACCESSDENIED => "E_ACCESSDENIED",
            Self::REGDB_E_CLASSNOTREG => "REGDB_E_CLASSNOTREG",
            Self::CO_E_OBJNOTCONNECTED => "CO_E_OBJNOTCONNECTED",
            Self::RPC_E_SERVER_DIED => "RPC_E_SERVER_DIED",
            _ => return None,
        })
    }
}

impl From<u32> for HResult {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "HResult({name})"),
            None => write!(f, "HResult({:#010x})", self.as_u32()),
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.as_u32())?;
        if let Some(name) = self.name() {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

impl NdrEncode for HResult {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_i32(self.0);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for HResult {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        Ok(Self(r.read_i32()?))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }
}
