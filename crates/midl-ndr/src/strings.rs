//! NDR string types
//!
//! `[string]` parameters are conformant varying arrays with a terminator.
//!
//! Wire format:
//! ```text
//! max_count: u32    # Maximum elements including null
//! offset: u32       # Always 0
//! actual_count: u32 # Actual elements including null
//! chars[actual_count]
//! ```
//!
//! Fixed-capacity buffers (`[size_is(N)] wchar_t*`) carry only the
//! conformance and exactly `N` units. OLE Automation `BSTR`s are a unique
//! pointer to a `FLAGGED_WORD_BLOB`.

use crate::arrays::read_varying_header;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result, UniquePtr};

fn write_string_header(w: &mut NdrWriter<'_>, count: usize) -> Result<()> {
    w.align(4);
    w.write_size(count)?;
    w.write_size(0)?;
    w.write_size(count)
}

fn read_string_header(r: &mut NdrReader, element_size: usize) -> Result<usize> {
    let (_, offset, actual) = read_varying_header(r)?;
    if offset != 0 {
        return Err(NdrError::InvalidString(format!("non-zero offset {offset}")));
    }
    r.check_count(actual as usize, element_size)
}

fn read_units(r: &mut NdrReader, count: usize) -> Result<Vec<u16>> {
    let mut units = Vec::with_capacity(count);
    for _ in 0..count {
        units.push(r.read_u16()?);
    }
    Ok(units)
}

/// ANSI string type (null-terminated char*)
///
/// Used for [string] annotated char* parameters in MIDL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrString(pub String);

impl NdrString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for NdrString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl NdrEncode for NdrString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let bytes = self.0.as_bytes();
        write_string_header(w, bytes.len() + 1)?;
        w.write_bytes(bytes);
        w.write_u8(0);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for NdrString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let actual = read_string_header(r, 1)?;
        let mut bytes = r.read_bytes(actual)?.to_vec();
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(Self(String::from_utf8(bytes)?))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        12
    }
}

/// Wide string type (null-terminated wchar_t*, `LPWSTR`)
///
/// Ill-formed UTF-16 from the wire decodes lossily to U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrWString(pub String);

impl NdrWString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for NdrWString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NdrWString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl NdrEncode for NdrWString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let units: Vec<u16> = self.0.encode_utf16().collect();
        write_string_header(w, units.len() + 1)?;
        for unit in units {
            w.write_u16(unit);
        }
        w.write_u16(0);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for NdrWString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let actual = read_string_header(r, 2)?;
        let mut units = read_units(r, actual)?;
        if units.last() == Some(&0) {
            units.pop();
        }
        Ok(Self(String::from_utf16_lossy(&units)))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        12
    }
}

/// Write `capacity` then exactly `capacity` UTF-16 units of `text`.
///
/// Longer text is cut at the raw code unit, which can split a surrogate pair;
/// shorter text is padded with NULs.
fn write_capacity_units(w: &mut NdrWriter<'_>, capacity: usize, text: &str) -> Result<()> {
    w.write_size(capacity)?;
    let mut written = 0;
    for unit in text.encode_utf16().take(capacity) {
        w.write_u16(unit);
        written += 1;
    }
    for _ in written..capacity {
        w.write_u16(0);
    }
    Ok(())
}

fn read_capacity_units(r: &mut NdrReader) -> Result<(usize, String)> {
    let capacity = r.read_size()?;
    r.check_count(capacity, 2)?;
    let units = read_units(r, capacity)?;
    let text = String::from_utf16_lossy(&units);
    Ok((capacity, text.trim_end_matches('\0').to_string()))
}

/// Wide character buffer of compile-time capacity (`[size_is(N)] wchar_t*`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedWString<const N: usize>(pub String);

impl<const N: usize> FixedWString<N> {
    pub const CAPACITY: usize = N;

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> NdrEncode for FixedWString<N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        write_capacity_units(w, N, &self.0)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<const N: usize> NdrDecode for FixedWString<N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let (_, text) = read_capacity_units(r)?;
        Ok(Self(text))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }
}

/// Wide character buffer whose capacity is another parameter's value
///
/// The capacity is usually filled in by an operation's prepare hook right
/// before marshaling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SizedWString {
    pub capacity: usize,
    pub text: String,
}

impl SizedWString {
    pub fn new(capacity: usize, text: impl Into<String>) -> Self {
        Self {
            capacity,
            text: text.into(),
        }
    }
}

impl NdrEncode for SizedWString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        write_capacity_units(w, self.capacity, &self.text)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for SizedWString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let (capacity, text) = read_capacity_units(r)?;
        Ok(Self { capacity, text })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }
}

/// `FLAGGED_WORD_BLOB`, the body behind a `BSTR` pointer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlaggedWordBlob {
    pub units: Vec<u16>,
}

impl NdrEncode for FlaggedWordBlob {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let count = self.units.len();
        let bytes = count
            .checked_mul(2)
            .ok_or(NdrError::IntegerOverflow(count))?;
        // conformant struct: the conformance leads the body
        w.write_size(count)?;
        w.write_size(bytes)?;
        w.write_size(count)?;
        for &unit in &self.units {
            w.write_u16(unit);
        }
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for FlaggedWordBlob {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let max_count = r.read_u32()?;
        let _byte_count = r.read_u32()?;
        let count = r.read_u32()?;
        if count != max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                offset: 0,
                actual_count: count,
            });
        }
        let count = r.check_count(count as usize, 2)?;
        Ok(Self {
            units: read_units(r, count)?,
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        12
    }
}

/// OLE Automation string (`BSTR`): a unique pointer to a word blob
///
/// A null `BSTR` and an empty one are distinct on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BStr(pub UniquePtr<FlaggedWordBlob>);

impl BStr {
    pub fn new(s: &str) -> Self {
        Self(UniquePtr::new(FlaggedWordBlob {
            units: s.encode_utf16().collect(),
        }))
    }

    pub fn null() -> Self {
        Self(UniquePtr::null())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Lossy conversion; `None` for a null `BSTR`
    pub fn to_string_lossy(&self) -> Option<String> {
        self.0
            .as_ref()
            .map(|blob| String::from_utf16_lossy(&blob.units))
    }
}

impl NdrEncode for BStr {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.0.ndr_encode(w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl NdrDecode for BStr {
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
