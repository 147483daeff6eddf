//! NDR array types
//!
//! NDR supports several array types:
//!
//! - Fixed arrays: size known at compile time
//! - Conformant arrays: size determined at runtime, transmitted as prefix
//! - Varying arrays: subset of elements transmitted
//! - Conformant varying arrays: both conformant and varying
//!
//! Decoding checks every declared count against the bytes left in the stub
//! (and the context's element ceiling) before allocating.

use std::marker::PhantomData;

use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

/// Read `max_count`, `offset`, `actual_count` and check they agree
pub(crate) fn read_varying_header(r: &mut NdrReader) -> Result<(u32, u32, u32)> {
    let max_count = r.read_u32()?;
    let offset = r.read_u32()?;
    let actual_count = r.read_u32()?;
    let end = offset.checked_add(actual_count);
    if end.map_or(true, |end| end > max_count) {
        return Err(NdrError::ConformanceMismatch {
            max_count,
            offset,
            actual_count,
        });
    }
    Ok((max_count, offset, actual_count))
}

fn encode_elements<'a, T: NdrEncode>(elements: &'a [T], w: &mut NdrWriter<'a>) -> Result<()> {
    for element in elements {
        element.ndr_encode(w)?;
    }
    Ok(())
}

fn decode_elements<T: NdrDecode>(r: &mut NdrReader, count: usize) -> Result<Vec<T>> {
    let count = r.check_count(count, T::ndr_min_size())?;
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        elements.push(T::ndr_decode(r)?);
    }
    Ok(elements)
}

fn resolve_elements<T: NdrDecode>(elements: &mut [T], r: &mut NdrReader) -> Result<()> {
    for element in elements {
        element.ndr_resolve(r)?;
    }
    Ok(())
}

/// Fixed-size array
///
/// Wire format: just the elements (no size prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedArray<T, const N: usize> {
    pub elements: [T; N],
}

impl<T: Default + Copy, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self {
            elements: [T::default(); N],
        }
    }
}

impl<T, const N: usize> FixedArray<T, N> {
    pub fn new(elements: [T; N]) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode, const N: usize> NdrEncode for FixedArray<T, N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        encode_elements(&self.elements, w)
    }

    fn ndr_align() -> usize {
        T::ndr_align()
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for FixedArray<T, N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let elements = decode_elements::<T>(r, N)?;
        let got = elements.len();
        let elements = <[T; N]>::try_from(elements)
            .map_err(|_| NdrError::ArraySizeMismatch { expected: N, got })?;
        Ok(Self { elements })
    }

    fn ndr_align() -> usize {
        T::ndr_align()
    }

    fn ndr_min_size() -> usize {
        N.saturating_mul(T::ndr_min_size())
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        resolve_elements(&mut self.elements, r)
    }
}

/// Conformant array - size determined at runtime
///
/// Wire format:
/// ```text
/// max_count: u32  # Number of elements
/// elements[max_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformantArray<T> {
    pub elements: Vec<T>,
}

impl<T> Default for ConformantArray<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<T> ConformantArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.elements
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode> NdrEncode for ConformantArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_size(self.elements.len())?;
        encode_elements(&self.elements, w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<T: NdrDecode> NdrDecode for ConformantArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let max_count = r.read_size()?;
        Ok(Self {
            elements: decode_elements(r, max_count)?,
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        4
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        resolve_elements(&mut self.elements, r)
    }
}

/// Varying array - fixed maximum size, subset transmitted
///
/// Wire format:
/// ```text
/// offset: u32       # First transmitted element (always 0 in practice)
/// actual_count: u32 # Number of transmitted elements
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingArray<T, const N: usize> {
    pub offset: usize,
    pub elements: Vec<T>,
    _marker: PhantomData<[T; N]>,
}

impl<T, const N: usize> Default for VaryingArray<T, N> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T, const N: usize> VaryingArray<T, N> {
    pub fn new(elements: Vec<T>) -> Self {
        Self::with_offset(0, elements)
    }

    pub fn with_offset(offset: usize, elements: Vec<T>) -> Self {
        Self {
            offset,
            elements,
            _marker: PhantomData,
        }
    }
}

impl<T: NdrEncode, const N: usize> NdrEncode for VaryingArray<T, N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let got = self.offset.saturating_add(self.elements.len());
        if got > N {
            return Err(NdrError::ArraySizeMismatch { expected: N, got });
        }
        w.write_size(self.offset)?;
        w.write_size(self.elements.len())?;
        encode_elements(&self.elements, w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for VaryingArray<T, N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let offset = r.read_size()?;
        let actual_count = r.read_size()?;
        let got = offset.saturating_add(actual_count);
        if got > N {
            return Err(NdrError::ArraySizeMismatch { expected: N, got });
        }
        Ok(Self::with_offset(offset, decode_elements(r, actual_count)?))
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        8
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        resolve_elements(&mut self.elements, r)
    }
}

/// Conformant varying array - size and subset determined at runtime
///
/// Wire format:
/// ```text
/// max_count: u32    # Maximum elements (conformance)
/// offset: u32       # First transmitted element
/// actual_count: u32 # Number of transmitted elements
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformantVaryingArray<T> {
    pub max_count: usize,
    pub offset: usize,
    pub elements: Vec<T>,
}

impl<T> Default for ConformantVaryingArray<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> ConformantVaryingArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            max_count: elements.len(),
            offset: 0,
            elements,
        }
    }

    pub fn with_max(max_count: usize, elements: Vec<T>) -> Self {
        Self {
            max_count,
            offset: 0,
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: NdrEncode> NdrEncode for ConformantVaryingArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let end = self.offset.saturating_add(self.elements.len());
        if end > self.max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count: u32::try_from(self.max_count).unwrap_or(u32::MAX),
                offset: u32::try_from(self.offset).unwrap_or(u32::MAX),
                actual_count: u32::try_from(self.elements.len()).unwrap_or(u32::MAX),
            });
        }
        w.write_size(self.max_count)?;
        w.write_size(self.offset)?;
        w.write_size(self.elements.len())?;
        encode_elements(&self.elements, w)
    }

    fn ndr_align() -> usize {
        4
    }
}

impl<T: NdrDecode> NdrDecode for ConformantVaryingArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let (max_count, offset, actual_count) = read_varying_header(r)?;
        Ok(Self {
            max_count: max_count as usize,
            offset: offset as usize,
            elements: decode_elements(r, actual_count as usize)?,
        })
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_min_size() -> usize {
        12
    }

    fn ndr_resolve(&mut self, r: &mut NdrReader) -> Result<()> {
        resolve_elements(&mut self.elements, r)
    }
}
