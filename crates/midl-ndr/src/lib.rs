//! NDR (Network Data Representation) runtime library
//!
//! This crate provides the runtime support for MIDL-described interfaces,
//! implementing the NDR 2.0 transfer syntax used by DCE RPC and DCOM.
//!
//! # NDR Wire Format
//!
//! NDR is the standard encoding for DCE RPC data. Key characteristics:
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes), measured
//!   from the start of the stub, with zero padding
//! - Structures align to their largest member
//! - Conformant data carries its element count before the elements
//! - Strings are conformant varying arrays with a null terminator
//! - Unique and full pointers write a referent ID in place; the pointed-to
//!   bodies follow once the enclosing top-level parameter is complete,
//!   first-in first-out
//!
//! # Example
//!
//! ```
//! use midl_ndr::{NdrContext, NdrReader, NdrWString, NdrWriter, UniquePtr};
//!
//! let path = UniquePtr::new(NdrWString::from("/LM/W3SVC"));
//! let mut w = NdrWriter::new(NdrContext::new());
//! w.write_param(&7u32).unwrap();
//! w.write_param(&path).unwrap();
//! let stub = w.finish().unwrap();
//!
//! let mut r = NdrReader::new(stub, NdrContext::new());
//! assert_eq!(r.read_param::<u32>().unwrap(), 7);
//! let path: UniquePtr<NdrWString> = r.read_param().unwrap();
//! assert_eq!(path.as_ref().map(NdrWString::as_str), Some("/LM/W3SVC"));
//! ```

mod macros;

mod arrays;
mod context;
mod decode;
mod encode;
mod error;
mod pointers;
mod primitives;
mod strings;

pub use arrays::{ConformantArray, ConformantVaryingArray, FixedArray, VaryingArray};
pub use context::{NdrContext, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ELEMENTS};
pub use decode::{NdrDecode, NdrReader, Referent};
pub use encode::{NdrEncode, NdrWriter, FIRST_REFERENT_ID, REFERENT_ID_STEP};
pub use error::{NdrError, Result};
pub use pointers::{FullPtr, RefPtr, UniquePtr};
pub use primitives::Guid;
pub use strings::{BStr, FixedWString, FlaggedWordBlob, NdrString, NdrWString, SizedWString};

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};
