//! Core DCOM types (MS-DCOM 2.2)
//!
//! This module contains the data structures every ORPC call carries:
//! - ORPC headers: ORPCTHIS, ORPCTHAT and their extensions
//! - Return codes: HRESULT
//! - Identifiers: IPID
//! - Interface pointers: MInterfacePointer

mod error;
mod hresult;
mod identifiers;
mod interface_pointer;
mod orpc;

pub use error::*;
pub use hresult::{HResult, Outcome, FACILITY_ITF, FACILITY_WIN32};
pub use identifiers::Ipid;
pub use interface_pointer::{InterfacePointer, OBJREF_SIGNATURE};
pub use orpc::*;

/// Well-known interface identifiers
pub mod iid {
    use midl_ndr::Guid;

    const OLE_NODE: [u8; 8] = [0xc0, 0, 0, 0, 0, 0, 0, 0x46];

    /// IUnknown
    pub const IUNKNOWN: Guid = Guid::from_fields(0x0000_0000, 0, 0, OLE_NODE);
    /// IDispatch
    pub const IDISPATCH: Guid = Guid::from_fields(0x0002_0400, 0, 0, OLE_NODE);
}
