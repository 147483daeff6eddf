//! DCOM error types

use midl_ndr::NdrError;
use thiserror::Error;

use super::{HResult, Ipid};

/// Result type for DCOM operations
pub type Result<T> = std::result::Result<T, DcomError>;

/// DCOM-specific errors
///
/// These describe calls that could not complete. A call that completed with
/// a failing return code is reported through [`HResult`] instead, or through
/// [`DcomError::CallFailed`] once the caller has chosen to discard the
/// response body.
#[derive(Error, Debug)]
pub enum DcomError {
    /// Stub could not be encoded or decoded
    #[error("NDR error: {0}")]
    Ndr(#[from] NdrError),

    /// Operation slot exists but has no implementation
    #[error("operation {name} (opnum {opnum}) is not implemented")]
    NotImplemented { opnum: u16, name: &'static str },

    /// Opnum is beyond every level of the interface
    #[error("no operation for opnum {opnum}")]
    NoOperation { opnum: u16 },

    /// Call completed with a failing return code
    #[error("call failed: {0}")]
    CallFailed(HResult),

    /// Interface not found
    #[error("interface not found: IPID {0}")]
    InterfaceNotFound(Ipid),

    /// Interface definition is inconsistent
    #[error("invalid interface definition: {0}")]
    InvalidInterface(String),

    /// Invalid OBJREF format
    #[error("invalid OBJREF: {0}")]
    InvalidObjRef(String),

    /// Transport-side failure reported by a channel
    #[error("channel error: {0}")]
    Channel(String),

    /// Invalid data
    #[error("invalid data: {0}")]
    InvalidData(String),
}
