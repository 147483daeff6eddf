//! IDispatch base level (MS-OAUT 3.1.4)
//!
//! Opnums 3-6 on top of IUnknown. Only `GetTypeInfoCount` has a typed
//! descriptor; the other three slots answer `E_NOTIMPL` unless an interface
//! built from [`builder`] registers handlers for them.

use crate::call::OperationDescriptor;
use crate::call_params;
use crate::dispatcher::InterfaceBuilder;
use crate::interfaces::iunknown;

/// Opnums owned by IUnknown and IDispatch together
pub const IDISPATCH_METHOD_COUNT: u16 = 7;

pub const OPNUM_GET_TYPE_INFO_COUNT: u16 = 3;
pub const OPNUM_GET_TYPE_INFO: u16 = 4;
pub const OPNUM_GET_IDS_OF_NAMES: u16 = 5;
pub const OPNUM_INVOKE: u16 = 6;

/// `[out] UINT *pctinfo`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTypeInfoCountResponse {
    pub type_info_count: u32,
}

call_params!(GetTypeInfoCountResponse { type_info_count: u32 });

/// `HRESULT GetTypeInfoCount([out] UINT *pctinfo)`
pub fn get_type_info_count() -> OperationDescriptor<(), GetTypeInfoCountResponse> {
    OperationDescriptor::new(OPNUM_GET_TYPE_INFO_COUNT, "/IDispatch/v0/GetTypeInfoCount")
}

/// IDispatch level over IUnknown, ready for handler registration
pub fn builder() -> InterfaceBuilder {
    InterfaceBuilder::new("IDispatch")
        .extends(&iunknown::dispatcher())
        .method_count(IDISPATCH_METHOD_COUNT)
}
