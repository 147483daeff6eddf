//! DCOM call layer on top of the NDR wire core
//!
//! This crate turns typed operation parameters into ORPC stubs and routes
//! incoming stubs to handlers by opnum, following MS-DCOM. Binding, PDU
//! fragmentation and security belong to the transport behind an
//! [`RpcChannel`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ObjectClient ──► RpcChannel ──► InterfaceDispatcher         │
//! │     (proxy)        (transport)    (IUnknown → Base → Derived)│
//! ├──────────────────────────────────────────────────────────────┤
//! │  OperationDescriptor: ORPCTHIS + [in]  /  ORPCTHAT + [out] + │
//! │                       HRESULT                                │
//! ├──────────────────────────────────────────────────────────────┤
//! │                  NDR wire core (midl-ndr crate)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: ORPC headers, HRESULT, IPID, interface pointers
//! - [`call`]: request/response stubs and operation descriptors
//! - [`dispatcher`]: opnum routing over an interface inheritance chain
//! - [`interfaces`]: the IUnknown and IDispatch base levels

pub mod call;
pub mod dispatcher;
pub mod interfaces;
pub mod types;

mod client;

pub use midl_ndr;

pub use call::{CallFailure, CallParams, OperationDescriptor, PrepareHook, Request, Response};
pub use client::{LocalChannel, ObjectClient, RpcChannel};
pub use dispatcher::{DispatchOutcome, InterfaceBuilder, InterfaceDispatcher, OperationHandler};
pub use types::{
    ComVersion, DcomError, HResult, InterfacePointer, Ipid, OrpcExtent, OrpcExtentArray, OrpcThat,
    OrpcThis, Outcome, Result,
};

/// Protocol version stamped into every outgoing ORPC header
pub const DCOM_VERSION: ComVersion = ComVersion::DCOM_5_7;
