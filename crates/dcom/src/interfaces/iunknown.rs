//! IUnknown base level
//!
//! `QueryInterface`, `AddRef` and `Release` never cross the wire as opnums
//! 0-2; remote reference counting goes through IRemUnknown instead. Every
//! DCOM interface still reserves those three slots.

use crate::dispatcher::{InterfaceDispatcher, InterfaceLevel};

/// Opnums owned by IUnknown
pub const IUNKNOWN_METHOD_COUNT: u16 = 3;

/// The IUnknown chain: three reserved slots
pub fn dispatcher() -> InterfaceDispatcher {
    InterfaceDispatcher::root(InterfaceLevel::reserved("IUnknown", 0, IUNKNOWN_METHOD_COUNT))
}
