//! Base interface levels every DCOM interface builds on

pub mod idispatch;
pub mod iunknown;
