//! Shared fixtures for the cross-crate tests
//!
//! [`metabase`] defines an IIS metabase administration interface
//! (IMSAdminBaseW, MS-IMSA) on top of IUnknown, its IMSAdminBase2W
//! extension, and an in-memory server behind both. The tests under `tests/`
//! drive it through the call codec, the dispatcher and a local channel.
//!
//! Run with logging:
//! ```text
//! RUST_LOG=debug cargo test -p integration-tests
//! ```

pub mod metabase;
