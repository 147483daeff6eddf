//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use dcom::{InterfaceDispatcher, Ipid, LocalChannel, ObjectClient};
use integration_tests::metabase::{self, HistoryEntry, MetabaseStore};
use midl_ndr::Guid;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a subscriber honoring `RUST_LOG`, once per test binary
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const SERVER_GUID: Guid = Guid::from_fields(
    0x1234_5678,
    0x9abc,
    0xdef0,
    [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
);

pub fn history() -> Vec<HistoryEntry> {
    vec![
        HistoryEntry {
            major_version: 1,
            minor_version: 0,
            time: metabase::FileTime::from_u64(0x01d9_0000_0000_0000),
        },
        HistoryEntry {
            major_version: 2,
            minor_version: 3,
            time: metabase::FileTime::from_u64(0x01da_1234_5678_9abc),
        },
    ]
}

/// IMSAdminBaseW and IMSAdminBase2W chains over one store
pub fn metabase_dispatchers() -> (Arc<MetabaseStore>, InterfaceDispatcher, InterfaceDispatcher) {
    let store = Arc::new(MetabaseStore::with_history(SERVER_GUID, history()));
    let base = metabase::admin_base(Arc::clone(&store))
        .build()
        .expect("IMSAdminBaseW builds");
    let derived = metabase::admin_base2(&base, Arc::clone(&store))
        .build()
        .expect("IMSAdminBase2W builds");
    (store, base, derived)
}

/// A client bound to an IMSAdminBase2W instance behind a local channel
pub fn metabase_client() -> (Arc<MetabaseStore>, ObjectClient<Arc<LocalChannel>>) {
    let (store, _base, derived) = metabase_dispatchers();
    let ipid = Ipid::generate();
    let channel = Arc::new(LocalChannel::new());
    channel.register(ipid, Arc::new(derived));
    (store, ObjectClient::new(channel, ipid))
}
