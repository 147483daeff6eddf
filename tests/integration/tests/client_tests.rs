//! Client Tests - Typed Calls Through a Local Channel
//!
//! These tests drive the metabase server the way a proxy would:
//! - Typed invocations and their return codes
//! - Enumeration until ERROR_NO_MORE_ITEMS
//! - Failures that still carry decoded out-parameters
//! - Many clients sharing one channel

mod common;

use std::sync::Arc;

use futures::future::join_all;

use common::*;
use dcom::{
    DcomError, HResult, Ipid, LocalChannel, ObjectClient, OperationDescriptor, OrpcExtent,
    OrpcThis, Request, RpcChannel,
};
use integration_tests::metabase::{
    self, EnumHistoryRequest, EnumKeysRequest, HistoryLocation, KeyPathRequest,
    ERROR_ALREADY_EXISTS, ERROR_NO_MORE_ITEMS, ERROR_PATH_NOT_FOUND,
};
use midl_ndr::Guid;

async fn enumerate<C: RpcChannel>(client: &ObjectClient<C>, path: &str) -> Vec<String> {
    let mut names = Vec::new();
    for index in 0.. {
        let response = client
            .invoke(metabase::enum_keys(), EnumKeysRequest::new(0, path, index))
            .await
            .unwrap();
        if response.hresult == HResult::from_win32(ERROR_NO_MORE_ITEMS) {
            break;
        }
        assert!(response.is_success(), "EnumKeys failed: {}", response.hresult);
        names.push(response.params.name.as_str().to_string());
    }
    names
}

#[tokio::test]
async fn test_add_and_enumerate() {
    init_logging();
    let (store, client) = metabase_client();

    for path in ["/LM/W3SVC/1", "/LM/W3SVC/2", "/LM/MSFTPSVC"] {
        let response = client
            .invoke(metabase::add_key(), KeyPathRequest::new(0, path))
            .await
            .unwrap();
        assert_eq!(response.hresult, HResult::S_OK);
    }

    assert_eq!(enumerate(&client, "/LM").await, vec!["MSFTPSVC", "W3SVC"]);
    assert_eq!(enumerate(&client, "/LM/W3SVC").await, vec!["1", "2"]);
    assert_eq!(enumerate(&client, "").await, vec!["LM"]);

    let changes = client
        .invoke(metabase::get_system_change_number(), ())
        .await
        .unwrap();
    assert_eq!(changes.params.system_change_number, 3);
    assert_eq!(store.system_change_number(), 3);
}

#[tokio::test]
async fn test_failures_keep_out_parameters() {
    init_logging();
    let (_store, client) = metabase_client();

    client
        .invoke(metabase::add_key(), KeyPathRequest::new(0, "/LM"))
        .await
        .unwrap();
    let again = client
        .invoke(metabase::add_key(), KeyPathRequest::new(0, "/LM"))
        .await
        .unwrap();
    let failure = again.into_result().unwrap_err();
    assert_eq!(failure.hresult.win32_code(), Some(ERROR_ALREADY_EXISTS as u16));

    let missing = client
        .invoke(metabase::enum_keys(), EnumKeysRequest::new(0, "/LM/Nowhere", 0))
        .await
        .unwrap();
    assert_eq!(missing.hresult, HResult::from_win32(ERROR_PATH_NOT_FOUND));
    assert_eq!(missing.params.name.as_str(), "");

    let err: DcomError = missing.into_result().unwrap_err().into();
    assert!(matches!(err, DcomError::CallFailed(_)));
}

#[tokio::test]
async fn test_history_and_server_guid() {
    init_logging();
    let (_store, client) = metabase_client();

    let guid = client.invoke(metabase::get_server_guid(), ()).await.unwrap();
    assert_eq!(guid.params.server_guid, SERVER_GUID);

    let request = EnumHistoryRequest {
        location: HistoryLocation::new("D:\\History"),
        enum_index: 0,
    };
    let first = client.invoke(metabase::enum_history(), request).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.params.location.as_str(), "D:\\History");
    assert_eq!(first.params.history_time, history()[0].time);

    let past = client
        .invoke(
            metabase::enum_history(),
            EnumHistoryRequest {
                enum_index: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(past.hresult.win32_code(), Some(ERROR_NO_MORE_ITEMS as u16));
}

#[tokio::test]
async fn test_request_with_extensions() {
    init_logging();
    let (_store, client) = metabase_client();

    let causality = Guid::new_v4();
    let this = OrpcThis::with_causality(causality)
        .with_extensions(vec![OrpcExtent::new(Guid::new_v4(), vec![1, 2, 3])])
        .unwrap();
    let request = Request {
        this,
        params: KeyPathRequest::new(0, "/LM/W3SVC"),
    };
    let response = client.invoke_with(metabase::add_key(), request).await.unwrap();
    assert_eq!(response.hresult, HResult::S_OK);
}

#[tokio::test]
async fn test_channel_errors() {
    init_logging();
    let (_store, client) = metabase_client();

    let beyond = OperationDescriptor::<(), ()>::new(40, "/IMSAdminBase3W/v0/GetChildPaths");
    let err = client.invoke(beyond, ()).await.unwrap_err();
    assert!(matches!(err, DcomError::NoOperation { opnum: 40 }));

    let stranger = ObjectClient::new(Arc::clone(client.channel()), Ipid::generate());
    let err = stranger.invoke(metabase::get_server_guid(), ()).await.unwrap_err();
    assert!(matches!(err, DcomError::InterfaceNotFound(_)));

    assert!(client.channel().unregister(&client.ipid()).is_some());
    let err = client.invoke(metabase::get_server_guid(), ()).await.unwrap_err();
    assert!(matches!(err, DcomError::InterfaceNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_clients_one_channel() {
    init_logging();
    const CLIENTS: usize = 16;
    const KEYS_PER_CLIENT: usize = 8;

    let (store, _base, derived) = metabase_dispatchers();
    let ipid = Ipid::generate();
    let channel = Arc::new(LocalChannel::new());
    channel.register(ipid, Arc::new(derived));

    let clients = (0..CLIENTS).map(|c| {
        let client = ObjectClient::new(Arc::clone(&channel), ipid);
        async move {
            for k in 0..KEYS_PER_CLIENT {
                let path = format!("/LM/Client{c}/Key{k}");
                let response = client
                    .invoke(metabase::add_key(), KeyPathRequest::new(0, &path))
                    .await?;
                assert_eq!(response.hresult, HResult::S_OK, "{path}");
            }
            Ok::<_, DcomError>(enumerate(&client, &format!("/LM/Client{c}")).await.len())
        }
    });

    for count in join_all(clients).await {
        assert_eq!(count.unwrap(), KEYS_PER_CLIENT);
    }
    assert_eq!(store.system_change_number() as usize, CLIENTS * KEYS_PER_CLIENT);
}
