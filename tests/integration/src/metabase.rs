//! IIS metabase administration (MS-IMSA) over the dcom call layer
//!
//! Only a handful of operations carry typed descriptors. The rest of the
//! 31 IMSAdminBaseW slots are declared through the method count and answer
//! `E_NOTIMPL`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dcom::{call_params, HResult, InterfaceBuilder, InterfaceDispatcher, OperationDescriptor, Request, Response};
use midl_ndr::{ndr_struct, FixedWString, Guid, NdrWString, UniquePtr};
use parking_lot::RwLock;
use tracing::debug;

/// IID_IMSAdminBase_W
pub const IID_IMSADMINBASEW: Guid = Guid::from_fields(
    0x70b5_1430,
    0xb6ca,
    0x11d0,
    [0xb9, 0xb9, 0x00, 0xa0, 0xc9, 0x22, 0xe7, 0x50],
);

/// IID_IMSAdminBase2_W
pub const IID_IMSADMINBASE2W: Guid = Guid::from_fields(
    0x8298_d101,
    0xf992,
    0x43b7,
    [0x8e, 0xca, 0x50, 0x52, 0xd8, 0x85, 0xb9, 0x95],
);

/// IUnknown plus the 31 IMSAdminBaseW methods
pub const IMSADMINBASEW_METHOD_COUNT: u16 = 34;
/// IMSAdminBaseW plus the six IMSAdminBase2W methods
pub const IMSADMINBASE2W_METHOD_COUNT: u16 = 40;

pub const METADATA_MAX_NAME_LEN: usize = 256;
pub const MD_HISTORY_LOCATION_LEN: usize = 100;
pub const METADATA_MASTER_ROOT_HANDLE: u32 = 0;

pub const ERROR_PATH_NOT_FOUND: u32 = 3;
pub const ERROR_INVALID_HANDLE: u32 = 6;
pub const ERROR_ALREADY_EXISTS: u32 = 183;
pub const ERROR_NO_MORE_ITEMS: u32 = 259;

pub mod opnum {
    pub const ADD_KEY: u16 = 3;
    pub const DELETE_KEY: u16 = 4;
    pub const ENUM_KEYS: u16 = 6;
    pub const GET_SYSTEM_CHANGE_NUMBER: u16 = 22;
    pub const GET_SERVER_GUID: u16 = 33;
    pub const ENUM_HISTORY: u16 = 39;
}

pub type KeyName = FixedWString<METADATA_MAX_NAME_LEN>;
pub type HistoryLocation = FixedWString<MD_HISTORY_LOCATION_LEN>;

/// `AddKey` and `DeleteKey` share their in-parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyPathRequest {
    pub handle: u32,
    pub path: UniquePtr<NdrWString>,
}

call_params!(KeyPathRequest { handle: u32, path: UniquePtr<NdrWString> });

impl KeyPathRequest {
    pub fn new(handle: u32, path: &str) -> Self {
        Self {
            handle,
            path: UniquePtr::new(NdrWString::from(path)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumKeysRequest {
    pub handle: u32,
    pub path: UniquePtr<NdrWString>,
    pub name: KeyName,
    pub enum_index: u32,
}

call_params!(EnumKeysRequest {
    handle: u32,
    path: UniquePtr<NdrWString>,
    name: KeyName,
    enum_index: u32,
});

impl EnumKeysRequest {
    pub fn new(handle: u32, path: &str, enum_index: u32) -> Self {
        Self {
            handle,
            path: UniquePtr::new(NdrWString::from(path)),
            name: KeyName::default(),
            enum_index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumKeysResponse {
    pub name: KeyName,
}

call_params!(EnumKeysResponse { name: KeyName });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetSystemChangeNumberResponse {
    pub system_change_number: u32,
}

call_params!(GetSystemChangeNumberResponse { system_change_number: u32 });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetServerGuidResponse {
    pub server_guid: Guid,
}

call_params!(GetServerGuidResponse { server_guid: Guid });

/// 100-ns intervals since 1601-01-01
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTime {
    pub low_date_time: u32,
    pub high_date_time: u32,
}

ndr_struct!(FileTime { low_date_time: u32, high_date_time: u32 });

impl FileTime {
    pub fn from_u64(value: u64) -> Self {
        Self {
            low_date_time: value as u32,
            high_date_time: (value >> 32) as u32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumHistoryRequest {
    pub location: HistoryLocation,
    pub enum_index: u32,
}

call_params!(EnumHistoryRequest { location: HistoryLocation, enum_index: u32 });

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumHistoryResponse {
    pub location: HistoryLocation,
    pub major_version: u32,
    pub minor_version: u32,
    pub history_time: FileTime,
}

call_params!(EnumHistoryResponse {
    location: HistoryLocation,
    major_version: u32,
    minor_version: u32,
    history_time: FileTime,
});

pub fn add_key() -> OperationDescriptor<KeyPathRequest, ()> {
    OperationDescriptor::new(opnum::ADD_KEY, "/IMSAdminBaseW/v0/AddKey")
}

pub fn delete_key() -> OperationDescriptor<KeyPathRequest, ()> {
    OperationDescriptor::new(opnum::DELETE_KEY, "/IMSAdminBaseW/v0/DeleteKey")
}

pub fn enum_keys() -> OperationDescriptor<EnumKeysRequest, EnumKeysResponse> {
    OperationDescriptor::new(opnum::ENUM_KEYS, "/IMSAdminBaseW/v0/EnumKeys")
}

pub fn get_system_change_number() -> OperationDescriptor<(), GetSystemChangeNumberResponse> {
    OperationDescriptor::new(
        opnum::GET_SYSTEM_CHANGE_NUMBER,
        "/IMSAdminBaseW/v0/GetSystemChangeNumber",
    )
}

pub fn get_server_guid() -> OperationDescriptor<(), GetServerGuidResponse> {
    OperationDescriptor::new(opnum::GET_SERVER_GUID, "/IMSAdminBaseW/v0/R_GetServerGuid")
}

pub fn enum_history() -> OperationDescriptor<EnumHistoryRequest, EnumHistoryResponse> {
    OperationDescriptor::new(opnum::ENUM_HISTORY, "/IMSAdminBase2W/v0/EnumHistory")
}

/// One saved metabase snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub major_version: u32,
    pub minor_version: u32,
    pub time: FileTime,
}

const DEFAULT_HISTORY_LOCATION: &str = "%SystemRoot%\\system32\\inetsrv\\History";

/// In-memory metabase: a key tree addressed from the master root handle
pub struct MetabaseStore {
    server_guid: Guid,
    keys: RwLock<BTreeSet<String>>,
    history: Vec<HistoryEntry>,
    change_number: AtomicU32,
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn win32<P: Default>(code: u32) -> Response<P> {
    Response::with_hresult(P::default(), HResult::from_win32(code))
}

impl MetabaseStore {
    pub fn new(server_guid: Guid) -> Self {
        Self::with_history(server_guid, Vec::new())
    }

    pub fn with_history(server_guid: Guid, history: Vec<HistoryEntry>) -> Self {
        Self {
            server_guid,
            keys: RwLock::new(BTreeSet::new()),
            history,
            change_number: AtomicU32::new(0),
        }
    }

    pub fn server_guid(&self) -> Guid {
        self.server_guid
    }

    pub fn system_change_number(&self) -> u32 {
        self.change_number.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.keys.read().contains(&normalize(path))
    }

    fn resolve(params: &KeyPathRequest) -> Result<String, HResult> {
        if params.handle != METADATA_MASTER_ROOT_HANDLE {
            return Err(HResult::from_win32(ERROR_INVALID_HANDLE));
        }
        let path = params.path.as_ref().ok_or(HResult::E_INVALIDARG)?;
        let path = normalize(path.as_str());
        if path.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }
        Ok(path)
    }

    pub fn add_key(&self, params: &KeyPathRequest) -> Response<()> {
        let path = match Self::resolve(params) {
            Ok(path) => path,
            Err(hresult) => return Response::with_hresult((), hresult),
        };
        let mut keys = self.keys.write();
        if keys.contains(&path) {
            return win32(ERROR_ALREADY_EXISTS);
        }
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            keys.insert(prefix.clone());
        }
        self.change_number.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path, "added key");
        Response::new(())
    }

    pub fn delete_key(&self, params: &KeyPathRequest) -> Response<()> {
        let path = match Self::resolve(params) {
            Ok(path) => path,
            Err(hresult) => return Response::with_hresult((), hresult),
        };
        let mut keys = self.keys.write();
        if !keys.remove(&path) {
            return win32(ERROR_PATH_NOT_FOUND);
        }
        let subtree = format!("{path}/");
        keys.retain(|key| !key.starts_with(&subtree));
        self.change_number.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path, "deleted key");
        Response::new(())
    }

    pub fn enum_keys(&self, params: &EnumKeysRequest) -> Response<EnumKeysResponse> {
        if params.handle != METADATA_MASTER_ROOT_HANDLE {
            return win32(ERROR_INVALID_HANDLE);
        }
        let parent = params
            .path
            .as_ref()
            .map(|path| normalize(path.as_str()))
            .unwrap_or_default();
        let keys = self.keys.read();
        if !parent.is_empty() && !keys.contains(&parent) {
            return win32(ERROR_PATH_NOT_FOUND);
        }
        let prefix = if parent.is_empty() {
            String::new()
        } else {
            format!("{parent}/")
        };
        let child = keys
            .iter()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .nth(params.enum_index as usize);
        match child {
            Some(name) => Response::new(EnumKeysResponse {
                name: KeyName::new(name),
            }),
            None => win32(ERROR_NO_MORE_ITEMS),
        }
    }

    pub fn enum_history(&self, params: &EnumHistoryRequest) -> Response<EnumHistoryResponse> {
        let location = if params.location.as_str().is_empty() {
            HistoryLocation::new(DEFAULT_HISTORY_LOCATION)
        } else {
            params.location.clone()
        };
        match self.history.get(params.enum_index as usize) {
            Some(entry) => Response::new(EnumHistoryResponse {
                location,
                major_version: entry.major_version,
                minor_version: entry.minor_version,
                history_time: entry.time,
            }),
            None => win32(ERROR_NO_MORE_ITEMS),
        }
    }
}

/// IMSAdminBaseW over IUnknown, served by `store`
pub fn admin_base(store: Arc<MetabaseStore>) -> InterfaceBuilder {
    let add = Arc::clone(&store);
    let delete = Arc::clone(&store);
    let enumerate = Arc::clone(&store);
    let changes = Arc::clone(&store);
    InterfaceBuilder::new("IMSAdminBaseW")
        .extends(&dcom::interfaces::iunknown::dispatcher())
        .method_count(IMSADMINBASEW_METHOD_COUNT)
        .operation(add_key(), move |req: Request<KeyPathRequest>| {
            let store = Arc::clone(&add);
            async move { Ok(store.add_key(&req.params)) }
        })
        .operation(delete_key(), move |req: Request<KeyPathRequest>| {
            let store = Arc::clone(&delete);
            async move { Ok(store.delete_key(&req.params)) }
        })
        .operation(enum_keys(), move |req: Request<EnumKeysRequest>| {
            let store = Arc::clone(&enumerate);
            async move { Ok(store.enum_keys(&req.params)) }
        })
        .operation(get_system_change_number(), move |_req: Request<()>| {
            let number = changes.system_change_number();
            async move {
                Ok(Response::new(GetSystemChangeNumberResponse {
                    system_change_number: number,
                }))
            }
        })
        .operation(get_server_guid(), move |_req: Request<()>| {
            let server_guid = store.server_guid();
            async move { Ok(Response::new(GetServerGuidResponse { server_guid })) }
        })
}

/// IMSAdminBase2W: a second level on top of a built IMSAdminBaseW chain
pub fn admin_base2(base: &InterfaceDispatcher, store: Arc<MetabaseStore>) -> InterfaceBuilder {
    InterfaceBuilder::new("IMSAdminBase2W")
        .extends(base)
        .method_count(IMSADMINBASE2W_METHOD_COUNT)
        .operation(enum_history(), move |req: Request<EnumHistoryRequest>| {
            let store = Arc::clone(&store);
            async move { Ok(store.enum_history(&req.params)) }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_enumerate_keys() {
        let store = MetabaseStore::new(Guid::NIL);
        assert!(store.add_key(&KeyPathRequest::new(0, "/LM/W3SVC/1")).is_success());
        assert!(store.contains("LM/W3SVC"));
        assert_eq!(store.system_change_number(), 1);

        let duplicate = store.add_key(&KeyPathRequest::new(0, "LM/W3SVC/1/"));
        assert_eq!(duplicate.hresult.win32_code(), Some(ERROR_ALREADY_EXISTS as u16));

        let first = store.enum_keys(&EnumKeysRequest::new(0, "/LM", 0));
        assert_eq!(first.params.name.as_str(), "W3SVC");
        let past = store.enum_keys(&EnumKeysRequest::new(0, "/LM", 1));
        assert_eq!(past.hresult.win32_code(), Some(ERROR_NO_MORE_ITEMS as u16));
    }

    #[test]
    fn test_delete_removes_subtree() {
        let store = MetabaseStore::new(Guid::NIL);
        store.add_key(&KeyPathRequest::new(0, "/LM/W3SVC/1/ROOT"));
        assert!(store.delete_key(&KeyPathRequest::new(0, "/LM/W3SVC")).is_success());
        assert!(store.contains("/LM"));
        assert!(!store.contains("/LM/W3SVC/1"));

        let missing = store.delete_key(&KeyPathRequest::new(0, "/LM/W3SVC"));
        assert_eq!(missing.hresult, HResult::from_win32(ERROR_PATH_NOT_FOUND));
    }

    #[test]
    fn test_bad_handle_and_null_path() {
        let store = MetabaseStore::new(Guid::NIL);
        let bad_handle = store.add_key(&KeyPathRequest::new(7, "/LM"));
        assert_eq!(bad_handle.hresult, HResult::from_win32(ERROR_INVALID_HANDLE));

        let null_path = store.add_key(&KeyPathRequest::default());
        assert_eq!(null_path.hresult, HResult::E_INVALIDARG);
    }
}
