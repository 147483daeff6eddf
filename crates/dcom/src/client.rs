//! Client-side invocation
//!
//! The transport (binding, PDUs, security) lives outside this crate. An
//! [`RpcChannel`] is the seam to it: one request stub out, one response stub
//! back, addressed by IPID and opnum.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::call::{CallParams, OperationDescriptor, Request, Response};
use crate::dispatcher::{DispatchOutcome, InterfaceDispatcher};
use crate::types::{DcomError, Ipid, Result};

/// Carries request stubs to an object and brings back response stubs
#[async_trait]
pub trait RpcChannel: Send + Sync {
    async fn call(&self, ipid: Ipid, opnum: u16, stub: Bytes) -> Result<Bytes>;
}

#[async_trait]
impl<C: RpcChannel + ?Sized> RpcChannel for Arc<C> {
    async fn call(&self, ipid: Ipid, opnum: u16, stub: Bytes) -> Result<Bytes> {
        (**self).call(ipid, opnum, stub).await
    }
}

/// A proxy for one interface instance
pub struct ObjectClient<C> {
    channel: C,
    ipid: Ipid,
}

impl<C: RpcChannel> ObjectClient<C> {
    pub fn new(channel: C, ipid: Ipid) -> Self {
        Self { channel, ipid }
    }

    pub fn ipid(&self) -> Ipid {
        self.ipid
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Invoke with a fresh ORPCTHIS
    pub async fn invoke<Req, Resp>(
        &self,
        descriptor: OperationDescriptor<Req, Resp>,
        params: Req,
    ) -> Result<Response<Resp>>
    where
        Req: CallParams,
        Resp: CallParams,
    {
        self.invoke_with(descriptor, Request::new(params)).await
    }

    /// Invoke with a caller-supplied ORPCTHIS (causality, extensions)
    pub async fn invoke_with<Req, Resp>(
        &self,
        descriptor: OperationDescriptor<Req, Resp>,
        mut request: Request<Req>,
    ) -> Result<Response<Resp>>
    where
        Req: CallParams,
        Resp: CallParams,
    {
        let stub = descriptor.marshal_request(&mut request)?;
        debug!(
            ipid = %self.ipid,
            opnum = descriptor.opnum,
            operation = descriptor.name,
            "invoking"
        );
        let reply = self.channel.call(self.ipid, descriptor.opnum, stub).await?;
        let response = descriptor.unmarshal_response(reply)?;
        if response.hresult.is_failure() {
            debug!(
                operation = descriptor.name,
                hresult = %response.hresult,
                "call returned failure"
            );
        }
        Ok(response)
    }
}

/// In-process channel straight into registered dispatchers
#[derive(Default)]
pub struct LocalChannel {
    objects: RwLock<HashMap<Ipid, Arc<InterfaceDispatcher>>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ipid: Ipid, dispatcher: Arc<InterfaceDispatcher>) {
        self.objects.write().insert(ipid, dispatcher);
    }

    pub fn unregister(&self, ipid: &Ipid) -> Option<Arc<InterfaceDispatcher>> {
        self.objects.write().remove(ipid)
    }
}

#[async_trait]
impl RpcChannel for LocalChannel {
    async fn call(&self, ipid: Ipid, opnum: u16, stub: Bytes) -> Result<Bytes> {
        let dispatcher = self
            .objects
            .read()
            .get(&ipid)
            .cloned()
            .ok_or(DcomError::InterfaceNotFound(ipid))?;
        match dispatcher.dispatch(opnum, stub).await? {
            DispatchOutcome::Completed(reply) => Ok(reply),
            DispatchOutcome::NoOperation => Err(DcomError::NoOperation { opnum }),
        }
    }
}
