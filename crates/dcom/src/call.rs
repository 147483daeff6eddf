//! ORPC call codec
//!
//! A request stub is an ORPCTHIS followed by the `[in]` parameters in IDL
//! order. A response stub is an ORPCTHAT, the `[out]` parameters in IDL order
//! and the return code last. Each parameter is a top-level NDR parameter: its
//! deferred pointer bodies are written right after it.
//!
//! An [`OperationDescriptor`] ties an opnum to the parameter types of both
//! directions. Descriptors are plain `Copy` values made fresh for every call.

use std::fmt;

use bytes::Bytes;
use midl_ndr::{NdrContext, NdrReader, NdrWriter};
use tracing::trace;

use crate::types::{DcomError, HResult, OrpcThat, OrpcThis, Result};

/// The parameters one direction of a call carries after its ORPC header
pub trait CallParams: Sized + Default + Send + 'static {
    /// Write every parameter, each followed by its deferred bodies
    fn marshal<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()>;

    /// Read every parameter, draining and resolving after each one
    fn unmarshal(r: &mut NdrReader) -> midl_ndr::Result<Self>;
}

impl CallParams for () {
    fn marshal<'a>(&'a self, _w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        Ok(())
    }

    fn unmarshal(_r: &mut NdrReader) -> midl_ndr::Result<Self> {
        Ok(())
    }
}

/// Implement [`CallParams`] for a struct whose fields are the parameters of
/// one call direction, in IDL order.
///
/// ```
/// use dcom::call_params;
/// use dcom::midl_ndr::{NdrWString, UniquePtr};
///
/// #[derive(Debug, Default)]
/// struct AddKeyRequest {
///     handle: u32,
///     path: UniquePtr<NdrWString>,
/// }
///
/// call_params!(AddKeyRequest { handle: u32, path: UniquePtr<NdrWString> });
/// ```
#[macro_export]
macro_rules! call_params {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::CallParams for $name {
            fn marshal<'a>(
                &'a self,
                w: &mut $crate::midl_ndr::NdrWriter<'a>,
            ) -> $crate::midl_ndr::Result<()> {
                $( w.write_param(&self.$field)?; )*
                Ok(())
            }

            fn unmarshal(r: &mut $crate::midl_ndr::NdrReader) -> $crate::midl_ndr::Result<Self> {
                Ok(Self {
                    $( $field: r.read_param::<$ty>()?, )*
                })
            }
        }
    };
}

/// An incoming or outgoing ORPC request
#[derive(Debug, Clone, Default)]
pub struct Request<P> {
    pub this: OrpcThis,
    pub params: P,
}

impl<P> Request<P> {
    /// Request with a fresh ORPCTHIS
    pub fn new(params: P) -> Self {
        Self {
            this: OrpcThis::new(),
            params,
        }
    }
}

/// An ORPC response: out-parameters plus the return code
#[derive(Debug, Clone, Default)]
pub struct Response<P> {
    pub that: OrpcThat,
    pub params: P,
    pub hresult: HResult,
}

impl<P> Response<P> {
    /// Successful response
    pub fn new(params: P) -> Self {
        Self::with_hresult(params, HResult::S_OK)
    }

    pub fn with_hresult(params: P, hresult: HResult) -> Self {
        Self {
            that: OrpcThat::new(),
            params,
            hresult,
        }
    }

    pub fn is_success(&self) -> bool {
        self.hresult.is_success()
    }

    /// Split on the return code; failures keep the decoded out-parameters
    pub fn into_result(self) -> std::result::Result<P, CallFailure<P>> {
        if self.hresult.is_failure() {
            Err(CallFailure {
                hresult: self.hresult,
                partial: self.params,
            })
        } else {
            Ok(self.params)
        }
    }
}

impl<P: Default> Response<P> {
    /// Default body with `E_NOTIMPL`
    pub fn not_implemented() -> Self {
        Self::with_hresult(P::default(), HResult::E_NOTIMPL)
    }
}

/// A completed call whose return code is a failure
#[derive(Debug, Clone)]
pub struct CallFailure<P> {
    pub hresult: HResult,
    /// Out-parameters as the server sent them
    pub partial: P,
}

impl<P> fmt::Display for CallFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call failed: {}", self.hresult)
    }
}

impl<P: fmt::Debug> std::error::Error for CallFailure<P> {}

impl<P> From<CallFailure<P>> for DcomError {
    fn from(failure: CallFailure<P>) -> Self {
        DcomError::CallFailed(failure.hresult)
    }
}

/// Hook run on a parameter set right before it is marshaled
pub type PrepareHook<P> = fn(&mut P) -> Result<()>;

fn no_prepare<P>(_params: &mut P) -> Result<()> {
    Ok(())
}

/// Codec for one operation of an interface
///
/// `name` is the qualified operation name, e.g.
/// `/IDispatch/v0/GetTypeInfoCount`.
pub struct OperationDescriptor<Req, Resp> {
    pub opnum: u16,
    pub name: &'static str,
    pub prepare_request: PrepareHook<Req>,
    pub prepare_response: PrepareHook<Resp>,
    pub context: NdrContext,
}

impl<Req, Resp> Clone for OperationDescriptor<Req, Resp> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Resp> Copy for OperationDescriptor<Req, Resp> {}

impl<Req, Resp> fmt::Debug for OperationDescriptor<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("opnum", &self.opnum)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<Req, Resp> OperationDescriptor<Req, Resp> {
    /// Descriptor with no-op prepare hooks and the default context
    pub const fn new(opnum: u16, name: &'static str) -> Self {
        Self {
            opnum,
            name,
            prepare_request: no_prepare::<Req>,
            prepare_response: no_prepare::<Resp>,
            context: NdrContext::new(),
        }
    }

    pub const fn with_request_hook(mut self, hook: PrepareHook<Req>) -> Self {
        self.prepare_request = hook;
        self
    }

    pub const fn with_response_hook(mut self, hook: PrepareHook<Resp>) -> Self {
        self.prepare_response = hook;
        self
    }

    pub const fn with_context(mut self, context: NdrContext) -> Self {
        self.context = context;
        self
    }
}

impl<Req: CallParams, Resp: CallParams> OperationDescriptor<Req, Resp> {
    /// ORPCTHIS, then the in-parameters
    pub fn marshal_request(&self, request: &mut Request<Req>) -> Result<Bytes> {
        (self.prepare_request)(&mut request.params)?;
        let request: &Request<Req> = request;
        let mut w = NdrWriter::new(self.context);
        w.write_param(&request.this)?;
        request.params.marshal(&mut w)?;
        let stub = w.finish()?;
        trace!(opnum = self.opnum, name = self.name, len = stub.len(), "marshaled request");
        Ok(stub)
    }

    pub fn unmarshal_request(&self, stub: Bytes) -> Result<Request<Req>> {
        trace!(opnum = self.opnum, name = self.name, len = stub.len(), "unmarshaling request");
        let mut r = NdrReader::new(stub, self.context);
        let this = r.read_param::<OrpcThis>()?;
        let params = Req::unmarshal(&mut r)?;
        Ok(Request { this, params })
    }

    /// ORPCTHAT, then the out-parameters, then the return code
    pub fn marshal_response(&self, response: &mut Response<Resp>) -> Result<Bytes> {
        (self.prepare_response)(&mut response.params)?;
        let response: &Response<Resp> = response;
        let mut w = NdrWriter::new(self.context);
        w.write_param(&response.that)?;
        response.params.marshal(&mut w)?;
        w.write_param(&response.hresult)?;
        let stub = w.finish()?;
        trace!(
            opnum = self.opnum,
            name = self.name,
            hresult = %response.hresult,
            len = stub.len(),
            "marshaled response"
        );
        Ok(stub)
    }

    pub fn unmarshal_response(&self, stub: Bytes) -> Result<Response<Resp>> {
        trace!(opnum = self.opnum, name = self.name, len = stub.len(), "unmarshaling response");
        let mut r = NdrReader::new(stub, self.context);
        let that = r.read_param::<OrpcThat>()?;
        let params = Resp::unmarshal(&mut r)?;
        let hresult = r.read_param::<HResult>()?;
        Ok(Response {
            that,
            params,
            hresult,
        })
    }
}
