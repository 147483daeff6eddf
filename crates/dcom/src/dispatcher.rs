//! Opnum dispatch with single-chain interface inheritance
//!
//! A DCOM interface numbers its methods after those of the interface it
//! extends: IUnknown owns opnums 0-2, IDispatch 3-6, and a derived interface
//! starts where its base stops. An [`InterfaceDispatcher`] is the ordered
//! chain of those levels. An opnum belongs to the first level whose upper
//! bound exceeds it; anything past the last level is "no operation".
//!
//! ```text
//!   opnum   0   1   2 | 3 ... 33 | 34 ... 39 | 40 ...
//!         [ IUnknown ] [ Base    ] [ Derived ]  no operation
//! ```
//!
//! Routing is stateless; a dispatcher is shared behind an `Arc` and serves
//! any number of concurrent calls.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, trace, warn};

use crate::call::{CallParams, OperationDescriptor, Request, Response};
use crate::types::{DcomError, Result};

/// Erased handler: request stub in, response stub out
pub type OperationHandler = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<Bytes>> + Send + Sync>;

#[derive(Clone)]
enum OperationSlot {
    Implemented {
        name: &'static str,
        handler: OperationHandler,
    },
    /// Answers with `E_NOTIMPL`
    Unimplemented { handler: OperationHandler },
    /// Opnum exists in the vtable but never travels on the wire
    Reserved,
}

impl fmt::Debug for OperationSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implemented { name, .. } => write!(f, "Implemented({name})"),
            Self::Unimplemented { .. } => f.write_str("Unimplemented"),
            Self::Reserved => f.write_str("Reserved"),
        }
    }
}

/// The methods one interface adds on top of its base
#[derive(Debug)]
pub struct InterfaceLevel {
    name: &'static str,
    first_opnum: u16,
    slots: Vec<OperationSlot>,
}

impl InterfaceLevel {
    pub(crate) fn reserved(name: &'static str, first_opnum: u16, count: u16) -> Self {
        Self {
            name,
            first_opnum,
            slots: vec![OperationSlot::Reserved; usize::from(count)],
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn first_opnum(&self) -> u16 {
        self.first_opnum
    }

    /// One past the highest opnum this level owns
    pub fn upper_bound(&self) -> u16 {
        self.first_opnum
            .saturating_add(u16::try_from(self.slots.len()).unwrap_or(u16::MAX))
    }

    fn slot(&self, opnum: u16) -> Option<&OperationSlot> {
        self.slots.get(usize::from(opnum.checked_sub(self.first_opnum)?))
    }
}

/// Result of routing one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Response stub to send back
    Completed(Bytes),
    /// The opnum names no operation of this interface
    NoOperation,
}

/// An interface's inheritance chain, base first
#[derive(Clone)]
pub struct InterfaceDispatcher {
    name: &'static str,
    chain: Vec<Arc<InterfaceLevel>>,
}

impl fmt::Debug for InterfaceDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDispatcher")
            .field("name", &self.name)
            .field("levels", &self.levels().collect::<Vec<_>>())
            .finish()
    }
}

impl InterfaceDispatcher {
    pub(crate) fn root(level: InterfaceLevel) -> Self {
        Self {
            name: level.name,
            chain: vec![Arc::new(level)],
        }
    }

    /// Name of the most derived interface
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of opnums, base levels included
    pub fn method_count(&self) -> u16 {
        self.chain.last().map_or(0, |level| level.upper_bound())
    }

    /// `(name, upper_bound)` for every level, base first
    pub fn levels(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.chain
            .iter()
            .map(|level| (level.name, level.upper_bound()))
    }

    /// Level that owns `opnum`
    pub fn level_for(&self, opnum: u16) -> Option<&InterfaceLevel> {
        self.chain
            .iter()
            .find(|level| opnum < level.upper_bound())
            .map(Arc::as_ref)
    }

    /// Route one call.
    ///
    /// Base levels receive the stub untouched. A structural failure while
    /// decoding the request or encoding the response comes back as `Err`.
    pub async fn dispatch(&self, opnum: u16, stub: Bytes) -> Result<DispatchOutcome> {
        let Some(level) = self.level_for(opnum) else {
            debug!(interface = self.name, opnum, "opnum beyond interface");
            return Ok(DispatchOutcome::NoOperation);
        };

        let handler = match level.slot(opnum) {
            Some(OperationSlot::Implemented { name, handler }) => {
                trace!(
                    interface = self.name,
                    level = level.name,
                    opnum,
                    operation = *name,
                    "dispatching"
                );
                handler
            }
            Some(OperationSlot::Unimplemented { handler }) => {
                debug!(interface = self.name, level = level.name, opnum, "operation not implemented");
                handler
            }
            Some(OperationSlot::Reserved) | None => {
                debug!(interface = self.name, level = level.name, opnum, "reserved opnum");
                return Ok(DispatchOutcome::NoOperation);
            }
        };

        match handler(stub).await {
            Ok(response) => Ok(DispatchOutcome::Completed(response)),
            Err(e) => {
                warn!(
                    interface = self.name,
                    level = level.name,
                    opnum,
                    error = %e,
                    "call could not complete"
                );
                Err(e)
            }
        }
    }
}

fn typed_handler<Req, Resp, F, Fut>(descriptor: OperationDescriptor<Req, Resp>, handler: F) -> OperationHandler
where
    Req: CallParams,
    Resp: CallParams,
    F: Fn(Request<Req>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Resp>>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |stub: Bytes| {
        let handler = Arc::clone(&handler);
        async move {
            let request = descriptor.unmarshal_request(stub)?;
            let mut response = match handler(request).await {
                Ok(response) => response,
                Err(DcomError::NotImplemented { .. }) => Response::not_implemented(),
                Err(e) => return Err(e),
            };
            descriptor.marshal_response(&mut response)
        }
        .boxed()
    })
}

fn not_implemented_handler<Req, Resp>(descriptor: OperationDescriptor<Req, Resp>) -> OperationHandler
where
    Req: CallParams,
    Resp: CallParams,
{
    Arc::new(move |_stub: Bytes| {
        let stub = descriptor.marshal_response(&mut Response::not_implemented());
        futures::future::ready(stub).boxed()
    })
}

/// Builder for one interface level on top of an optional base
pub struct InterfaceBuilder {
    name: &'static str,
    base: Vec<Arc<InterfaceLevel>>,
    first_opnum: u16,
    method_count: Option<u16>,
    slots: BTreeMap<u16, OperationSlot>,
    errors: Vec<String>,
}

impl InterfaceBuilder {
    /// A root interface; its first opnum is 0
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            base: Vec::new(),
            first_opnum: 0,
            method_count: None,
            slots: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Inherit `base`; local opnums start at its method count
    pub fn extends(mut self, base: &InterfaceDispatcher) -> Self {
        self.base = base.chain.clone();
        self.first_opnum = base.method_count();
        self
    }

    /// Total method count including the base. Declared opnums without a
    /// handler answer `E_NOTIMPL`.
    pub fn method_count(mut self, count: u16) -> Self {
        self.method_count = Some(count);
        self
    }

    /// Register a typed handler.
    ///
    /// A handler that fails with [`DcomError::NotImplemented`] answers with
    /// the default response body and `E_NOTIMPL`.
    pub fn operation<Req, Resp, F, Fut>(
        self,
        descriptor: OperationDescriptor<Req, Resp>,
        handler: F,
    ) -> Self
    where
        Req: CallParams,
        Resp: CallParams,
        F: Fn(Request<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Resp>>> + Send + 'static,
    {
        let slot = OperationSlot::Implemented {
            name: descriptor.name,
            handler: typed_handler(descriptor, handler),
        };
        self.slot(descriptor.opnum, slot)
    }

    /// Declare an operation that answers its default body with `E_NOTIMPL`
    pub fn unimplemented<Req, Resp>(self, descriptor: OperationDescriptor<Req, Resp>) -> Self
    where
        Req: CallParams,
        Resp: CallParams,
    {
        let slot = OperationSlot::Unimplemented {
            handler: not_implemented_handler(descriptor),
        };
        self.slot(descriptor.opnum, slot)
    }

    /// Declare an opnum that is not used on the wire
    pub fn reserved(self, opnum: u16) -> Self {
        self.slot(opnum, OperationSlot::Reserved)
    }

    fn slot(mut self, opnum: u16, slot: OperationSlot) -> Self {
        if opnum < self.first_opnum {
            self.errors.push(format!(
                "opnum {opnum} belongs to a base interface (local opnums start at {})",
                self.first_opnum
            ));
        } else if self.slots.insert(opnum, slot).is_some() {
            self.errors.push(format!("opnum {opnum} registered twice"));
        }
        self
    }

    pub fn build(self) -> Result<InterfaceDispatcher> {
        let mut errors = self.errors;
        let highest = self.slots.keys().next_back().map(|opnum| opnum.saturating_add(1));
        let upper_bound = match (self.method_count, highest) {
            (Some(count), Some(highest)) if highest > count => {
                errors.push(format!("opnum {} is past the method count {count}", highest - 1));
                count
            }
            (Some(count), _) => count,
            (None, Some(highest)) => highest,
            (None, None) => self.first_opnum,
        };
        if upper_bound < self.first_opnum {
            errors.push(format!(
                "method count {upper_bound} is below the base's {}",
                self.first_opnum
            ));
        }
        if !errors.is_empty() {
            return Err(DcomError::InvalidInterface(format!(
                "{}: {}",
                self.name,
                errors.join("; ")
            )));
        }

        let mut slots = self.slots;
        let level = InterfaceLevel {
            name: self.name,
            first_opnum: self.first_opnum,
            slots: (self.first_opnum..upper_bound)
                .map(|opnum| {
                    slots.remove(&opnum).unwrap_or_else(|| OperationSlot::Unimplemented {
                        handler: not_implemented_handler(OperationDescriptor::<(), ()>::new(
                            opnum, "",
                        )),
                    })
                })
                .collect(),
        };
        debug!(
            interface = self.name,
            first_opnum = level.first_opnum,
            upper_bound = level.upper_bound(),
            "built interface level"
        );

        let mut chain = self.base;
        chain.push(Arc::new(level));
        Ok(InterfaceDispatcher {
            name: self.name,
            chain,
        })
    }
}
