//! Handler registry: dispatch paths mapped to handler descriptions
//!
//! Handlers are supplied by [`Controller`]s. Each controller contributes a list
//! of [`MethodSpec`]s, and each method is reachable under the path
//! `<controller name>.<method name>`. A refresh rebuilds the whole mapping and
//! swaps it in at once, so concurrent lookups see either the old generation or
//! the new one in full.

use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use ras_wsrpc_types::{ConnectionHandle, Identity, Result, RpcFailure, RpcRequest, WsRpcError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Decoder turning a request payload into a boxed value of the declared type
pub type PayloadDecoder =
    fn(&serde_json::Value) -> std::result::Result<Box<dyn Any + Send>, serde_json::Error>;

/// Declared payload type of a handler parameter
#[derive(Clone, Copy)]
pub struct PayloadSpec {
    type_name: &'static str,
    decode: PayloadDecoder,
}

impl PayloadSpec {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Decode a payload into the declared type
    pub fn decode(
        &self,
        data: &serde_json::Value,
    ) -> std::result::Result<Box<dyn Any + Send>, serde_json::Error> {
        (self.decode)(data)
    }
}

impl fmt::Debug for PayloadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadSpec").field(&self.type_name).finish()
    }
}

fn decode_as<T: DeserializeOwned + Send + 'static>(
    data: &serde_json::Value,
) -> std::result::Result<Box<dyn Any + Send>, serde_json::Error> {
    T::deserialize(data).map(|value| Box::new(value) as Box<dyn Any + Send>)
}

/// What a handler parameter is filled with
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    /// The connection the request arrived on
    Connection,
    /// The decoded request envelope
    RawRequest,
    /// The identity bound to the connection, if any
    Identity,
    /// The request payload decoded into a declared type
    Payload(PayloadSpec),
}

impl ParamKind {
    /// Payload parameter decoded into `T`
    pub fn payload<T: DeserializeOwned + Send + 'static>() -> Self {
        Self::Payload(PayloadSpec {
            type_name: std::any::type_name::<T>(),
            decode: decode_as::<T>,
        })
    }

    fn label(&self) -> &'static str {
        match self {
            ParamKind::Connection => "connection",
            ParamKind::RawRequest => "request",
            ParamKind::Identity => "identity",
            ParamKind::Payload(spec) => spec.type_name,
        }
    }
}

/// Declared return kind of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// The handler produces a value sent back as `data`
    Value,
    /// The handler produces nothing; the reply carries no `data`
    Void,
}

/// A resolved argument value
pub enum Argument {
    Connection(ConnectionHandle),
    RawRequest(RpcRequest),
    Identity(Option<Identity>),
    Payload(Box<dyn Any + Send>),
}

impl Argument {
    fn label(&self) -> &'static str {
        match self {
            Argument::Connection(_) => "connection",
            Argument::RawRequest(_) => "request",
            Argument::Identity(_) => "identity",
            Argument::Payload(_) => "payload",
        }
    }
}

/// Arguments resolved for one invocation, in declared order
///
/// Handlers take them front to back with the typed accessors; asking for a
/// kind other than the one declared at that position is an argument
/// resolution error.
pub struct Arguments {
    path: String,
    values: VecDeque<Argument>,
}

impl Arguments {
    pub fn new(path: impl Into<String>, values: Vec<Argument>) -> Self {
        Self {
            path: path.into(),
            values: values.into(),
        }
    }

    /// Dispatch path these arguments were resolved for
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of arguments not yet taken
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn next(&mut self, expected: &str) -> Result<Argument> {
        self.values.pop_front().ok_or_else(|| {
            WsRpcError::argument(&self.path, format!("missing {expected} argument"))
        })
    }

    fn mismatch(&self, expected: &str, found: &Argument) -> WsRpcError {
        WsRpcError::argument(
            &self.path,
            format!("expected {expected} argument, found {}", found.label()),
        )
    }

    /// Take the connection argument
    pub fn connection(&mut self) -> Result<ConnectionHandle> {
        match self.next("connection")? {
            Argument::Connection(conn) => Ok(conn),
            other => Err(self.mismatch("connection", &other)),
        }
    }

    /// Take the raw request argument
    pub fn request(&mut self) -> Result<RpcRequest> {
        match self.next("request")? {
            Argument::RawRequest(request) => Ok(request),
            other => Err(self.mismatch("request", &other)),
        }
    }

    /// Take the identity argument
    pub fn identity(&mut self) -> Result<Option<Identity>> {
        match self.next("identity")? {
            Argument::Identity(identity) => Ok(identity),
            other => Err(self.mismatch("identity", &other)),
        }
    }

    /// Take the payload argument as `T`
    pub fn payload<T: 'static>(&mut self) -> Result<T> {
        let expected = std::any::type_name::<T>();
        match self.next(expected)? {
            Argument::Payload(value) => value.downcast::<T>().map(|v| *v).map_err(|_| {
                WsRpcError::argument(&self.path, format!("payload is not a {expected}"))
            }),
            other => Err(self.mismatch(expected, &other)),
        }
    }
}

/// Value produced by a successful handler call
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(serde_json::Value),
    Void,
}

impl Reply {
    /// Serialize a handler result into a reply
    pub fn value<T: Serialize>(value: T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Reply::Value)
            .map_err(|e| WsRpcError::Encode(e.to_string()))
    }

    pub fn into_data(self) -> Option<serde_json::Value> {
        match self {
            Reply::Value(value) => Some(value),
            Reply::Void => None,
        }
    }
}

/// Why an invocation did not produce a reply
#[derive(Debug)]
pub enum InvocationError {
    /// The handler's own logic failed; reported to the caller
    Failure(RpcFailure),
    /// Arguments or invocation mechanics failed; logged only
    Dispatch(WsRpcError),
}

impl InvocationError {
    /// Handler failure with a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(RpcFailure::new(message))
    }
}

impl From<RpcFailure> for InvocationError {
    fn from(failure: RpcFailure) -> Self {
        Self::Failure(failure)
    }
}

impl From<WsRpcError> for InvocationError {
    fn from(error: WsRpcError) -> Self {
        Self::Dispatch(error)
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::Failure(failure) => write!(f, "handler failed: {}", failure),
            InvocationError::Dispatch(error) => write!(f, "{}", error),
        }
    }
}

/// Outcome of a handler call
pub type InvocationResult = std::result::Result<Reply, InvocationError>;

/// Type-erased handler function
pub type HandlerFn = Arc<dyn Fn(Arguments) -> BoxFuture<'static, InvocationResult> + Send + Sync>;

/// One callable method contributed by a controller
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    params: Vec<ParamKind>,
    returns: ReturnKind,
    handler: HandlerFn,
}

impl MethodSpec {
    /// Create a method from a handler returning a [`Reply`]
    pub fn new<F, Fut>(
        name: impl Into<String>,
        params: Vec<ParamKind>,
        returns: ReturnKind,
        handler: F,
    ) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvocationResult> + Send + 'static,
    {
        let handler: HandlerFn =
            Arc::new(move |args| -> BoxFuture<'static, InvocationResult> {
                Box::pin(handler(args))
            });
        Self {
            name: name.into(),
            params,
            returns,
            handler,
        }
    }

    /// Create a method whose result is serialized into the reply
    pub fn value<F, Fut, T>(name: impl Into<String>, params: Vec<ParamKind>, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, InvocationError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, params, ReturnKind::Value, move |args| {
            let handler = handler.clone();
            async move {
                let value = handler(args).await?;
                let reply: InvocationResult = Reply::value(value).map_err(InvocationError::from);
                reply
            }
        })
    }

    /// Create a method that returns nothing
    pub fn void<F, Fut>(name: impl Into<String>, params: Vec<ParamKind>, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), InvocationError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, params, ReturnKind::Void, move |args| {
            let handler = handler.clone();
            async move {
                handler(args).await?;
                Ok::<_, InvocationError>(Reply::Void)
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A registered handler, resolved by path
pub struct HandlerDescriptor {
    path: String,
    params: Vec<ParamKind>,
    returns: ReturnKind,
    handler: HandlerFn,
}

impl HandlerDescriptor {
    fn from_method(controller: &str, method: MethodSpec) -> Self {
        Self {
            path: format!("{}.{}", controller, method.name),
            params: method.params,
            returns: method.returns,
            handler: method.handler,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn returns(&self) -> ReturnKind {
        self.returns
    }

    /// Call the handler with resolved arguments
    pub fn invoke(&self, args: Arguments) -> BoxFuture<'static, InvocationResult> {
        (self.handler)(args)
    }

    /// Human readable signature, used in logs
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(ParamKind::label).collect();
        let returns = match self.returns {
            ReturnKind::Value => "value",
            ReturnKind::Void => "()",
        };
        format!("{}({}) -> {}", self.path, params.join(", "), returns)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("path", &self.path)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Source of handlers: an application object exposing callable methods
pub trait Controller: Send + Sync + 'static {
    /// Controller name, the first segment of every dispatch path it serves
    fn name(&self) -> &str;

    /// Methods exposed by this controller
    fn methods(self: Arc<Self>) -> Vec<MethodSpec>;
}

type HandlerMap = HashMap<String, Arc<HandlerDescriptor>>;

/// Path to handler mapping, replaced wholesale on refresh
pub struct HandlerRegistry {
    handlers: ArcSwap<HandlerMap>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Create a registry populated from controllers
    pub fn with_controllers<I>(controllers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Controller>>,
    {
        let registry = Self::new();
        registry.refresh(controllers)?;
        Ok(registry)
    }

    /// Replace the whole mapping with the methods of the given controllers
    ///
    /// Handlers not supplied again are dropped. On a duplicate path nothing
    /// is replaced. Returns the number of registered handlers.
    pub fn refresh<I>(&self, controllers: I) -> Result<usize>
    where
        I: IntoIterator<Item = Arc<dyn Controller>>,
    {
        let mut next = HandlerMap::new();
        for controller in controllers {
            let name = controller.name().to_string();
            for method in controller.methods() {
                let descriptor = HandlerDescriptor::from_method(&name, method);
                if next.contains_key(descriptor.path()) {
                    return Err(WsRpcError::DuplicatePath(descriptor.path));
                }
                next.insert(descriptor.path.clone(), Arc::new(descriptor));
            }
        }

        let mut descriptors: Vec<&Arc<HandlerDescriptor>> = next.values().collect();
        descriptors.sort_by(|a, b| a.path.cmp(&b.path));
        for descriptor in descriptors {
            info!("Mapped remote method [{}]", descriptor.signature());
        }

        let count = next.len();
        self.handlers.store(Arc::new(next));
        Ok(count)
    }

    /// Look up the handler for a path
    pub fn resolve(&self, path: &str) -> Result<Arc<HandlerDescriptor>> {
        self.handlers
            .load()
            .get(path)
            .cloned()
            .ok_or_else(|| WsRpcError::NoSuchHandler(path.to_string()))
    }

    /// Check if a handler is registered for a path
    pub fn contains(&self, path: &str) -> bool {
        self.handlers.load().contains_key(path)
    }

    /// All registered paths (sorted)
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.handlers.load().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.load().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("paths", &self.paths())
            .finish()
    }
}
