//! The uniform handler shape and adapters that normalize closures into it.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::context::InvocationContext;
use crate::error::{BoxError, NULL_RESULT};

/// `(context, payload) -> (result bytes, error)`.
pub trait Handler: Send + Sync {
    fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send;
}

impl<H: Handler> Handler for Arc<H> {
    fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send {
        self.as_ref().invoke(context, payload)
    }
}

/// Raw byte handler built from a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(InvocationContext, Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(InvocationContext, Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send,
{
    fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send {
        (self.f)(context, payload)
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid event payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to serialize handler response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// JSON handler built from a typed closure. See [`json_handler`].
pub struct JsonHandler<F, E, R> {
    f: F,
    _shape: PhantomData<fn(E) -> R>,
}

/// Adapts `Fn(context, event) -> Result<response, error>` over serde types.
///
/// An empty payload decodes as JSON `null`, so handlers taking `()` accept it;
/// a `()` response encodes as `null`.
pub fn json_handler<F, Fut, E, R, Err>(f: F) -> JsonHandler<F, E, R>
where
    F: Fn(InvocationContext, E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Err>> + Send,
    E: DeserializeOwned,
    R: Serialize,
    Err: Into<BoxError>,
{
    JsonHandler {
        f,
        _shape: PhantomData,
    }
}

impl<F, Fut, E, R, Err> Handler for JsonHandler<F, E, R>
where
    F: Fn(InvocationContext, E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Err>> + Send,
    E: DeserializeOwned,
    R: Serialize,
    Err: Into<BoxError>,
{
    fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send {
        let call = decode_event::<E>(&payload).map(|event| (self.f)(context, event));

        async move {
            let response = call?.await.map_err(Into::into)?;
            let body = serde_json::to_vec(&response).map_err(AdapterError::Encode)?;
            Ok(body)
        }
    }
}

fn decode_event<E: DeserializeOwned>(payload: &[u8]) -> Result<E, AdapterError> {
    let payload = if payload.is_empty() {
        NULL_RESULT
    } else {
        payload
    };
    serde_json::from_slice(payload).map_err(AdapterError::Decode)
}
