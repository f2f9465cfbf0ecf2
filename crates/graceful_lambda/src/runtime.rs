use std::sync::Arc;

use chrono::{DateTime, Utc};
use graceful_core::{Graceful, Handler, InvocationContext, InvokeError};
use lambda_runtime::{service_fn, Context, Error, LambdaEvent};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

/// Builds the invocation context for one Lambda event.
///
/// The runtime reports its deadline in epoch milliseconds; zero means the
/// runtime did not supply one.
pub fn context_from_lambda(lambda_context: &Context) -> InvocationContext {
    let mut context = InvocationContext::background();
    if !lambda_context.request_id.is_empty() {
        context = context.with_request_id(lambda_context.request_id.clone());
    }

    match deadline_from_epoch_millis(lambda_context.deadline) {
        Some(deadline) => context.with_deadline(deadline),
        None => context,
    }
}

fn deadline_from_epoch_millis(millis: u64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

/// Runs one event through `graceful` and maps the outcome back to JSON.
///
/// Whatever is left of the real deadline after this returns is the grace period
/// reserved for the caller.
pub async fn handle_event<H: Handler>(
    graceful: &Graceful<H>,
    event: LambdaEvent<Value>,
) -> Result<Value, Error> {
    let context = context_from_lambda(&event.context);
    let deadline = context.deadline();
    let payload = serde_json::to_vec(&event.payload)
        .map_err(|error| Error::from(format!("failed to serialize event payload: {error}")))?;

    let outcome = graceful.invoke(context, payload).await;
    let remaining_ms = deadline.map(|deadline| (deadline - Utc::now()).num_milliseconds());

    match outcome {
        Ok(body) => {
            info!(?remaining_ms, "handler finished inside shrunk deadline");
            decode_result(&body)
        }
        Err(InvokeError::Rejected(rejection)) => {
            warn!(
                code = rejection.code(),
                error = %rejection,
                "invocation rejected before handler ran"
            );
            Err(Error::from(rejection))
        }
        Err(error) => {
            info!(?remaining_ms, "handler failed inside shrunk deadline");
            Err(error.into_handler_error())
        }
    }
}

fn decode_result(body: &[u8]) -> Result<Value, Error> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|error| Error::from(format!("handler returned invalid JSON: {error}")))
}

/// Serves `graceful` on the Lambda runtime API until the runtime shuts down.
pub async fn run<H>(graceful: Graceful<H>) -> Result<(), Error>
where
    H: Handler + 'static,
{
    let graceful = Arc::new(graceful);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let graceful = Arc::clone(&graceful);
        let span = info_span!("invocation", request_id = %event.context.request_id);
        async move { handle_event(&graceful, event).await }.instrument(span)
    }))
    .await
}
