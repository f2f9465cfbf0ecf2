use std::time::Duration;

use chrono::Utc;
use graceful_core::{json_handler, with_graceful_shutdown, BoxError, InvocationContext};
use graceful_lambda::config::GracefulConfig;
use graceful_lambda::runtime;
use lambda_runtime::Error;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Deserialize)]
struct EchoRequest {
    message: String,
    #[serde(default)]
    work_ms: u64,
}

#[derive(Debug, Serialize)]
struct EchoResponse {
    message: String,
    completed: bool,
    remaining_ms: Option<i64>,
}

/// Simulated work that stops early when the shrunk deadline fires.
async fn echo(context: InvocationContext, request: EchoRequest) -> Result<EchoResponse, BoxError> {
    let completed = tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(request.work_ms)) => true,
        _ = context.done() => false,
    };

    Ok(EchoResponse {
        message: request.message,
        completed,
        remaining_ms: context
            .remaining(Utc::now())
            .map(|remaining| remaining.num_milliseconds()),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .without_time()
        .compact()
        .init();

    let config = GracefulConfig::from_env()?;
    tracing::info!(
        grace_period_ms = config.grace_period.num_milliseconds(),
        "graceful_echo starting"
    );

    runtime::run(with_graceful_shutdown(json_handler(echo), config.grace_period)).await
}
