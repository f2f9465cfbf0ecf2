use chrono::TimeDelta;
use thiserror::Error;

/// Error type produced by wrapped handlers. Same shape as `lambda_runtime::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result body returned alongside every rejection: JSON `null`.
pub const NULL_RESULT: &[u8] = b"null";

/// Reasons an invocation is refused before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("grace period cannot be negative (got {grace_period})")]
    InvalidConfiguration { grace_period: TimeDelta },
    #[error("context deadline not set")]
    MissingDeadline,
    #[error("invocation times out before grace period ends (grace {grace_period}, remaining {remaining})")]
    GracePeriodExceedsDeadline {
        grace_period: TimeDelta,
        remaining: TimeDelta,
    },
}

impl Rejection {
    /// Sentinel body reported in place of a handler result.
    pub fn result(&self) -> &'static [u8] {
        NULL_RESULT
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidConfiguration { .. } => "invalid_configuration",
            Rejection::MissingDeadline => "missing_deadline",
            Rejection::GracePeriodExceedsDeadline { .. } => "grace_period_exceeds_deadline",
        }
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Handler(BoxError),
}

impl InvokeError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            InvokeError::Rejected(rejection) => Some(*rejection),
            InvokeError::Handler(_) => None,
        }
    }

    /// Unwraps to the error the host should see. Handler errors come back as the
    /// original box.
    pub fn into_handler_error(self) -> BoxError {
        match self {
            InvokeError::Rejected(rejection) => Box::new(rejection),
            InvokeError::Handler(error) => error,
        }
    }
}
