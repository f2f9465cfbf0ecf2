use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::context::InvocationContext;
use crate::error::{BoxError, InvokeError, Rejection};
use crate::handler::Handler;

/// Runs a handler under a deadline shortened by `grace_period`, so the caller
/// keeps that much time after the handler returns.
///
/// The grace period is not validated here; an invalid one is reported on every
/// invocation instead, since the real deadline is only known per call.
#[derive(Debug, Clone)]
pub struct Graceful<H> {
    grace_period: TimeDelta,
    handler: H,
}

pub fn with_graceful_shutdown<H: Handler>(handler: H, grace_period: TimeDelta) -> Graceful<H> {
    Graceful::new(grace_period, handler)
}

impl<H: Handler> Graceful<H> {
    pub fn new(grace_period: TimeDelta, handler: H) -> Self {
        Self {
            grace_period,
            handler,
        }
    }

    pub fn grace_period(&self) -> TimeDelta {
        self.grace_period
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Deadline the handler would observe if invoked with `context` at `now`.
    ///
    /// A shrunk deadline equal to `now` leaves no runway and is rejected.
    pub fn shrunk_deadline(
        &self,
        context: &InvocationContext,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, Rejection> {
        if self.grace_period < TimeDelta::zero() {
            return Err(Rejection::InvalidConfiguration {
                grace_period: self.grace_period,
            });
        }

        let deadline = context.deadline().ok_or(Rejection::MissingDeadline)?;
        let exceeded = Rejection::GracePeriodExceedsDeadline {
            grace_period: self.grace_period,
            remaining: deadline - now,
        };
        // A grace period reaching past the representable range can never fit.
        match deadline.checked_sub_signed(self.grace_period) {
            Some(shrunk) if shrunk > now => Ok(shrunk),
            _ => Err(exceeded),
        }
    }

    pub async fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, InvokeError> {
        let shrunk = match self.shrunk_deadline(&context, Utc::now()) {
            Ok(value) => value,
            Err(rejection) => {
                debug!(
                    code = rejection.code(),
                    grace_period_ms = self.grace_period.num_milliseconds(),
                    "rejected invocation before calling handler"
                );
                return Err(rejection.into());
            }
        };

        debug!(
            original_deadline = ?context.deadline(),
            shrunk_deadline = %shrunk,
            grace_period_ms = self.grace_period.num_milliseconds(),
            "invoking handler under shrunk deadline"
        );

        // Cancels the derived context however this scope is left.
        let (child, _release) = context.derive_with_deadline(shrunk);
        self.handler
            .invoke(child, payload)
            .await
            .map_err(InvokeError::Handler)
    }
}

impl<H: Handler> Handler for Graceful<H> {
    fn invoke(
        &self,
        context: InvocationContext,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send {
        async move {
            Graceful::invoke(self, context, payload)
                .await
                .map_err(InvokeError::into_handler_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn noop() -> impl Handler {
        handler_fn(|_context, _payload| async { Ok::<Vec<u8>, BoxError>(Vec::new()) })
    }

    #[test]
    fn negative_grace_reported_before_missing_deadline() {
        let graceful = Graceful::new(TimeDelta::seconds(-1), noop());
        let rejection = graceful
            .shrunk_deadline(&InvocationContext::background(), Utc::now())
            .expect_err("negative grace must be rejected");
        assert!(matches!(rejection, Rejection::InvalidConfiguration { .. }));
    }

    #[test]
    fn missing_deadline_is_rejected() {
        let graceful = Graceful::new(TimeDelta::seconds(1), noop());
        let rejection = graceful
            .shrunk_deadline(&InvocationContext::background(), Utc::now())
            .expect_err("missing deadline must be rejected");
        assert_eq!(rejection, Rejection::MissingDeadline);
    }

    #[test]
    fn shrunk_deadline_equal_to_now_is_rejected() {
        let now = Utc::now();
        let context = InvocationContext::background().with_deadline(now + TimeDelta::seconds(3));
        let graceful = Graceful::new(TimeDelta::seconds(3), noop());

        let rejection = graceful
            .shrunk_deadline(&context, now)
            .expect_err("zero runway must be rejected");
        assert_eq!(
            rejection,
            Rejection::GracePeriodExceedsDeadline {
                grace_period: TimeDelta::seconds(3),
                remaining: TimeDelta::seconds(3),
            }
        );
    }

    #[test]
    fn shrunk_deadline_subtracts_grace_exactly() {
        let now = Utc::now();
        let deadline = now + TimeDelta::seconds(3);
        let context = InvocationContext::background().with_deadline(deadline);

        let graceful = Graceful::new(TimeDelta::seconds(1), noop());
        assert_eq!(
            graceful.shrunk_deadline(&context, now),
            Ok(deadline - TimeDelta::seconds(1))
        );

        let zero = Graceful::new(TimeDelta::zero(), noop());
        assert_eq!(zero.shrunk_deadline(&context, now), Ok(deadline));
    }

    #[test]
    fn unrepresentable_grace_is_rejected_without_panicking() {
        let now = Utc::now();
        let context = InvocationContext::background().with_deadline(now + TimeDelta::seconds(3));
        let million_years = TimeDelta::try_days(365 * 1_000_000).expect("representable delta");
        let graceful = Graceful::new(million_years, noop());

        let rejection = graceful
            .shrunk_deadline(&context, now)
            .expect_err("grace beyond the calendar must be rejected");
        assert_eq!(rejection.code(), "grace_period_exceeds_deadline");
    }

    #[test]
    fn rejection_result_is_null_sentinel() {
        assert_eq!(Rejection::MissingDeadline.result(), b"null");
    }
}
