use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a context stopped being live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Cancelled,
    DeadlineExceeded,
}

/// Per-invocation context handed to handlers.
///
/// Carries an optional absolute deadline, a cancellation token that cascades to
/// derived contexts, and the host's request id when there is one.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    deadline: Option<DateTime<Utc>>,
    cancellation: CancellationToken,
    request_id: Option<String>,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::background()
    }
}

impl InvocationContext {
    /// A root context with no deadline and a fresh cancellation token.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancellation: CancellationToken::new(),
            request_id: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now, saturating at the ends of the
    /// representable calendar.
    pub fn with_timeout(self, timeout: TimeDelta) -> Self {
        let deadline = Utc::now().checked_add_signed(timeout).unwrap_or_else(|| {
            if timeout < TimeDelta::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        });
        self.with_deadline(deadline)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Time left until the deadline as seen from `now`. Negative once it has passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.deadline.map(|deadline| deadline - now)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Non-blocking check; cancellation wins over an expired deadline.
    pub fn done_reason(&self, now: DateTime<Utc>) -> Option<DoneReason> {
        if self.is_cancelled() {
            return Some(DoneReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if now >= deadline => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> DoneReason {
        let Some(deadline) = self.deadline else {
            self.cancellation.cancelled().await;
            return DoneReason::Cancelled;
        };

        let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => DoneReason::Cancelled,
            _ = tokio::time::sleep(remaining) => DoneReason::DeadlineExceeded,
        }
    }

    /// Derives a child bound to `deadline` (never later than this context's own).
    ///
    /// Cancelling `self` cancels the child. The returned guard cancels the child
    /// when dropped, releasing its slot in the parent's token tree.
    pub fn derive_with_deadline(&self, deadline: DateTime<Utc>) -> (Self, DropGuard) {
        let deadline = self
            .deadline
            .map_or(deadline, |parent| parent.min(deadline));
        let cancellation = self.cancellation.child_token();
        let guard = cancellation.clone().drop_guard();

        let child = Self {
            deadline: Some(deadline),
            cancellation,
            request_id: self.request_id.clone(),
        };
        (child, guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_has_no_deadline() {
        let context = InvocationContext::background();
        assert_eq!(context.deadline(), None);
        assert_eq!(context.remaining(Utc::now()), None);
        assert_eq!(context.done_reason(Utc::now()), None);
    }

    #[test]
    fn derived_deadline_never_extends_parent() {
        let now = Utc::now();
        let parent = InvocationContext::background().with_deadline(now + TimeDelta::seconds(2));

        let (earlier, _guard) = parent.derive_with_deadline(now + TimeDelta::seconds(1));
        assert_eq!(earlier.deadline(), Some(now + TimeDelta::seconds(1)));

        let (later, _guard) = parent.derive_with_deadline(now + TimeDelta::seconds(5));
        assert_eq!(later.deadline(), Some(now + TimeDelta::seconds(2)));
    }

    #[test]
    fn parent_cancellation_cascades_to_child() {
        let parent = InvocationContext::background().with_request_id("req-1");
        let (child, _guard) = parent.derive_with_deadline(Utc::now() + TimeDelta::seconds(5));

        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.done_reason(Utc::now()), Some(DoneReason::Cancelled));
        assert_eq!(child.request_id(), Some("req-1"));
    }

    #[test]
    fn dropping_guard_cancels_child_only() {
        let parent = InvocationContext::background();
        let (child, guard) = parent.derive_with_deadline(Utc::now() + TimeDelta::seconds(5));

        drop(guard);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let now = Utc::now();
        let context = InvocationContext::background().with_deadline(now);
        assert_eq!(
            context.done_reason(now),
            Some(DoneReason::DeadlineExceeded)
        );
        assert_eq!(context.remaining(now), Some(TimeDelta::zero()));
    }

    #[test]
    fn out_of_range_timeout_saturates() {
        let million_years = TimeDelta::try_days(365 * 1_000_000).expect("representable delta");
        let far = InvocationContext::background().with_timeout(million_years);
        assert_eq!(far.deadline(), Some(DateTime::<Utc>::MAX_UTC));

        let past = InvocationContext::background().with_timeout(-million_years);
        assert_eq!(past.deadline(), Some(DateTime::<Utc>::MIN_UTC));
        assert_eq!(
            past.done_reason(Utc::now()),
            Some(DoneReason::DeadlineExceeded)
        );
    }

    #[tokio::test]
    async fn done_resolves_on_deadline() {
        let context = InvocationContext::background().with_timeout(TimeDelta::milliseconds(20));
        assert_eq!(context.done().await, DoneReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn done_resolves_on_cancel() {
        let context = InvocationContext::background().with_timeout(TimeDelta::seconds(30));
        let canceller = context.clone();
        tokio::spawn(async move { canceller.cancel() });
        assert_eq!(context.done().await, DoneReason::Cancelled);
    }
}
