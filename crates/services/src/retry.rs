//! User-gated retry of fallible asynchronous operations.
//!
//! A failed attempt asks a [`RetryPrompt`] for a trigger stream. The first item
//! on that stream starts the next attempt; a stream that ends without an item
//! abandons the operation. There is no attempt limit and no backoff.

use std::fmt;
use std::future::Future;
use std::pin::{Pin, pin};

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::QuestionServiceError;

/// Stream whose first item means "try again"; ending without one means "give up".
pub type RetryTrigger = Pin<Box<dyn Stream<Item = ()> + Send + 'static>>;

/// Collaborator asked for a retry trigger every time a remote call fails,
/// typically backed by a "try again" dialog.
pub trait RetryPrompt: Send + Sync {
    fn retry_trigger(&self, error: &QuestionServiceError) -> RetryTrigger;
}

impl<F> RetryPrompt for F
where
    F: Fn(&QuestionServiceError) -> RetryTrigger + Send + Sync,
{
    fn retry_trigger(&self, error: &QuestionServiceError) -> RetryTrigger {
        self(error)
    }
}

/// Prompt that never offers a retry; every failure abandons the operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPrompt for NoRetry {
    fn retry_trigger(&self, _error: &QuestionServiceError) -> RetryTrigger {
        Box::pin(tokio_stream::empty())
    }
}

/// Prompt that retries immediately after every failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl RetryPrompt for AlwaysRetry {
    fn retry_trigger(&self, _error: &QuestionServiceError) -> RetryTrigger {
        Box::pin(tokio_stream::once(()))
    }
}

/// Run `source` until it succeeds or the trigger for a failure ends empty.
///
/// Returns `None` when the operation was abandoned. Attempts never overlap:
/// the next one starts only after the previous failed and its trigger fired.
pub async fn retry<T, E, Src, Fut, OnErr, S>(mut source: Src, mut on_error: OnErr) -> Option<T>
where
    Src: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    OnErr: FnMut(&E) -> S,
    S: Stream<Item = ()>,
    E: fmt::Display,
{
    let mut attempt: u32 = 1;
    loop {
        let error = match source().await {
            Ok(value) => return Some(value),
            Err(error) => error,
        };
        warn!(attempt, %error, "remote operation failed; waiting for retry trigger");

        let mut trigger = pin!(on_error(&error));
        if trigger.next().await.is_none() {
            debug!(attempt, "retry declined; abandoning operation");
            return None;
        }
        attempt = attempt.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing_until(
        successes_after: usize,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str, QuestionServiceError>> {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call > successes_after {
                std::future::ready(Ok("loaded"))
            } else {
                std::future::ready(Err(QuestionServiceError::Timeout))
            }
        }
    }

    #[tokio::test]
    async fn succeeds_without_consulting_prompt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let prompts = AtomicUsize::new(0);
        let value = retry(failing_until(0, Arc::clone(&calls)), |_| {
            prompts.fetch_add(1, Ordering::SeqCst);
            tokio_stream::once(())
        })
        .await;

        assert_eq!(value, Some("loaded"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn two_failures_then_success_takes_three_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let value = retry(failing_until(2, Arc::clone(&calls)), |_| {
            tokio_stream::once(())
        })
        .await;

        assert_eq!(value, Some("loaded"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_trigger_abandons_after_single_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let value = retry(failing_until(usize::MAX, Arc::clone(&calls)), |_| {
            tokio_stream::empty()
        })
        .await;

        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn user_gives_up_after_retrying_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let prompts = AtomicUsize::new(0);
        let value = retry(failing_until(usize::MAX, Arc::clone(&calls)), |_| {
            let seen = prompts.fetch_add(1, Ordering::SeqCst);
            let retries = if seen == 0 { 1 } else { 0 };
            tokio_stream::iter(std::iter::repeat_n((), retries))
        })
        .await;

        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn prompt_receives_the_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut seen = Vec::new();
        let _ = retry(failing_until(1, Arc::clone(&calls)), |err: &QuestionServiceError| {
            seen.push(err.clone());
            tokio_stream::once(())
        })
        .await;

        assert_eq!(seen, vec![QuestionServiceError::Timeout]);
    }

    #[tokio::test]
    async fn attempts_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let source = {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            let calls = Arc::clone(&calls);
            move || {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                let calls = Arc::clone(&calls);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                        Err(QuestionServiceError::Unavailable("offline".into()))
                    } else {
                        Ok(())
                    }
                }
            }
        };

        let value = retry(source, |_| tokio_stream::iter([(), (), ()])).await;
        assert_eq!(value, Some(()));
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stock_prompts() {
        let err = QuestionServiceError::Timeout;
        let mut never = NoRetry.retry_trigger(&err);
        assert_eq!(never.next().await, None);

        let mut always = AlwaysRetry.retry_trigger(&err);
        assert_eq!(always.next().await, Some(()));
        assert_eq!(always.next().await, None);
    }
}
