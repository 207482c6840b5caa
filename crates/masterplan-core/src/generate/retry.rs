//! Retry loop around a single upstream call.
//!
//! ```text
//! Idle -> Requesting -> Completed
//!             |      -> Permanent            (no retry)
//!             '-> Transient -> sleep(delay) -> Requesting
//!                      '-> attempts exhausted -> UpstreamTransient
//! ```
//!
//! Both the call and the sleep race the cancellation token, so an abandoned
//! request stops at the next await point.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::GenerationError;
use crate::service::{CallOutcome, GenerationRequest, GenerationService, PermanentCause};

/// How often, and how patiently, transient failures are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the n-th failed attempt. The last entry repeats if there
    /// are more retries than entries.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            delays,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Vec::new())
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Call `service` until it completes, fails permanently, runs out of
/// attempts, or `cancel` fires. Returns the non-empty response text.
pub async fn call_with_retry(
    service: &dyn GenerationService,
    request: &GenerationRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let outcome = tokio::select! {
            outcome = service.generate(request) => outcome,
            _ = cancel.cancelled() => {
                tracing::info!(service = service.name(), attempt, "generation cancelled mid-request");
                return Err(GenerationError::Cancelled);
            }
        };

        match outcome {
            CallOutcome::Completed(text) if text.trim().is_empty() => {
                tracing::warn!(service = service.name(), attempt, "generation service returned no text");
                return Err(GenerationError::UpstreamPermanent {
                    cause: PermanentCause::EmptyResponse,
                    message: "the service returned an empty response".to_string(),
                });
            }
            CallOutcome::Completed(text) => {
                if attempt > 1 {
                    tracing::info!(service = service.name(), attempt, "generation succeeded after retry");
                }
                return Ok(text);
            }
            CallOutcome::Permanent(signal) => {
                tracing::warn!(
                    service = service.name(),
                    attempt,
                    signal = %signal,
                    "permanent generation failure, not retrying"
                );
                return Err(GenerationError::permanent(&signal));
            }
            CallOutcome::Transient(signal) => {
                if attempt >= max_attempts {
                    tracing::warn!(
                        service = service.name(),
                        attempts = attempt,
                        signal = %signal,
                        "generation service still unavailable, giving up"
                    );
                    return Err(GenerationError::UpstreamTransient {
                        attempts: attempt,
                        signal,
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    service = service.name(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    signal = %signal,
                    "transient generation failure, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        tracing::info!(service = service.name(), attempt, "generation cancelled during backoff");
                        return Err(GenerationError::Cancelled);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::service::{Language, UpstreamSignal};

    /// Plays back a fixed list of outcomes, then repeats the last one.
    struct Playback {
        outcomes: Mutex<VecDeque<CallOutcome>>,
        calls: AtomicU32,
    }

    impl Playback {
        fn new(outcomes: Vec<CallOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationService for Playback {
        fn name(&self) -> &str {
            "playback"
        }

        async fn generate(&self, _request: &GenerationRequest) -> CallOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap()
            }
        }
    }

    fn overloaded() -> CallOutcome {
        CallOutcome::Transient(UpstreamSignal::new(Some(503), "overloaded"))
    }

    fn request() -> GenerationRequest {
        GenerationRequest::json("plan", Language::PtBr)
    }

    #[test]
    fn delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(3));
        assert_eq!(policy.delay_after(3), Duration::from_secs(5));
        assert_eq!(policy.delay_after(9), Duration::from_secs(5));
        assert_eq!(RetryPolicy::no_retry().delay_after(1), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_waits_the_schedule() {
        let service = Playback::new(vec![
            overloaded(),
            overloaded(),
            CallOutcome::Completed("{}".into()),
        ]);
        let start = Instant::now();

        let text = call_with_retry(
            &service,
            &request(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(text, "{}");
        assert_eq!(service.calls(), 3);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(4), "waited {waited:?}");
        assert!(waited < Duration::from_secs(5), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_exhausts_attempts() {
        let service = Playback::new(vec![overloaded()]);

        let err = call_with_retry(
            &service,
            &request(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GenerationError::UpstreamTransient { attempts: 3, .. }));
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_never_retries() {
        let service = Playback::new(vec![CallOutcome::Permanent(UpstreamSignal::new(
            Some(401),
            "bad key",
        ))]);

        let err = call_with_retry(
            &service,
            &request(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::UpstreamPermanent {
                cause: PermanentCause::Unauthorized,
                ..
            }
        ));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn empty_text_is_permanent() {
        let service = Playback::new(vec![CallOutcome::Completed("  \n".into())]);

        let err = call_with_retry(
            &service,
            &request(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::UpstreamPermanent {
                cause: PermanentCause::EmptyResponse,
                ..
            }
        ));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let service = Playback::new(vec![CallOutcome::Completed("{}".into())]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = call_with_retry(&service, &request(), &RetryPolicy::default(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_backoff() {
        let service = Playback::new(vec![overloaded()]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = call_with_retry(&service, &request(), &RetryPolicy::default(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled));
        assert_eq!(service.calls(), 1);
    }
}
