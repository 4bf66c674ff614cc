/// Concurrent, bounded, retrying batch execution of remote model calls.
///
/// The remote call itself is an injected capability: the executor only knows
/// "ordered conversation turns in, text out". Items run under a semaphore
/// permit pool, complete in whatever order the network allows, and land in
/// index-aligned output slots so position i of the result always corresponds
/// to payload i.
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::constants::{DEFAULT_BACKOFF_BASE, DEFAULT_CONCURRENCY, DEFAULT_MAX_TRIES};
use crate::types::{CallParams, ChatTurn};

/// Failure modes of one remote call.
#[derive(Debug, Error)]
pub enum CallError {
    /// Network trouble, timeouts, rate limits. Retried in place.
    #[error("transient call failure: {0}")]
    Transient(String),

    /// Authentication and other non-recoverable failures. Aborts the batch
    /// immediately, no retry.
    #[error("fatal call failure: {0}")]
    Fatal(String),
}

/// One chat round-trip against the remote model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, turns: &[ChatTurn], params: &CallParams) -> Result<String, CallError>;
}

/// Knobs for one batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Max requests in flight at once.
    pub concurrency: usize,
    /// Total attempts per item, transient failures included.
    pub max_tries: u32,
    /// Linear backoff base in seconds; attempt n sleeps `base * n`.
    pub backoff_base: f64,
}

impl Default for BatchOptions {
    fn default() -> BatchOptions {
        BatchOptions {
            concurrency: DEFAULT_CONCURRENCY,
            max_tries: DEFAULT_MAX_TRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

/// A batch aborted because one item never succeeded.
#[derive(Debug, Error)]
#[error("request {index} failed after {attempts} attempt(s): {source}")]
pub struct BatchError {
    /// Input index of the item that gave up.
    pub index: usize,
    /// Attempts actually made for that item.
    pub attempts: u32,
    #[source]
    pub source: CallError,
}

/// Progress sink: called with (completed_so_far, total) on every completion.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Execute every payload against the client, at most `concurrency` in
/// flight, and return the responses aligned to input order.
///
/// A single item that exhausts its retry budget (or hits a fatal error)
/// fails the whole batch: partial results would corrupt the tournament, so
/// none are published. Siblings already in flight run to completion and
/// their output is discarded.
pub async fn execute_batch(
    client: Arc<dyn ModelClient>,
    payloads: Vec<Vec<ChatTurn>>,
    params: CallParams,
    options: &BatchOptions,
    on_progress: Option<ProgressFn>,
) -> Result<Vec<String>, BatchError> {
    let total = payloads.len();
    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let completed = Arc::new(AtomicUsize::new(0));
    let params = Arc::new(params);

    let mut handles = Vec::with_capacity(total);

    for (index, turns) in payloads.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let client = client.clone();
        let params = params.clone();
        let completed = completed.clone();
        let on_progress = on_progress.clone();
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            let result =
                call_with_retries(client.as_ref(), &semaphore, &turns, &params, &options).await;
            if result.is_ok() {
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref progress) = on_progress {
                    progress(done, total);
                }
            }
            result
        }));
    }

    // Await every task before deciding the batch outcome, so in-flight
    // siblings of a failed item finish rather than being torn down.
    let mut slots: Vec<Option<String>> = (0..total).map(|_| None).collect();
    let mut failure: Option<BatchError> = None;

    for (index, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(text)) => slots[index] = Some(text),
            Ok(Err((attempts, source))) => {
                if failure.is_none() {
                    failure = Some(BatchError { index, attempts, source });
                }
            }
            Err(join_error) => {
                if failure.is_none() {
                    failure = Some(BatchError {
                        index,
                        attempts: 0,
                        source: CallError::Fatal(format!("task panicked: {join_error}")),
                    });
                }
            }
        }
    }

    if let Some(error) = failure {
        return Err(error);
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("every slot is filled when no item failed"))
        .collect())
}

/// Drive one item to success or a final error, holding a permit only while
/// a call is actually in flight (backoff sleeps release the slot).
async fn call_with_retries(
    client: &dyn ModelClient,
    semaphore: &Semaphore,
    turns: &[ChatTurn],
    params: &CallParams,
    options: &BatchOptions,
) -> Result<String, (u32, CallError)> {
    let mut attempt: u32 = 1;
    loop {
        let outcome = {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            client.send(turns, params).await
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(CallError::Fatal(message)) => {
                return Err((attempt, CallError::Fatal(message)));
            }
            Err(CallError::Transient(message)) => {
                if attempt >= options.max_tries {
                    return Err((attempt, CallError::Transient(message)));
                }
                let delay = options.backoff_base * f64::from(attempt);
                tracing::warn!(
                    attempt,
                    delay_secs = delay,
                    error = %message,
                    "transient call failure, backing off"
                );
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    fn test_params() -> CallParams {
        CallParams {
            model: "test-model".to_string(),
            temperature: 0.0,
            top_p: 1.0,
        }
    }

    fn payload(content: &str) -> Vec<ChatTurn> {
        vec![ChatTurn::user(content)]
    }

    /// Echoes the payload after a latency inversely correlated with the
    /// index encoded in the payload, forcing out-of-order completion.
    struct ReverseLatencyClient {
        total: usize,
    }

    #[async_trait]
    impl ModelClient for ReverseLatencyClient {
        async fn send(&self, turns: &[ChatTurn], _params: &CallParams) -> Result<String, CallError> {
            let index: usize = turns[0].content.parse().expect("payload encodes its index");
            let delay_ms = (self.total - index) as u64 * 5;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(format!("answer-{index}"))
        }
    }

    /// Fails a fixed number of times per distinct payload, then succeeds.
    struct FlakyClient {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelClient for FlakyClient {
        async fn send(&self, turns: &[ChatTurn], _params: &CallParams) -> Result<String, CallError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(CallError::Transient("rate limited".to_string()))
            } else {
                Ok(turns[0].content.clone())
            }
        }
    }

    struct FatalClient;

    #[async_trait]
    impl ModelClient for FatalClient {
        async fn send(&self, _turns: &[ChatTurn], _params: &CallParams) -> Result<String, CallError> {
            Err(CallError::Fatal("bad credentials".to_string()))
        }
    }

    fn fast_options(concurrency: usize, max_tries: u32) -> BatchOptions {
        BatchOptions {
            concurrency,
            max_tries,
            backoff_base: 0.0,
        }
    }

    #[tokio::test]
    async fn test_results_are_index_aligned_despite_completion_order() {
        let total = 12;
        let client = Arc::new(ReverseLatencyClient { total });
        let payloads: Vec<_> = (0..total).map(|i| payload(&i.to_string())).collect();

        let results = execute_batch(client, payloads, test_params(), &fast_options(4, 1), None)
            .await
            .unwrap();

        assert_eq!(results.len(), total);
        for (i, text) in results.iter().enumerate() {
            assert_eq!(text, &format!("answer-{i}"));
        }
    }

    #[tokio::test]
    async fn test_transient_failures_within_budget_succeed() {
        // Fails twice, succeeds on the third attempt; max_tries = 3.
        let client = Arc::new(FlakyClient {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        });

        let results = execute_batch(
            client,
            vec![payload("hello")],
            test_params(),
            &fast_options(1, 3),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_batch() {
        let client = Arc::new(FlakyClient {
            failures_before_success: 3,
            calls: AtomicU32::new(0),
        });

        let error = execute_batch(
            client,
            vec![payload("hello")],
            test_params(),
            &fast_options(1, 3),
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(error.index, 0);
        assert_eq!(error.attempts, 3);
        assert!(matches!(error.source, CallError::Transient(_)));
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits_without_retry() {
        let client = Arc::new(FatalClient);

        let error = execute_batch(
            client,
            vec![payload("hello")],
            test_params(),
            &fast_options(1, 5),
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(error.attempts, 1, "fatal errors must not be retried");
        assert!(matches!(error.source, CallError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_progress_reports_every_completion() {
        let total = 8;
        let client = Arc::new(ReverseLatencyClient { total });
        let payloads: Vec<_> = (0..total).map(|i| payload(&i.to_string())).collect();

        let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        execute_batch(
            client,
            payloads,
            test_params(),
            &fast_options(3, 1),
            Some(progress),
        )
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), total);
        let mut counts: Vec<usize> = seen.iter().map(|(done, _)| *done).collect();
        counts.sort_unstable();
        assert_eq!(counts, (1..=total).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, t)| *t == total));
    }
}
