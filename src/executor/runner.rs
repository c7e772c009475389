//! Virtual user: one simulated client issuing the request in a loop

use crate::{
    client::{HttpClient, HttpResponse, PreparedRequest},
    error::{AppError, Result},
    models::{RequestOutcome, StatusExpectation},
    types::OutcomeStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a virtual user did before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSummary {
    pub vu: u32,
    /// Iterations whose request completed (successfully or not)
    pub iterations: u64,
    /// Outcomes sent to the aggregator, including an abandoned one
    pub emitted: u64,
}

/// A single virtual user
///
/// The soft `stop` token is only checked between iterations and during the
/// pause, so a request already in flight finishes normally. The `abort` token
/// cuts an in-flight request short and records it as abandoned.
pub struct VirtualUser {
    id: u32,
    client: Arc<dyn HttpClient>,
    request: Arc<PreparedRequest>,
    expectation: Arc<StatusExpectation>,
    iterations: Option<u64>,
    pause: Option<Duration>,
    stop: CancellationToken,
    abort: CancellationToken,
    outcomes: mpsc::Sender<RequestOutcome>,
}

impl VirtualUser {
    pub fn new(
        id: u32,
        client: Arc<dyn HttpClient>,
        request: Arc<PreparedRequest>,
        outcomes: mpsc::Sender<RequestOutcome>,
    ) -> Self {
        Self {
            id,
            client,
            request,
            expectation: Arc::new(StatusExpectation::default()),
            iterations: None,
            pause: None,
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            outcomes,
        }
    }

    pub fn with_expectation(mut self, expectation: Arc<StatusExpectation>) -> Self {
        self.expectation = expectation;
        self
    }

    /// Stop after this many iterations; `None` runs until stopped
    pub fn with_iterations(mut self, iterations: Option<u64>) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_pause(mut self, pause: Option<Duration>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_abort_token(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run until the iteration budget is spent or a token fires
    pub async fn run(self) -> RunnerSummary {
        let mut summary = RunnerSummary {
            vu: self.id,
            iterations: 0,
            emitted: 0,
        };
        let mut iteration: u64 = 0;

        loop {
            if self.stop.is_cancelled() || self.abort.is_cancelled() {
                break;
            }
            if self.iterations.is_some_and(|limit| iteration >= limit) {
                break;
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    RequestOutcome::abandoned(self.id, iteration, started.elapsed())
                }
                result = self.client.execute(&self.request) => {
                    self.outcome(iteration, started.elapsed(), result)
                }
            };

            let abandoned = outcome.status == OutcomeStatus::Abandoned;
            if self.outcomes.send(outcome).await.is_err() {
                tracing::warn!(vu = self.id, "outcome channel closed, stopping virtual user");
                break;
            }
            summary.emitted += 1;
            if abandoned {
                break;
            }
            summary.iterations += 1;
            iteration += 1;

            if self.iterations.is_some_and(|limit| iteration >= limit) {
                break;
            }
            if let Some(pause) = self.pause {
                tokio::select! {
                    _ = self.stop.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        tracing::debug!(
            vu = summary.vu,
            iterations = summary.iterations,
            emitted = summary.emitted,
            "virtual user finished"
        );
        summary
    }

    fn outcome(&self, iteration: u64, latency: Duration, result: Result<HttpResponse>) -> RequestOutcome {
        match result {
            Ok(response) => RequestOutcome::response(
                self.id,
                iteration,
                response.status_code,
                latency,
                self.expectation.matches(response.status_code),
            ),
            Err(AppError::Timeout(message)) => {
                tracing::debug!(vu = self.id, iteration, error = %message, "request timed out");
                RequestOutcome::timeout(self.id, iteration, latency, message)
            }
            Err(error) => {
                tracing::debug!(vu = self.id, iteration, %error, "request failed");
                let message = match error {
                    AppError::Transport(message) => message,
                    other => other.to_string(),
                };
                RequestOutcome::transport_error(self.id, iteration, latency, message)
            }
        }
    }
}
