//! Turns one user-initiated generate action into exactly one [`GenerationResult`].
//!
//! Attempts run strictly one after another. Each gets its own cancellation token
//! which is fired when the attempt deadline passes, and which is always released
//! before the backoff delay starts.

use std::{future::Future, pin::Pin, time::Duration};

use log::{debug, error, info, warn};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    error::GenerationError,
    image_model::{GenerationRequest, GenerationResult, Model},
};

mod http_gateway;
pub use http_gateway::HttpGateway;

mod retry_policy;
pub use retry_policy::{
    DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER,
    MAX_ATTEMPT_TIMEOUT, RetryPolicy,
};

/// One round trip to the gateway. Implementations should stop work once `cancel` fires.
pub trait ImageGateway {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

impl<T: ImageGateway + ?Sized> ImageGateway for std::sync::Arc<T> {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        (**self).generate(req, cancel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(GenerationError),
    FatalFailure(GenerationError),
}

/// Record of a single attempt. Only lives as long as the operation's report.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub started: Instant,
    pub deadline: Instant,
    pub outcome: AttemptOutcome,
    /// Delay slept after this attempt, if another one followed.
    pub backoff: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct InvocationReport {
    pub result: GenerationResult,
    pub attempts: Vec<Attempt>,
}

/// Per-call overrides of the invoker's policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    pub attempt_timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug)]
enum OperationState {
    Idle,
    Attempting(u32),
    BackingOff { after: u32, error: GenerationError },
    Succeeded(String),
    Failed(GenerationError),
}

pub struct ResilientInvoker<G> {
    gateway: G,
    policy: RetryPolicy,
}

impl<G: ImageGateway> ResilientInvoker<G> {
    pub fn new(gateway: G, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(&self, prompt: &str, model: Model) -> GenerationResult {
        self.generate_with_cancel(prompt, model, &CancellationToken::new())
            .await
    }

    /// Like [`Self::generate`], but stops early with `Cancelled` once `cancel` fires.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        model: Model,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        self.generate_traced(prompt, model, CallOptions::default(), cancel)
            .await
            .result
    }

    pub async fn generate_traced(
        &self,
        prompt: &str,
        model: Model,
        options: CallOptions,
        cancel: &CancellationToken,
    ) -> InvocationReport {
        let mut attempts = Vec::new();

        let req = match GenerationRequest::new(prompt, model) {
            Ok(req) => req,
            Err(e) => {
                warn!("Rejected generation request: {e}");
                return InvocationReport {
                    result: e.into(),
                    attempts,
                };
            }
        };

        let policy = RetryPolicy {
            max_attempts: options.max_attempts.unwrap_or(self.policy.max_attempts),
            attempt_timeout: options.attempt_timeout.unwrap_or(self.policy.attempt_timeout),
            ..self.policy
        };
        let max_attempts = policy.attempts();

        let mut state = OperationState::Idle;
        let result = loop {
            state = match state {
                OperationState::Idle => OperationState::Attempting(1),

                OperationState::Attempting(n) => {
                    let (attempt, res) = self.attempt(&req, n, policy.timeout(), cancel).await;
                    attempts.push(attempt);
                    match res {
                        Ok(url) => OperationState::Succeeded(url),
                        Err(e) if e.is_retryable() && n < max_attempts => {
                            OperationState::BackingOff { after: n, error: e }
                        }
                        Err(e) => OperationState::Failed(e),
                    }
                }

                OperationState::BackingOff { after, error } => {
                    let delay = policy.backoff(after, &mut rand::thread_rng());
                    warn!(
                        "Attempt {after}/{max_attempts} failed: {error}. Retrying in {}ms",
                        delay.as_millis()
                    );
                    if let Some(last) = attempts.last_mut() {
                        last.backoff = Some(delay);
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => OperationState::Failed(GenerationError::Cancelled),
                        _ = sleep(delay) => OperationState::Attempting(after + 1),
                    }
                }

                OperationState::Succeeded(url) => {
                    info!("Image generated after {} attempt(s): {url}", attempts.len());
                    break GenerationResult::Success { url };
                }

                OperationState::Failed(e) => {
                    error!("Image generation failed after {} attempt(s): {e}", attempts.len());
                    break GenerationResult::Failure {
                        kind: e.kind(),
                        message: failure_message(attempts.len(), &e),
                    };
                }
            }
        };

        InvocationReport { result, attempts }
    }

    async fn attempt(
        &self,
        req: &GenerationRequest,
        number: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> (Attempt, Result<String, GenerationError>) {
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + MAX_ATTEMPT_TIMEOUT);
        let attempt_token = cancel.child_token();
        debug!("Starting attempt {number} (deadline in {timeout:?})");

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            res = self.gateway.generate(req, &attempt_token) => res,
            _ = tokio::time::sleep_until(deadline) => Err(GenerationError::Timeout { after: timeout }),
        };
        // aborts anything still bound to this attempt, whichever branch won
        attempt_token.cancel();

        let outcome = match &res {
            Ok(_) => AttemptOutcome::Success,
            Err(e) if e.is_retryable() => AttemptOutcome::RetryableFailure(e.clone()),
            Err(e) => AttemptOutcome::FatalFailure(e.clone()),
        };

        let attempt = Attempt {
            number,
            started,
            deadline,
            outcome,
            backoff: None,
        };
        (attempt, res)
    }
}

fn failure_message(attempts: usize, err: &GenerationError) -> String {
    match err {
        GenerationError::Cancelled | GenerationError::Internal { .. } => err.to_string(),
        _ => format!("Failed to generate image after {attempts} attempt(s): {err}"),
    }
}
