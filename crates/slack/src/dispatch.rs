//! Executes one logical call as a bounded sequence of physical attempts.
//!
//! Throttling waits exactly what the remote asked for (`Retry-After`, else
//! the policy's rate-limit delay). Network faults back off exponentially.
//! Everything else is terminal on the first attempt. The attempt count is
//! the only circuit breaker.

use std::{path::Path, sync::Arc, time::Duration};

use {
    serde_json::Value,
    tracing::{debug, warn},
};

use slackline_config::RetryConfig;

use crate::{
    classify::classify,
    credentials::Credentials,
    error::{GatewayError, Result},
    transport::{ApiRequest, RawResponse, Transport},
};

/// Bounded retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.base_delay_secs),
            backoff_factor: config.backoff_factor,
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Attempts per call, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the network fault on attempt `attempt_index` (zero based).
    #[must_use]
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(attempt_index);
        self.base_delay.saturating_mul(factor)
    }
}

/// Result of a single physical attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Value),
    RetryableFailure { error: GatewayError, delay: Duration },
    TerminalFailure(GatewayError),
}

/// Interpret a raw response for `endpoint`.
#[must_use]
pub fn interpret(endpoint: &str, raw: RawResponse, policy: &RetryPolicy) -> AttemptOutcome {
    let throttle_delay = raw.retry_after.unwrap_or(policy.rate_limit_delay);

    let body: Value = match serde_json::from_str(&raw.body) {
        Ok(body) => body,
        Err(_) if raw.status == 429 => {
            let error = GatewayError::remote(
                "ratelimited",
                endpoint,
                classify("ratelimited", &Value::Null),
            );
            return AttemptOutcome::RetryableFailure {
                error,
                delay: throttle_delay,
            };
        },
        Err(err) => {
            return AttemptOutcome::TerminalFailure(GatewayError::malformed(
                "json_parse_error",
                format!(
                    "{endpoint} returned invalid JSON (HTTP {}): {err}",
                    raw.status
                ),
            ));
        },
    };

    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return AttemptOutcome::Success(body);
    }

    let code = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    let classification = classify(code, &body);
    let retryable = classification.retryable;
    let error = GatewayError::remote(code, endpoint, classification);
    if retryable {
        AttemptOutcome::RetryableFailure {
            error,
            delay: throttle_delay,
        }
    } else {
        AttemptOutcome::TerminalFailure(error)
    }
}

/// Shared entry point for every Web API call.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    credentials: Arc<Credentials>,
    policy: RetryPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials, policy: RetryPolicy) -> Self {
        Self {
            transport,
            credentials: Arc::new(credentials),
            policy,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `request` under the default policy.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
        self.execute_with(request, &self.policy).await
    }

    /// Execute `request` under `policy`.
    ///
    /// A missing elevated credential fails before anything is sent.
    pub async fn execute_with(&self, request: &ApiRequest, policy: &RetryPolicy) -> Result<Value> {
        let endpoint = request.endpoint();
        let tier = request.credential_tier();
        let token = self
            .credentials
            .select(tier)
            .map_err(|err| GatewayError {
                detail: format!("{endpoint} requires a {}", tier.label()),
                ..err
            })?;

        let attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            debug!(endpoint, attempt = attempt + 1, tier = tier.label(), "sending request");
            let outcome = match self.transport.send(request, token).await {
                Ok(raw) => interpret(endpoint, raw, policy),
                Err(fault) => AttemptOutcome::RetryableFailure {
                    error: GatewayError::network(format!("{endpoint}: {fault}")),
                    delay: policy.backoff_delay(attempt),
                },
            };

            match outcome {
                AttemptOutcome::Success(body) => {
                    debug!(endpoint, attempt = attempt + 1, "request succeeded");
                    return Ok(body);
                },
                AttemptOutcome::TerminalFailure(error) => {
                    debug!(endpoint, code = %error.code, kind = %error.kind, "request failed");
                    return Err(error);
                },
                AttemptOutcome::RetryableFailure { error, delay } => {
                    if attempt + 1 >= attempts {
                        warn!(endpoint, code = %error.code, attempts, "giving up after retries");
                        return Err(GatewayError::retries_exhausted(error, attempts));
                    }
                    warn!(
                        endpoint,
                        code = %error.code,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        ?delay,
                        "retryable failure, waiting before next attempt"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }

    /// Stream a file to a pre-signed upload URL. Single attempt: the upload
    /// handshake decides what a failure means.
    pub async fn transfer(&self, url: &str, path: &Path, length: u64) -> Result<()> {
        let raw = self
            .transport
            .upload(url, path, length)
            .await
            .map_err(|fault| GatewayError::network(format!("file transfer: {fault}")))?;

        if raw.status != 200 {
            let mut error = GatewayError::remote(
                "upload_failed",
                "file transfer",
                classify("upload_failed", &Value::Null),
            );
            let snippet: String = raw.body.chars().take(200).collect();
            error.detail = format!("upload URL answered HTTP {}: {snippet}", raw.status);
            return Err(error);
        }
        debug!(length, "file transfer complete");
        Ok(())
    }
}
