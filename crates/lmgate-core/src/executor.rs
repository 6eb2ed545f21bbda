//! Drives one logical request against one provider, rotating across
//! account leases until it succeeds, exhausts the retry budget, or hits
//! a non-retryable failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lmgate_common::GatewayConfig;
use lmgate_pool::{Credential, CredentialPool, Lease, Outcome, PoolError, TokenRefresher};
use rand::Rng;
use serde_json::Value;

use crate::error::{ErrorKind, GatewayError};
use crate::providers::ProviderProfile;
use crate::upstream::{TransportErrorKind, UpstreamBody, UpstreamClient, UpstreamRequest, UpstreamResponse};

const BACKOFF_BASE: Duration = Duration::from_millis(500);

pub struct ExecuteSpec {
    pub profile: ProviderProfile,
    /// Provider-native payload, already translated and
    /// thinking-projected.
    pub payload: Value,
    pub upstream_model: String,
    pub stream: bool,
}

/// A successful upstream connection. The lease stays held until the
/// caller drops the result, i.e. until the stream is fully relayed.
pub struct ExecuteResult {
    pub response: UpstreamResponse,
    /// Held so the account's inflight count survives until the caller
    /// finishes relaying the body.
    #[allow(dead_code)]
    pub(crate) lease: Lease,
}

pub struct Executor {
    pool: Arc<CredentialPool>,
    client: Arc<dyn UpstreamClient>,
    refreshers: HashMap<String, Arc<dyn TokenRefresher>>,
    request_retry: u32,
    max_retry_interval: Duration,
}

impl Executor {
    pub fn new(
        pool: Arc<CredentialPool>,
        client: Arc<dyn UpstreamClient>,
        request_retry: u32,
        max_retry_interval: Duration,
    ) -> Self {
        Self {
            pool,
            client,
            refreshers: HashMap::new(),
            request_retry,
            max_retry_interval,
        }
    }

    pub fn with_refresher(
        mut self,
        provider: impl Into<String>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        self.refreshers.insert(provider.into(), refresher);
        self
    }

    pub async fn execute(
        &self,
        config: &GatewayConfig,
        spec: &ExecuteSpec,
    ) -> Result<ExecuteResult, GatewayError> {
        let mut last_error = GatewayError::upstream("request not attempted");
        let refresher = self.refreshers.get(spec.profile.kind.as_str());

        for attempt in 0..=self.request_retry {
            let lease = match self.pool.acquire(&spec.profile.kind).await {
                Ok(lease) => lease,
                Err(PoolError::ProviderUnknown(provider)) => {
                    return Err(GatewayError::new(
                        ErrorKind::RateLimited,
                        format!("no credentials configured for {provider}"),
                    ));
                }
                Err(PoolError::NoCredentials(provider)) => {
                    return Err(GatewayError::new(
                        ErrorKind::RateLimited,
                        format!("all credentials for {provider} are cooling down"),
                    ));
                }
                Err(err) => return Err(GatewayError::upstream(err.to_string())),
            };

            let credential = match refresher {
                Some(refresher) => match self.pool.ensure_fresh(&lease, refresher.as_ref()).await {
                    Ok(credential) => credential,
                    Err(err) => {
                        tracing::warn!(provider = %spec.profile.kind, error = %err, "credential refresh failed; rotating");
                        last_error = GatewayError::upstream(err.to_string());
                        continue;
                    }
                },
                None => lease.credential().clone(),
            };

            match self
                .attempt_once(config, spec, &lease, &credential, refresher)
                .await
            {
                AttemptOutcome::Done(response) => {
                    return Ok(ExecuteResult { response, lease });
                }
                AttemptOutcome::Fatal(err) => return Err(err),
                AttemptOutcome::Retry(err) => {
                    last_error = err;
                    if attempt < self.request_retry {
                        self.backoff(attempt).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn attempt_once(
        &self,
        config: &GatewayConfig,
        spec: &ExecuteSpec,
        lease: &Lease,
        credential: &Credential,
        refresher: Option<&Arc<dyn TokenRefresher>>,
    ) -> AttemptOutcome {
        let response = match self.send(config, spec, credential).await {
            Ok(response) => response,
            Err(err) => {
                self.pool.report(lease, Outcome::Upstream);
                let kind = match err.kind {
                    TransportErrorKind::Timeout => ErrorKind::Timeout,
                    _ => ErrorKind::UpstreamError,
                };
                return AttemptOutcome::Retry(GatewayError::new(kind, err.message));
            }
        };

        if (200..300).contains(&response.status) {
            self.pool.report(lease, Outcome::Ok);
            return AttemptOutcome::Done(response);
        }

        let status = response.status;
        let retry_after = response
            .header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = body_text(response);

        match status {
            401 => {
                // One forced refresh, one retry on the same account;
                // only then rotate away.
                if credential.refresh_token.is_some() {
                    if let Some(refresher) = refresher {
                        match self.pool.refresh_now(lease, refresher.as_ref()).await {
                            Ok(refreshed) => {
                                match self.send(config, spec, &refreshed).await {
                                    Ok(retry) if (200..300).contains(&retry.status) => {
                                        self.pool.report(lease, Outcome::Ok);
                                        return AttemptOutcome::Done(retry);
                                    }
                                    Ok(retry) => {
                                        let status = retry.status;
                                        let body = body_text(retry);
                                        self.pool.report(lease, Outcome::AuthExpired);
                                        return AttemptOutcome::Retry(GatewayError::upstream(
                                            format!("auth retry failed with {status}: {body}"),
                                        ));
                                    }
                                    Err(err) => {
                                        self.pool.report(lease, Outcome::Upstream);
                                        return AttemptOutcome::Retry(GatewayError::upstream(
                                            err.message,
                                        ));
                                    }
                                }
                            }
                            Err(err) => {
                                tracing::warn!(credential = lease.credential_id(), error = %err, "forced refresh failed");
                            }
                        }
                    }
                }
                self.pool.report(lease, Outcome::AuthExpired);
                AttemptOutcome::Retry(GatewayError::upstream(format!(
                    "upstream rejected credentials: {body}"
                )))
            }
            429 => {
                let outcome = if looks_like_quota(&body) {
                    Outcome::QuotaExhausted
                } else {
                    Outcome::RateLimited { retry_after }
                };
                self.pool.report(lease, outcome);
                AttemptOutcome::Retry(GatewayError::new(
                    ErrorKind::RateLimited,
                    format!("upstream rate limited: {body}"),
                ))
            }
            400..=499 => {
                self.pool.report(lease, Outcome::Invalid);
                AttemptOutcome::Fatal(GatewayError::invalid_request(format!(
                    "upstream rejected request ({status}): {body}"
                )))
            }
            _ => {
                self.pool.report(lease, Outcome::Upstream);
                AttemptOutcome::Retry(GatewayError::upstream(format!(
                    "upstream error {status}: {body}"
                )))
            }
        }
    }

    async fn send(
        &self,
        config: &GatewayConfig,
        spec: &ExecuteSpec,
        credential: &Credential,
    ) -> Result<UpstreamResponse, crate::upstream::TransportError> {
        let mut payload = spec.payload.clone();
        spec.profile
            .postprocess(&mut payload, credential, &spec.upstream_model, spec.stream);
        let body = serde_json::to_vec(&payload).unwrap_or_default();
        let request = UpstreamRequest {
            url: spec.profile.request_url(&spec.upstream_model, spec.stream),
            headers: spec.profile.auth_headers(credential, config),
            body: Bytes::from(body),
            stream: spec.stream,
        };
        self.client.send(request).await
    }

    /// Full-jitter exponential backoff bounded by `max-retry-interval`.
    async fn backoff(&self, attempt: u32) {
        let cap = BACKOFF_BASE
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_retry_interval);
        let jittered = rand::rng().random_range(Duration::ZERO..=cap);
        tokio::time::sleep(jittered).await;
    }
}

enum AttemptOutcome {
    Done(UpstreamResponse),
    Retry(GatewayError),
    Fatal(GatewayError),
}

fn body_text(response: UpstreamResponse) -> String {
    match response.body {
        UpstreamBody::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        UpstreamBody::Stream(_) => String::new(),
    }
}

fn looks_like_quota(body: &str) -> bool {
    body.contains("RESOURCE_EXHAUSTED") || body.contains("insufficient_quota") || body.contains("quota")
}
