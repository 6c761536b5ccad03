//! Search client and request pipeline
//!
//! Orchestrates authentication, rate limiting, the outbound HTTP call,
//! failure classification, and the retry loop.

use crate::auth::Authenticator;
use crate::config::Settings;
use crate::error::Error;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::models::{ApiResponse, SearchRequest, SearchResponse};
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Client for the Z.AI web search API.
///
/// One instance owns its HTTP connection pool, rate limiter, and metrics;
/// independently configured clients never share admission state.
pub struct SearchClient {
    settings: Settings,
    authenticator: Authenticator,
    http: reqwest::Client,
    search_endpoint: String,
    limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
}

impl SearchClient {
    /// Create a client from validated settings
    pub fn new(settings: Settings) -> Result<Self, Error> {
        settings.validate()?;

        let authenticator = Authenticator::from_settings(&settings.api)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.api.timeout_seconds))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build http client: {}", e)))?;

        let search_endpoint = format!("{}/search", settings.api.base_url.trim_end_matches('/'));
        let limiter = Arc::new(RateLimiter::new(
            settings.rate_limit.max_requests,
            Duration::from_secs(settings.rate_limit.window_seconds),
        ));

        debug!(
            max_requests = settings.rate_limit.max_requests,
            window_seconds = settings.rate_limit.window_seconds,
            max_retries = settings.api.max_retries,
            "search client initialized"
        );

        Ok(Self {
            settings,
            authenticator,
            http,
            search_endpoint,
            limiter,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Create a client from an API key with default settings
    pub fn from_api_key(api_key: impl Into<String>) -> Result<Self, Error> {
        let mut settings = Settings::default();
        settings.api.api_key = api_key.into();
        Self::new(settings)
    }

    /// Perform a search for a query with default parameters
    pub async fn search(&self, query: impl Into<String>) -> Result<SearchResponse, Error> {
        self.execute(&SearchRequest::new(query)).await
    }

    /// Perform a search with a fully specified request
    pub async fn search_with(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        self.execute(request).await
    }

    /// Execute the request pipeline: validate, admit, call, classify, retry.
    ///
    /// Retries only rate-limit, server, and network failures, up to the
    /// configured bound; each retry re-acquires a rate-limit token since it
    /// is a new outbound call. The last classified error is surfaced
    /// unchanged.
    pub async fn execute(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        request.validate()?;

        self.metrics.inc_search();
        let started = Instant::now();
        let max_retries = self.settings.api.max_retries;
        let mut attempt: u32 = 0;

        info!(query = %request.query, search_type = %request.search_type, "searching");

        loop {
            let waited = self.limiter.wait_if_needed().await;
            if !waited.is_zero() {
                debug!(waited_secs = waited.as_secs_f64(), "rate limited before attempt");
            }

            match self.attempt(request).await {
                Ok(response) => {
                    let elapsed = started.elapsed();
                    self.metrics.record_success();
                    self.metrics.record_response_time(elapsed.as_millis() as u64);
                    info!(
                        query = %request.query,
                        results = response.results.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "search completed"
                    );
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    let delay = self.backoff_delay(attempt, &err);
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "retryable failure, backing off"
                    );
                    self.metrics.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(query = %request.query, error = %err, "search failed");
                    self.metrics.record_failure(err.kind());
                    return Err(err);
                }
            }
        }
    }

    /// Make a single outbound attempt and classify the outcome
    async fn attempt(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        let headers = self.authenticator.headers()?;

        let response = self
            .http
            .post(&self.search_endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let text = response.text().await.map_err(map_transport_error)?;
            let raw: ApiResponse = serde_json::from_str(&text).map_err(|e| {
                // A 2xx we cannot parse means the upstream contract is broken
                Error::InvalidRequest {
                    message: format!("failed to parse api response: {}", e),
                    status: Some(status.as_u16()),
                    body: serde_json::from_str(&text).ok(),
                }
            })?;
            return Ok(raw.into_response(request));
        }

        let header_hint = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok());
        let text = response.text().await.unwrap_or_default();

        Err(classify_status(status, &text, header_hint))
    }

    /// Compute the delay before the next retry attempt.
    ///
    /// Exponential backoff with ±10% jitter, capped at the configured
    /// maximum; a server retry-after hint larger than the computed delay
    /// takes precedence verbatim.
    fn backoff_delay(&self, attempt: u32, err: &Error) -> Duration {
        let initial = self.settings.retry.initial_backoff_seconds;
        let cap = self.settings.retry.max_backoff_seconds;
        let computed = (initial * 2f64.powi(attempt as i32)).min(cap);

        if let Some(hint) = err.retry_after() {
            if hint > computed {
                return Duration::from_secs_f64(hint);
            }
        }

        let jitter = rand::thread_rng().gen_range(0.9..1.1);
        Duration::from_secs_f64((computed * jitter).min(cap))
    }

    /// The shared rate limiter for this client
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Metrics collected by this client
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// The settings this client was built with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Map a reqwest transport failure to a classified network error
fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::network("request timed out")
    } else if err.is_connect() {
        Error::network(format!("failed to connect: {}", err))
    } else {
        Error::network(format!("request failed: {}", err))
    }
}

/// Classify a non-2xx HTTP response
fn classify_status(status: StatusCode, body_text: &str, header_hint: Option<f64>) -> Error {
    let body: Option<serde_json::Value> = serde_json::from_str(body_text).ok();
    let code = status.as_u16();

    match code {
        401 => Error::Authentication {
            message: "authentication failed, check your api key".to_string(),
            status: Some(code),
            body,
        },
        429 => {
            let body_hint = body
                .as_ref()
                .and_then(|v| v.get("retry_after"))
                .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));
            Error::RateLimit {
                message: "rate limit exceeded, try again later".to_string(),
                status: Some(code),
                body,
                retry_after: body_hint.or(header_hint),
            }
        }
        400..=499 => Error::InvalidRequest {
            message: format!("request rejected with status {}", code),
            status: Some(code),
            body,
        },
        500..=599 => Error::Server {
            message: format!("server error with status {}", code),
            status: Some(code),
            body,
        },
        // Redirects are followed by the transport; anything else landing
        // here is an upstream fault
        _ => Error::Server {
            message: format!("unexpected status {}", code),
            status: Some(code),
            body,
        },
    }
}
