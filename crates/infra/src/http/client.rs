use std::time::Duration;

use calbridge_domain::CalBridgeError;
use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// Transport settings for the calendar provider.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    /// Total tries for a read, including the first.
    pub read_attempts: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), read_attempts: 3, retry_delay: Duration::from_millis(200) }
    }
}

/// Provider HTTP transport. Reads are retried on 5xx and transport
/// failures, writes go out once.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    settings: HttpSettings,
}

impl HttpClient {
    /// Client with [`HttpSettings::default`].
    pub fn new() -> Result<Self, CalBridgeError> {
        Self::with_settings(HttpSettings::default())
    }

    pub fn with_settings(settings: HttpSettings) -> Result<Self, CalBridgeError> {
        let inner = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("calbridge/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(transport_error)?;
        Ok(Self { inner, settings })
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.inner.request(method, url)
    }

    /// Send a read, retrying server errors and transport failures.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CalBridgeError> {
        let request = builder.build().map_err(transport_error)?;
        let attempts = self.settings.read_attempts.max(1);
        let mut delay = self.settings.retry_delay;

        for attempt in 1..=attempts {
            let last = attempt == attempts;
            let outcome = self.inner.execute(clone_request(&request)?).await;
            debug!(attempt, method = %request.method(), path = request.url().path(), "Provider request");

            match outcome {
                Ok(response) if response.status().is_server_error() && !last => {
                    debug!(attempt, status = %response.status(), "Retrying provider server error");
                }
                Ok(response) => return Ok(response),
                Err(err) if !last && (err.is_timeout() || err.is_connect()) => {
                    debug!(attempt, error = %err, "Retrying provider transport failure");
                }
                Err(err) => return Err(transport_error(err)),
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            delay = delay.saturating_mul(2);
        }

        Err(CalBridgeError::Internal("provider request produced no response".into()))
    }

    /// Send a write exactly once.
    pub async fn send_once(&self, builder: RequestBuilder) -> Result<Response, CalBridgeError> {
        builder.send().await.map_err(transport_error)
    }
}

fn clone_request(request: &Request) -> Result<Request, CalBridgeError> {
    request
        .try_clone()
        .ok_or_else(|| CalBridgeError::Internal("streaming request bodies cannot be retried".into()))
}

fn transport_error(err: reqwest::Error) -> CalBridgeError {
    CalBridgeError::from(InfraError::from(err))
}
