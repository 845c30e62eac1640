use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Hard cap on response body size. A collection listing that exceeds this is
/// almost certainly a misconfigured endpoint, not real data.
pub(crate) const MAX_BODY_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Maximum redirect hops before a request is failed.
const MAX_REDIRECTS: usize = 3;

/// Errors surfaced by the API layer.
///
/// `Cancelled` is special: it marks a request that was intentionally aborted
/// or superseded, never a failure. Callers that absorb cancellations can test
/// for it with [`ApiError::is_cancelled`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request intentionally aborted or superseded by a newer one.
    #[error("Request cancelled")]
    Cancelled,
    /// HTTP response with non-2xx status code.
    #[error("Request failed: status {0}")]
    RequestFailed(u16),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,
    /// Response body was not valid JSON for the expected type.
    #[error("Invalid response body: {0}")]
    Decode(String),
    /// Response body exceeded the size limit.
    #[error("Response too large")]
    BodyTooLarge,
}

impl ApiError {
    /// True for intentional aborts, which callers typically absorb rather
    /// than report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

/// HTTP client bound to a validated base address.
///
/// Built once at startup from configuration and handed by reference to every
/// [`ResourceService`](crate::api::ResourceService); there is no ambient
/// global client. Cloning is cheap: the underlying `reqwest::Client` is a
/// shared handle.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client for the given base address.
    ///
    /// `base_url` should come from [`validate_base_url`](crate::util::validate_base_url);
    /// `timeout` bounds every individual request issued through this client.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Read a response body with a size limit.
///
/// Checks the Content-Length header first, then enforces the limit while
/// streaming so a missing or lying header cannot exhaust memory.
pub(crate) async fn read_limited_body(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::BodyTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::BodyTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
