use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the configured base address.
#[derive(Error, Debug)]
pub enum BaseUrlError {
    /// The URL string could not be parsed.
    #[error("Invalid base URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL carries a query string or fragment, which the endpoint path
    /// would silently discard.
    #[error("Base URL must not contain a query or fragment")]
    UnexpectedComponents,
}

/// Validates the base address every request is issued against.
///
/// The base URL is operator-supplied configuration, so the policy is
/// deliberately looser than for untrusted input: plain http is accepted
/// (self-hosted and local backends are a normal setup), but anything outside
/// http/https is rejected, as are query strings and fragments.
pub fn validate_base_url(raw: &str) -> Result<Url, BaseUrlError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(BaseUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(BaseUrlError::UnexpectedComponents);
    }

    Ok(url)
}
