//! Validation of the realtime endpoint URL.
//!
//! The API key travels in the handshake headers, so the endpoint must be a
//! `wss://` URL. Plain `ws://` is accepted only for loopback hosts, which is
//! how local test servers are reached.

use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be wss, got: {0}")]
    SecureWebSocketRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL must not carry a query string; the model is appended automatically")]
    QueryNotAllowed,
}

fn is_loopback(host: Option<Host<&str>>) -> bool {
    match host {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Check a realtime base URL such as `wss://api.openai.com/v1/realtime`.
pub fn validate_realtime_url(url: &str) -> Result<(), UrlValidationError> {
    let parsed = Url::parse(url)?;

    if parsed.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }
    if parsed.query().is_some() {
        return Err(UrlValidationError::QueryNotAllowed);
    }

    match parsed.scheme() {
        "wss" => Ok(()),
        "ws" if is_loopback(parsed.host()) => Ok(()),
        scheme => {
            warn!(url = %url, "Realtime URL is not a secure WebSocket endpoint");
            Err(UrlValidationError::SecureWebSocketRequired(
                scheme.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_is_valid() {
        assert!(validate_realtime_url("wss://api.openai.com/v1/realtime").is_ok());
    }

    #[test]
    fn test_plain_ws_only_on_loopback() {
        assert!(validate_realtime_url("ws://127.0.0.1:9000/v1/realtime").is_ok());
        assert!(validate_realtime_url("ws://localhost:9000").is_ok());
        assert!(validate_realtime_url("ws://[::1]:9000").is_ok());
        assert!(matches!(
            validate_realtime_url("ws://api.openai.com/v1/realtime"),
            Err(UrlValidationError::SecureWebSocketRequired(_))
        ));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_realtime_url("https://api.openai.com/v1/realtime"),
            Err(UrlValidationError::SecureWebSocketRequired(s)) if s == "https"
        ));
    }

    #[test]
    fn test_rejects_query_and_garbage() {
        assert!(matches!(
            validate_realtime_url("wss://api.openai.com/v1/realtime?model=x"),
            Err(UrlValidationError::QueryNotAllowed)
        ));
        assert!(matches!(
            validate_realtime_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }
}
