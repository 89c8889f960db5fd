//! Validation of upstream WebSocket endpoints
//!
//! Upstream URLs come from configuration and receive credentials in their
//! handshake headers. This module ensures they:
//! - Use the `ws` or `wss` scheme
//! - Have a host
//! - Are properly formatted
//!
//! Plain `ws://` to a non-loopback host is accepted but logged, since the
//! access token would travel unencrypted.

use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Whether the URL points at this machine.
pub fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

/// Validates an upstream WebSocket URL
///
/// # Returns
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlValidationError)` - Why the URL cannot be used upstream
pub fn validate_upstream_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "wss" => {}
        "ws" => {
            if !is_loopback_host(&parsed) {
                warn!(
                    url = %parsed,
                    "Upstream URL uses unencrypted ws://, credentials will be sent in clear text"
                );
            }
        }
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(parsed)
}
