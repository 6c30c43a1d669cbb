//! Target URL validation and canonicalization.
//!
//! Every proxied request names its target with the `url` query parameter. The
//! raw value is normalized into the canonical cache key here, and targets
//! that would let the proxy reach into private address space are rejected
//! before any fetch is attempted.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::Host;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("missing required `url` query parameter")]
    Missing,

    #[error("invalid target url: {0}")]
    Invalid(String),

    #[error("unsupported url scheme `{0}`; only http and https are allowed")]
    UnsupportedScheme(String),

    #[error("target resolves to a private or local address")]
    PrivateAddress,
}

/// Normalizes a raw `url` parameter into the canonical cache key.
///
/// A scheme-less value gets `https://` prefixed before parsing. The parsed
/// URL's own serialization is the key, so `example.com/a` and
/// `https://example.com/a` coalesce onto one cache entry.
pub fn canonicalize_target(raw: Option<&str>) -> Result<String, ValidateError> {
    let raw = match raw {
        Some(value) if !value.trim().is_empty() => value.trim(),
        _ => return Err(ValidateError::Missing),
    };

    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.contains("://") {
        // A non-http scheme must be reported as such, not mangled.
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let parsed = url::Url::parse(&candidate).map_err(|e| ValidateError::Invalid(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ValidateError::UnsupportedScheme(other.to_string())),
    }

    if is_private_host(&parsed)? {
        return Err(ValidateError::PrivateAddress);
    }

    Ok(parsed.to_string())
}

/// True when the target host is loopback, link-local, unique-local, private
/// range, or unspecified. Hostname resolution is out of scope; only literal
/// addresses and `localhost` are checked.
fn is_private_host(parsed: &url::Url) -> Result<bool, ValidateError> {
    let host = parsed
        .host()
        .ok_or_else(|| ValidateError::Invalid("url has no host".to_string()))?;

    Ok(match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(addr) => is_private_v4(addr),
        Host::Ipv6(addr) => is_private_v6(addr),
    })
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
}

fn is_private_v6(addr: Ipv6Addr) -> bool {
    addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_unique_local()
        || addr.is_unicast_link_local()
        || addr
            .to_ipv4_mapped()
            .is_some_and(is_private_v4)
}
