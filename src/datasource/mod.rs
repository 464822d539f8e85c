//! Geolocation providers: reverse geocoding of device coordinates and IP
//! lookup.

use crate::domain::{Coordinates, UserLocation};
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

pub mod http;
pub mod mock;

pub use http::HttpGeoSource;
pub use mock::MockGeoSource;

/// Source of jurisdiction data.
///
/// Implementations bound every call with a timeout; callers treat any error
/// as terminal for that path and fall through to the next one.
#[async_trait]
pub trait GeoSource: Send + Sync + fmt::Debug {
    /// Resolve device coordinates to a location tagged `browser`.
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<UserLocation, GeoError>;

    /// Resolve a client IP (or the caller's own address when `None`) to a
    /// location tagged `ip`.
    async fn lookup_ip(&self, ip: Option<IpAddr>) -> Result<UserLocation, GeoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    /// Connection failure, DNS failure, etc.
    NetworkError(String),
    HttpError { status: u16, message: String },
    ParseError(String),
    RateLimited,
    /// The call did not finish within the configured timeout.
    Timeout(u64),
    /// Several providers failed; one message per provider.
    AllFailed(Vec<String>),
    Other(String),
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            GeoError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            GeoError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            GeoError::RateLimited => write!(f, "Rate limited"),
            GeoError::Timeout(ms) => write!(f, "Timed out after {}ms", ms),
            GeoError::AllFailed(errors) => write!(f, "All providers failed: {}", errors.join("; ")),
            GeoError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GeoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_error_display() {
        assert_eq!(
            GeoError::NetworkError("dns".to_string()).to_string(),
            "Network error: dns"
        );
        assert_eq!(
            GeoError::HttpError {
                status: 503,
                message: "Server error".to_string()
            }
            .to_string(),
            "HTTP error 503: Server error"
        );
        assert_eq!(GeoError::Timeout(5000).to_string(), "Timed out after 5000ms");
        assert_eq!(
            GeoError::AllFailed(vec!["a".to_string(), "b".to_string()]).to_string(),
            "All providers failed: a; b"
        );
    }
}
