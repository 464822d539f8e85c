//! Mock geolocation source for tests without network calls.

use super::{GeoError, GeoSource};
use crate::domain::{Coordinates, LocationSource, UserLocation};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns fixed answers and counts calls per path.
#[derive(Debug, Clone)]
pub struct MockGeoSource {
    reverse: Result<(String, Option<String>), GeoError>,
    ip: Result<(String, Option<String>), GeoError>,
    reverse_calls: Arc<AtomicUsize>,
    ip_calls: Arc<AtomicUsize>,
}

impl MockGeoSource {
    /// Both paths fail until configured.
    pub fn new() -> Self {
        Self {
            reverse: Err(GeoError::Other("reverse geocoding unavailable".to_string())),
            ip: Err(GeoError::Other("ip lookup unavailable".to_string())),
            reverse_calls: Arc::new(AtomicUsize::new(0)),
            ip_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_reverse(mut self, country: &str, state: Option<&str>) -> Self {
        self.reverse = Ok((country.to_string(), state.map(str::to_string)));
        self
    }

    pub fn with_reverse_error(mut self, error: GeoError) -> Self {
        self.reverse = Err(error);
        self
    }

    pub fn with_ip(mut self, country: &str, state: Option<&str>) -> Self {
        self.ip = Ok((country.to_string(), state.map(str::to_string)));
        self
    }

    pub fn with_ip_error(mut self, error: GeoError) -> Self {
        self.ip = Err(error);
        self
    }

    pub fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }

    pub fn ip_calls(&self) -> usize {
        self.ip_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGeoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoSource for MockGeoSource {
    async fn reverse_geocode(&self, _coords: Coordinates) -> Result<UserLocation, GeoError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        self.reverse
            .clone()
            .map(|(c, s)| UserLocation::new(&c, s.as_deref(), LocationSource::Browser))
    }

    async fn lookup_ip(&self, _ip: Option<IpAddr>) -> Result<UserLocation, GeoError> {
        self.ip_calls.fetch_add(1, Ordering::SeqCst);
        self.ip
            .clone()
            .map(|(c, s)| UserLocation::new(&c, s.as_deref(), LocationSource::Ip))
    }
}
