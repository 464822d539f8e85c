//! Jurisdiction resolution: manual override, then cache, then device
//! coordinates, then IP lookup.

use crate::config::GeoConfig;
use crate::datasource::GeoSource;
use crate::domain::{Coordinates, LocationSource, TimeMs, UserId, UserLocation};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("{0}")]
    Invalid(String),
    /// Every resolution path failed; one message per path.
    #[error("could not determine location: {}", .0.join("; "))]
    Unresolved(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct DetectRequest {
    pub coords: Option<Coordinates>,
    pub client_ip: Option<IpAddr>,
    /// Skip the cache (manual overrides still win).
    pub force_refresh: bool,
}

#[derive(Debug, Clone)]
struct CachedLocation {
    location: UserLocation,
    expires: TimeMs,
}

pub struct LocationResolver {
    source: Arc<dyn GeoSource>,
    browser_ttl_ms: i64,
    ip_ttl_ms: i64,
    cache: RwLock<HashMap<UserId, CachedLocation>>,
    manual: RwLock<HashMap<UserId, UserLocation>>,
}

impl LocationResolver {
    pub fn new(source: Arc<dyn GeoSource>, config: &GeoConfig) -> Self {
        Self {
            source,
            browser_ttl_ms: secs_to_ms(config.browser_ttl_secs),
            ip_ttl_ms: secs_to_ms(config.ip_ttl_secs),
            cache: RwLock::new(HashMap::new()),
            manual: RwLock::new(HashMap::new()),
        }
    }

    pub async fn detect_location(
        &self,
        user: &UserId,
        request: &DetectRequest,
        now: TimeMs,
    ) -> Result<UserLocation, LocationError> {
        if let Some(location) = self.manual.read().await.get(user) {
            return Ok(location.clone());
        }
        if !request.force_refresh {
            if let Some(location) = self.fresh_cached(user, now).await {
                debug!(user = %user, "Location served from cache");
                return Ok(location);
            }
        }

        let mut errors = Vec::new();

        if let Some(coords) = request.coords {
            if !coords.is_valid() {
                errors.push("browser: invalid coordinates".to_string());
            } else {
                match self.source.reverse_geocode(coords).await {
                    Ok(location) => {
                        return Ok(self.remember(user, location, self.browser_ttl_ms, now).await)
                    }
                    Err(e) => {
                        warn!(user = %user, error = %e, "Reverse geocoding failed, trying IP");
                        errors.push(format!("browser: {}", e));
                    }
                }
            }
        }

        match self.source.lookup_ip(request.client_ip).await {
            Ok(location) => Ok(self.remember(user, location, self.ip_ttl_ms, now).await),
            Err(e) => {
                warn!(user = %user, error = %e, "IP geolocation failed");
                errors.push(format!("ip: {}", e));
                Err(LocationError::Unresolved(errors))
            }
        }
    }

    /// Pin a user's location. Wins over every detected source until cleared.
    pub async fn set_manual_location(
        &self,
        user: &UserId,
        country_code: &str,
        state_code: Option<&str>,
    ) -> Result<UserLocation, LocationError> {
        let country = country_code.trim();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LocationError::Invalid(
                "countryCode must be a two-letter ISO code".to_string(),
            ));
        }
        let location = UserLocation::new(country, state_code, LocationSource::Manual);
        if let Some(state) = &location.state_code {
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(LocationError::Invalid(
                    "stateCode must be a two-letter code".to_string(),
                ));
            }
        }

        self.manual
            .write()
            .await
            .insert(user.clone(), location.clone());
        info!(user = %user, country = %location.country_code, "Manual location set");
        Ok(location)
    }

    /// Returns true if an override was removed.
    pub async fn clear_manual_location(&self, user: &UserId) -> bool {
        self.manual.write().await.remove(user).is_some()
    }

    /// Manual override or unexpired cached location, without any lookups.
    pub async fn cached_location(&self, user: &UserId, now: TimeMs) -> Option<UserLocation> {
        if let Some(location) = self.manual.read().await.get(user) {
            return Some(location.clone());
        }
        self.fresh_cached(user, now).await
    }

    /// Drop cached locations that have expired. Returns how many were removed.
    pub async fn prune_expired(&self, now: TimeMs) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, c| c.expires > now);
        before - cache.len()
    }

    async fn fresh_cached(&self, user: &UserId, now: TimeMs) -> Option<UserLocation> {
        self.cache
            .read()
            .await
            .get(user)
            .filter(|c| c.expires > now)
            .map(|c| c.location.clone())
    }

    async fn remember(
        &self,
        user: &UserId,
        location: UserLocation,
        ttl_ms: i64,
        now: TimeMs,
    ) -> UserLocation {
        self.cache.write().await.insert(
            user.clone(),
            CachedLocation {
                location: location.clone(),
                expires: now.plus_ms(ttl_ms),
            },
        );
        location
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{GeoError, MockGeoSource};

    const NOW: TimeMs = TimeMs(1_715_778_000_000);

    fn user() -> UserId {
        UserId::new("alice".to_string())
    }

    fn resolver(mock: &MockGeoSource) -> LocationResolver {
        LocationResolver::new(Arc::new(mock.clone()), &GeoConfig::default())
    }

    fn with_coords() -> DetectRequest {
        DetectRequest {
            coords: Some(Coordinates {
                latitude: 40.7357,
                longitude: -74.1724,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_coords_resolve_as_browser() {
        let mock = MockGeoSource::new().with_reverse("US", Some("NJ"));
        let resolver = resolver(&mock);
        let location = resolver
            .detect_location(&user(), &with_coords(), NOW)
            .await
            .unwrap();
        assert_eq!(location.source, LocationSource::Browser);
        assert_eq!(location.state_code.as_deref(), Some("NJ"));
        assert_eq!(mock.ip_calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_ip_when_reverse_fails() {
        let mock = MockGeoSource::new()
            .with_reverse_error(GeoError::Timeout(5_000))
            .with_ip("US", Some("PA"));
        let resolver = resolver(&mock);
        let location = resolver
            .detect_location(&user(), &with_coords(), NOW)
            .await
            .unwrap();
        assert_eq!(location.source, LocationSource::Ip);
        assert_eq!(location.state_code.as_deref(), Some("PA"));
        assert_eq!(mock.reverse_calls(), 1);
    }

    #[tokio::test]
    async fn test_all_paths_failing_reports_each() {
        let mock = MockGeoSource::new()
            .with_reverse_error(GeoError::RateLimited)
            .with_ip_error(GeoError::AllFailed(vec!["ipapi: down".to_string()]));
        let resolver = resolver(&mock);
        let err = resolver
            .detect_location(&user(), &with_coords(), NOW)
            .await
            .unwrap_err();
        match err {
            LocationError::Unresolved(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].starts_with("browser:"));
                assert!(errors[1].starts_with("ip:"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cache_ttl_depends_on_source() {
        let mock = MockGeoSource::new().with_ip("US", Some("NY"));
        let resolver = resolver(&mock);
        resolver
            .detect_location(&user(), &DetectRequest::default(), NOW)
            .await
            .unwrap();

        // IP results live 30 minutes.
        let later = NOW.plus_ms(29 * 60_000);
        resolver
            .detect_location(&user(), &DetectRequest::default(), later)
            .await
            .unwrap();
        assert_eq!(mock.ip_calls(), 1);

        let expired = NOW.plus_ms(31 * 60_000);
        assert!(resolver.cached_location(&user(), expired).await.is_none());
        resolver
            .detect_location(&user(), &DetectRequest::default(), expired)
            .await
            .unwrap();
        assert_eq!(mock.ip_calls(), 2);
    }

    #[tokio::test]
    async fn test_prune_expired_keeps_fresh_entries() {
        let mock = MockGeoSource::new()
            .with_reverse("US", Some("NJ"))
            .with_ip("US", Some("NY"));
        let resolver = resolver(&mock);
        let bob = UserId::new("bob".to_string());
        resolver
            .detect_location(&user(), &with_coords(), NOW)
            .await
            .unwrap();
        resolver
            .detect_location(&bob, &DetectRequest::default(), NOW)
            .await
            .unwrap();

        // Browser entries live 5 minutes, IP entries 30.
        let later = NOW.plus_ms(6 * 60_000);
        assert_eq!(resolver.prune_expired(later).await, 1);
        assert_eq!(resolver.prune_expired(later).await, 0);
        assert!(resolver.cached_location(&bob, later).await.is_some());
    }

    #[tokio::test]
    async fn test_manual_override_wins_until_cleared() {
        let mock = MockGeoSource::new().with_ip("US", Some("NY"));
        let resolver = resolver(&mock);

        let manual = resolver
            .set_manual_location(&user(), "us", Some("us-nv"))
            .await
            .unwrap();
        assert_eq!(manual.state_code.as_deref(), Some("NV"));

        let request = DetectRequest {
            force_refresh: true,
            ..Default::default()
        };
        let location = resolver.detect_location(&user(), &request, NOW).await.unwrap();
        assert_eq!(location.source, LocationSource::Manual);
        assert_eq!(mock.ip_calls(), 0);

        assert!(resolver.clear_manual_location(&user()).await);
        assert!(!resolver.clear_manual_location(&user()).await);
        let location = resolver.detect_location(&user(), &request, NOW).await.unwrap();
        assert_eq!(location.source, LocationSource::Ip);
    }

    #[tokio::test]
    async fn test_manual_location_validation() {
        let resolver = resolver(&MockGeoSource::new());
        assert!(matches!(
            resolver.set_manual_location(&user(), "USA", None).await,
            Err(LocationError::Invalid(_))
        ));
        assert!(matches!(
            resolver
                .set_manual_location(&user(), "US", Some("New Jersey"))
                .await,
            Err(LocationError::Invalid(_))
        ));
    }
}
