//! HTTP geolocation: bigdatacloud reverse geocoding, ipapi.co / freegeoip.app
//! IP lookup.

use super::{GeoError, GeoSource};
use crate::config::GeoConfig;
use crate::domain::{Coordinates, LocationSource, UserLocation};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpProvider {
    /// `{base}/{ip}/json/`
    Ipapi,
    /// `{base}/json/{ip}`
    FreeGeoIp,
}

impl IpProvider {
    fn for_url(base_url: &str) -> Self {
        if base_url.contains("ipapi.co") {
            IpProvider::Ipapi
        } else {
            IpProvider::FreeGeoIp
        }
    }

    fn url(&self, base_url: &str, ip: Option<IpAddr>) -> String {
        match (self, ip) {
            (IpProvider::Ipapi, Some(ip)) => format!("{}/{}/json/", base_url, ip),
            (IpProvider::Ipapi, None) => format!("{}/json/", base_url),
            (IpProvider::FreeGeoIp, Some(ip)) => format!("{}/json/{}", base_url, ip),
            (IpProvider::FreeGeoIp, None) => format!("{}/json/", base_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGeoSource {
    client: Client,
    config: GeoConfig,
}

impl HttpGeoSource {
    pub fn new(config: GeoConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// GET with transient-error backoff, bounded as a whole by the timeout.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, GeoError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.timeout()),
            ..Default::default()
        };

        let request = retry(backoff, || async {
            let response = self.client.get(url).send().await.map_err(|e| {
                backoff::Error::transient(GeoError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(GeoError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(GeoError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(GeoError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(GeoError::ParseError(e.to_string())))
        });

        match tokio::time::timeout(self.timeout(), request).await {
            Ok(result) => result,
            Err(_) => Err(GeoError::Timeout(self.config.timeout_ms)),
        }
    }
}

#[async_trait]
impl GeoSource for HttpGeoSource {
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<UserLocation, GeoError> {
        if !coords.is_valid() {
            return Err(GeoError::Other("coordinates out of range".to_string()));
        }
        let url = format!(
            "{}/data/reverse-geocode-client?latitude={}&longitude={}&localityLanguage=en",
            self.config.reverse_geocode_url, coords.latitude, coords.longitude
        );
        debug!("Reverse geocoding {}", url);
        let json = self.get_json(&url).await?;
        parse_location(&json, LocationSource::Browser)
    }

    async fn lookup_ip(&self, ip: Option<IpAddr>) -> Result<UserLocation, GeoError> {
        let mut errors = Vec::new();
        for base_url in &self.config.ip_lookup_urls {
            let url = IpProvider::for_url(base_url).url(base_url, ip);
            let result = self
                .get_json(&url)
                .await
                .and_then(|json| parse_location(&json, LocationSource::Ip));
            match result {
                Ok(location) => return Ok(location),
                Err(e) => {
                    warn!(provider = %base_url, error = %e, "IP geolocation provider failed");
                    errors.push(format!("{}: {}", base_url, e));
                }
            }
        }
        Err(GeoError::AllFailed(errors))
    }
}

fn str_field<'a>(json: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| json.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Accepts bigdatacloud (`countryCode`, `principalSubdivisionCode`) and
/// ipapi/freegeoip (`country_code`, `region_code`) shapes.
fn parse_location(
    json: &serde_json::Value,
    source: LocationSource,
) -> Result<UserLocation, GeoError> {
    if json.get("error").and_then(|v| v.as_bool()) == Some(true) {
        let reason = str_field(json, &["reason", "message"]).unwrap_or("provider error");
        return Err(GeoError::Other(reason.to_string()));
    }

    let country = str_field(json, &["countryCode", "country_code", "country"])
        .ok_or_else(|| GeoError::ParseError("missing country code".to_string()))?;
    if country.len() != 2 {
        return Err(GeoError::ParseError(format!("invalid country code: {}", country)));
    }
    let state = str_field(json, &["principalSubdivisionCode", "region_code", "regionCode"]);

    Ok(UserLocation::new(country, state, source))
}
