use crate::domain::PlatformId;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub geo: GeoConfig,
    pub sweep_interval_secs: u64,
    pub stale_transfer_secs: i64,
    pub trusted_recipient_min_transfers: i64,
    pub default_platforms: Vec<PlatformId>,
}

/// Geolocation provider settings.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub reverse_geocode_url: String,
    /// IP lookup providers, tried in order.
    pub ip_lookup_urls: Vec<String>,
    pub timeout_ms: u64,
    pub browser_ttl_secs: u64,
    pub ip_ttl_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            reverse_geocode_url: "https://api.bigdatacloud.net".to_string(),
            ip_lookup_urls: vec![
                "https://ipapi.co".to_string(),
                "https://freegeoip.app".to_string(),
            ],
            timeout_ms: 5_000,
            browser_ttl_secs: 300,
            ip_ttl_secs: 1_800,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let defaults = GeoConfig::default();
        let reverse_geocode_url = env_map
            .get("GEO_REVERSE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.reverse_geocode_url);

        let ip_lookup_urls = match env_map.get("GEO_IP_URLS") {
            Some(urls) => urls
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.ip_lookup_urls,
        };

        let timeout_ms = parse_or(
            &env_map,
            "GEO_TIMEOUT_MS",
            defaults.timeout_ms,
            "must be a valid u64",
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "GEO_TIMEOUT_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let geo = GeoConfig {
            reverse_geocode_url,
            ip_lookup_urls,
            timeout_ms,
            browser_ttl_secs: parse_or(
                &env_map,
                "BROWSER_LOCATION_TTL_SECS",
                defaults.browser_ttl_secs,
                "must be a valid u64",
            )?,
            ip_ttl_secs: parse_or(
                &env_map,
                "IP_LOCATION_TTL_SECS",
                defaults.ip_ttl_secs,
                "must be a valid u64",
            )?,
        };

        let sweep_interval_secs =
            parse_or(&env_map, "SWEEP_INTERVAL_SECS", 60u64, "must be a valid u64")?;

        let stale_transfer_secs =
            parse_or(&env_map, "STALE_TRANSFER_SECS", 300i64, "must be a valid i64")?;

        let trusted_recipient_min_transfers = parse_or(
            &env_map,
            "TRUSTED_RECIPIENT_MIN_TRANSFERS",
            3i64,
            "must be a valid i64",
        )?;

        let default_platforms = parse_platforms_from_map(&env_map)?;

        Ok(Config {
            port,
            database_path,
            geo,
            sweep_interval_secs,
            stale_transfer_secs,
            trusted_recipient_min_transfers,
            default_platforms,
        })
    }

    /// Settings suitable for tests: no network, sweeper off.
    pub fn for_database(database_path: &str) -> Self {
        Config {
            port: 0,
            database_path: database_path.to_string(),
            geo: GeoConfig {
                reverse_geocode_url: "http://example.invalid".to_string(),
                ip_lookup_urls: vec!["http://example.invalid".to_string()],
                ..GeoConfig::default()
            },
            sweep_interval_secs: 0,
            stale_transfer_secs: 300,
            trusted_recipient_min_transfers: 3,
            default_platforms: PlatformId::ALL.to_vec(),
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), reason.to_string())),
        None => Ok(default),
    }
}

fn parse_platforms_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<PlatformId>, ConfigError> {
    let Some(raw) = env_map.get("DEFAULT_PLATFORMS") else {
        return Ok(PlatformId::ALL.to_vec());
    };

    let mut platforms = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let platform = PlatformId::from_str(part).map_err(|e| {
            ConfigError::InvalidValue("DEFAULT_PLATFORMS".to_string(), e.to_string())
        })?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}
