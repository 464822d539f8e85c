//! User jurisdiction and its provenance.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Browser,
    Ip,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    /// ISO 3166-1 alpha-2, upper case.
    pub country_code: String,
    /// Two-letter subdivision code (US state) when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub source: LocationSource,
}

impl UserLocation {
    /// Normalizes codes to upper case and drops empty state codes.
    pub fn new(country_code: &str, state_code: Option<&str>, source: LocationSource) -> Self {
        UserLocation {
            country_code: country_code.trim().to_ascii_uppercase(),
            state_code: state_code
                .map(|s| normalize_state_code(s.trim()))
                .filter(|s| !s.is_empty()),
            source,
        }
    }

    pub fn is_us(&self) -> bool {
        self.country_code == "US"
    }

    /// State code, only when the location is in the US.
    pub fn us_state(&self) -> Option<&str> {
        if self.is_us() {
            self.state_code.as_deref()
        } else {
            None
        }
    }
}

/// Accepts `NJ`, `nj` and ISO 3166-2 `US-NJ`.
fn normalize_state_code(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    match upper.strip_prefix("US-") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

/// Device coordinates reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
