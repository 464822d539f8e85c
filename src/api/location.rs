//! Location detection and manual overrides.

use super::{parse_user, AppState};
use crate::domain::{Coordinates, TimeMs, UserLocation};
use crate::error::AppError;
use crate::orchestration::DetectRequest;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectBody {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub client_ip: Option<String>,
    pub force_refresh: bool,
}

/// Client address from the body, else the first `X-Forwarded-For` hop.
fn client_ip(body: &DetectBody, headers: &HeaderMap) -> Result<Option<IpAddr>, AppError> {
    if let Some(raw) = body.client_ip.as_deref() {
        return raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid clientIp: {}", raw)));
    }
    Ok(headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok()))
}

pub async fn detect(
    Path(user): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DetectBody>,
) -> Result<Json<UserLocation>, AppError> {
    let user = parse_user(&user)?;
    let coords = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "latitude and longitude must be sent together".to_string(),
            ))
        }
    };
    let request = DetectRequest {
        coords,
        client_ip: client_ip(&body, &headers)?,
        force_refresh: body.force_refresh,
    };
    let location = state
        .location
        .detect_location(&user, &request, TimeMs::now())
        .await?;
    Ok(Json(location))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualLocationBody {
    pub country_code: String,
    pub state_code: Option<String>,
}

pub async fn set_manual(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ManualLocationBody>,
) -> Result<Json<UserLocation>, AppError> {
    let user = parse_user(&user)?;
    let location = state
        .location
        .set_manual_location(&user, &body.country_code, body.state_code.as_deref())
        .await?;
    Ok(Json(location))
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}

pub async fn clear_manual(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClearedResponse>, AppError> {
    let user = parse_user(&user)?;
    let cleared = state.location.clear_manual_location(&user).await;
    Ok(Json(ClearedResponse { cleared }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_body_then_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        let from_header = client_ip(&DetectBody::default(), &headers).unwrap();
        assert_eq!(from_header, Some("203.0.113.7".parse().unwrap()));

        let body = DetectBody {
            client_ip: Some("198.51.100.2".to_string()),
            ..Default::default()
        };
        assert_eq!(
            client_ip(&body, &headers).unwrap(),
            Some("198.51.100.2".parse().unwrap())
        );

        let bad = DetectBody {
            client_ip: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        assert!(client_ip(&bad, &headers).is_err());
        assert_eq!(client_ip(&DetectBody::default(), &HeaderMap::new()).unwrap(), None);
    }
}
