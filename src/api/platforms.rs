//! Platform catalog filtered by jurisdiction, and promotional permissions.

use super::{parse_user, AppState};
use crate::domain::{Decimal, LocationSource, PlatformCategory, PlatformId, TimeMs, UserLocation};
use crate::engine::{
    available_platforms, is_feature_enabled, permissions_for, PermissionLevel, PromoFeature,
    PromoFeatures,
};
use crate::error::AppError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformsQuery {
    pub user: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformView {
    pub id: PlatformId,
    pub display_name: &'static str,
    pub category: PlatformCategory,
}

#[derive(Debug, Serialize)]
pub struct PlatformsResponse {
    /// Location the list was filtered by; absent when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<UserLocation>,
    pub platforms: Vec<PlatformView>,
}

pub async fn get_platforms(
    Query(params): Query<PlatformsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PlatformsResponse>, AppError> {
    let location = match (&params.country_code, &params.user) {
        (Some(country), _) => Some(UserLocation::new(
            country,
            params.state_code.as_deref(),
            LocationSource::Manual,
        )),
        (None, Some(user)) => {
            let user = parse_user(user)?;
            state.location.cached_location(&user, TimeMs::now()).await
        }
        (None, None) => None,
    };

    let platforms = available_platforms(location.as_ref())
        .into_iter()
        .map(|id| PlatformView {
            id,
            display_name: id.display_name(),
            category: id.category(),
        })
        .collect();
    Ok(Json(PlatformsResponse {
        location,
        platforms,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PromotionsQuery {
    pub feature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionsResponse {
    pub state_code: String,
    pub level: PermissionLevel,
    pub bonus_multiplier: Decimal,
    pub features: PromoFeatures,
    /// Present when a single feature was asked about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

pub async fn get_promotions(
    Path(state_code): Path<String>,
    Query(params): Query<PromotionsQuery>,
) -> Result<Json<PromotionsResponse>, AppError> {
    let state_code = state_code.trim().to_ascii_uppercase();
    let enabled = match params.feature.as_deref() {
        Some(raw) => {
            let feature: PromoFeature = raw.parse().map_err(AppError::BadRequest)?;
            Some(is_feature_enabled(Some(&state_code), feature))
        }
        None => None,
    };
    let permissions = permissions_for(Some(&state_code));
    Ok(Json(PromotionsResponse {
        state_code,
        level: permissions.level,
        bonus_multiplier: permissions.bonus_multiplier,
        features: permissions.features,
        enabled,
    }))
}
