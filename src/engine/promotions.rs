//! Per-state promotional permission table.
//!
//! Unknown or missing states get the restricted default.

use crate::domain::Decimal;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Full,
    Limited,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromoFeature {
    DepositBonus,
    ReferralBonus,
    FreePlay,
    Sweepstakes,
}

impl FromStr for PromoFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depositBonus" | "deposit_bonus" => Ok(PromoFeature::DepositBonus),
            "referralBonus" | "referral_bonus" => Ok(PromoFeature::ReferralBonus),
            "freePlay" | "free_play" => Ok(PromoFeature::FreePlay),
            "sweepstakes" => Ok(PromoFeature::Sweepstakes),
            other => Err(format!("unknown promotional feature: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoFeatures {
    pub deposit_bonus: bool,
    pub referral_bonus: bool,
    pub free_play: bool,
    pub sweepstakes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePermissions {
    pub level: PermissionLevel,
    pub bonus_multiplier: Decimal,
    pub features: PromoFeatures,
}

const FULL: PromoFeatures = PromoFeatures {
    deposit_bonus: true,
    referral_bonus: true,
    free_play: true,
    sweepstakes: true,
};

const LIMITED: PromoFeatures = PromoFeatures {
    deposit_bonus: true,
    referral_bonus: true,
    free_play: false,
    sweepstakes: false,
};

const SWEEPS_ONLY: PromoFeatures = PromoFeatures {
    deposit_bonus: false,
    referral_bonus: true,
    free_play: false,
    sweepstakes: true,
};

const NONE: PromoFeatures = PromoFeatures {
    deposit_bonus: false,
    referral_bonus: false,
    free_play: false,
    sweepstakes: false,
};

fn perms(
    level: PermissionLevel,
    multiplier_tenths: i64,
    features: PromoFeatures,
) -> StatePermissions {
    StatePermissions {
        level,
        bonus_multiplier: Decimal::from_scaled(multiplier_tenths, 1),
        features,
    }
}

pub fn restricted_default() -> StatePermissions {
    perms(PermissionLevel::Restricted, 0, NONE)
}

/// Permissions for a US state code (case-insensitive).
pub fn permissions_for(state_code: Option<&str>) -> StatePermissions {
    use PermissionLevel::*;
    let Some(code) = state_code.map(|s| s.trim().to_ascii_uppercase()) else {
        return restricted_default();
    };

    match code.as_str() {
        "NJ" | "PA" | "MI" | "NY" | "IL" | "CO" | "AZ" | "OH" | "VA" | "MA" | "MD" | "NC"
        | "IN" | "TN" => perms(Full, 15, FULL),
        "IA" | "KS" | "KY" | "LA" | "NH" | "WV" | "WY" | "CT" | "DC" | "VT" => {
            perms(Full, 10, FULL)
        }
        "TX" | "FL" | "GA" | "MN" | "MO" | "OK" | "SC" | "AL" | "AR" | "NE" | "NM" | "ND"
        | "SD" | "OR" | "RI" | "ME" | "DE" | "WI" | "UT" | "AK" | "CA" | "MS" => {
            perms(Limited, 10, LIMITED)
        }
        "HI" | "ID" | "MT" | "NV" | "WA" => perms(Restricted, 0, SWEEPS_ONLY),
        _ => restricted_default(),
    }
}

/// Amount after the state's multiplier, in whole cents.
pub fn apply_bonus_multiplier(amount: Decimal, state_code: Option<&str>) -> Decimal {
    (amount * permissions_for(state_code).bonus_multiplier).round_cents()
}

pub fn is_feature_enabled(state_code: Option<&str>, feature: PromoFeature) -> bool {
    let f = permissions_for(state_code).features;
    match feature {
        PromoFeature::DepositBonus => f.deposit_bonus,
        PromoFeature::ReferralBonus => f.referral_bonus,
        PromoFeature::FreePlay => f.free_play,
        PromoFeature::Sweepstakes => f.sweepstakes,
    }
}
