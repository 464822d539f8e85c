//! Pure rule code: no I/O, every function takes `now` explicitly.

pub mod bonus;
pub mod eligibility;
pub mod limits;
pub mod promotions;
pub mod risk;
pub mod split;
pub mod verification;

pub use bonus::{active_bonus_total, plan_bonus_draw, BonusDraw};
pub use eligibility::{available_platforms, is_platform_available_in_location};
pub use limits::{
    check_transfer_limits, current_spend, record_spend, validate_limits, LimitKind, LimitViolation,
};
pub use promotions::{
    apply_bonus_multiplier, is_feature_enabled, permissions_for, PermissionLevel, PromoFeature,
    PromoFeatures, StatePermissions,
};
pub use risk::calculate_risk_score;
pub use split::{compute_shares, SplitError};
pub use verification::{get_required_verification, VerificationRequirements};
