//! Verification steps required before a transfer may move funds.

use crate::domain::{Decimal, VerificationProof};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequirements {
    pub pin: bool,
    pub biometric: bool,
    pub two_factor: bool,
    pub email_confirmation: bool,
}

/// PIN always; biometric above 500; 2FA and email confirmation above 1000
/// unless the recipient is trusted.
pub fn get_required_verification(amount: Decimal, is_trusted: bool) -> VerificationRequirements {
    let above_high = amount > Decimal::from_units(1_000);
    VerificationRequirements {
        pin: true,
        biometric: amount > Decimal::from_units(500),
        two_factor: above_high && !is_trusted,
        email_confirmation: above_high && !is_trusted,
    }
}

impl VerificationRequirements {
    /// Names of required steps the proof does not cover.
    pub fn missing(&self, proof: &VerificationProof) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pin && !proof.pin {
            missing.push("pin");
        }
        if self.biometric && !proof.biometric {
            missing.push("biometric");
        }
        if self.two_factor && !proof.two_factor {
            missing.push("twoFactor");
        }
        if self.email_confirmation && !proof.email_confirmation {
            missing.push("emailConfirmation");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_pin_only_up_to_500() {
        let req = get_required_verification(d("500"), false);
        assert_eq!(
            req,
            VerificationRequirements {
                pin: true,
                biometric: false,
                two_factor: false,
                email_confirmation: false,
            }
        );
    }

    #[test]
    fn test_biometric_between_500_and_1000() {
        for amount in ["500.01", "1000"] {
            let req = get_required_verification(d(amount), false);
            assert!(req.pin && req.biometric);
            assert!(!req.two_factor && !req.email_confirmation);
        }
    }

    #[test]
    fn test_full_bundle_above_1000_untrusted() {
        let req = get_required_verification(d("1000.01"), false);
        assert!(req.pin && req.biometric && req.two_factor && req.email_confirmation);
    }

    #[test]
    fn test_trusted_recipient_skips_2fa_and_email() {
        let req = get_required_verification(d("5000"), true);
        assert!(req.pin && req.biometric);
        assert!(!req.two_factor && !req.email_confirmation);
    }

    #[test]
    fn test_missing_steps() {
        let req = get_required_verification(d("2000"), false);
        let proof = VerificationProof {
            pin: true,
            biometric: true,
            ..Default::default()
        };
        assert_eq!(req.missing(&proof), vec!["twoFactor", "emailConfirmation"]);
        assert!(req.missing(&VerificationProof::all()).is_empty());
    }
}
