//! Platform availability by jurisdiction.

use crate::domain::{Availability, PlatformId, UserLocation};

/// Whether a platform with `availability` may be shown at `location`.
///
/// Allow-lists need a known location that matches; deny-lists only exclude a
/// known location that matches. `Everywhere` ignores location entirely.
pub fn is_platform_available_in_location(
    availability: Availability,
    location: Option<&UserLocation>,
) -> bool {
    match availability {
        Availability::Everywhere => true,
        Availability::AllowedStates(states) => location
            .and_then(|l| l.us_state())
            .is_some_and(|s| states.contains(&s)),
        Availability::RestrictedStates(states) => !location
            .and_then(|l| l.us_state())
            .is_some_and(|s| states.contains(&s)),
        Availability::AllowedCountries(countries) => {
            location.is_some_and(|l| countries.contains(&l.country_code.as_str()))
        }
        Availability::RestrictedCountries(countries) => {
            !location.is_some_and(|l| countries.contains(&l.country_code.as_str()))
        }
    }
}

/// Catalog platforms available at `location`, in catalog order.
pub fn available_platforms(location: Option<&UserLocation>) -> Vec<PlatformId> {
    PlatformId::ALL
        .into_iter()
        .filter(|p| is_platform_available_in_location(p.availability(), location))
        .collect()
}
