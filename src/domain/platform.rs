//! Partner platform catalog.
//!
//! Every platform carries an explicit [`Availability`]; there is no
//! "field absent" case. Adding a platform without deciding where it may be
//! offered fails to compile at the exhaustive matches below.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Fanduel,
    Draftkings,
    Betmgm,
    Caesars,
    Fanatics,
    Espnbet,
    Betrivers,
    Prizepicks,
    Underdog,
    Sleeper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformCategory {
    Sportsbook,
    Dfs,
    Fantasy,
}

/// Where a platform may be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Everywhere,
    /// Only these US states.
    AllowedStates(&'static [&'static str]),
    /// Everywhere except these US states.
    RestrictedStates(&'static [&'static str]),
    AllowedCountries(&'static [&'static str]),
    RestrictedCountries(&'static [&'static str]),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

const SPORTSBOOK_STATES: &[&str] = &[
    "AZ", "CO", "CT", "DC", "IA", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "MI", "NC", "NH", "NJ",
    "NY", "OH", "PA", "TN", "VA", "VT", "WV", "WY",
];

const BETMGM_STATES: &[&str] = &[
    "AZ", "CO", "DC", "IA", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "MI", "NC", "NJ", "NY", "OH",
    "PA", "TN", "VA", "WV", "WY",
];

const BETRIVERS_STATES: &[&str] = &[
    "AZ", "CO", "DE", "IA", "IL", "IN", "LA", "MD", "MI", "NJ", "NY", "OH", "PA", "VA", "WV",
];

const DFS_RESTRICTED_STATES: &[&str] = &["HI", "ID", "MI", "MT", "NV", "WA"];

impl PlatformId {
    pub const ALL: [PlatformId; 10] = [
        PlatformId::Fanduel,
        PlatformId::Draftkings,
        PlatformId::Betmgm,
        PlatformId::Caesars,
        PlatformId::Fanatics,
        PlatformId::Espnbet,
        PlatformId::Betrivers,
        PlatformId::Prizepicks,
        PlatformId::Underdog,
        PlatformId::Sleeper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Fanduel => "fanduel",
            PlatformId::Draftkings => "draftkings",
            PlatformId::Betmgm => "betmgm",
            PlatformId::Caesars => "caesars",
            PlatformId::Fanatics => "fanatics",
            PlatformId::Espnbet => "espnbet",
            PlatformId::Betrivers => "betrivers",
            PlatformId::Prizepicks => "prizepicks",
            PlatformId::Underdog => "underdog",
            PlatformId::Sleeper => "sleeper",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformId::Fanduel => "FanDuel",
            PlatformId::Draftkings => "DraftKings",
            PlatformId::Betmgm => "BetMGM",
            PlatformId::Caesars => "Caesars Sportsbook",
            PlatformId::Fanatics => "Fanatics Sportsbook",
            PlatformId::Espnbet => "ESPN BET",
            PlatformId::Betrivers => "BetRivers",
            PlatformId::Prizepicks => "PrizePicks",
            PlatformId::Underdog => "Underdog Fantasy",
            PlatformId::Sleeper => "Sleeper",
        }
    }

    pub fn category(&self) -> PlatformCategory {
        match self {
            PlatformId::Fanduel
            | PlatformId::Draftkings
            | PlatformId::Betmgm
            | PlatformId::Caesars
            | PlatformId::Fanatics
            | PlatformId::Espnbet
            | PlatformId::Betrivers => PlatformCategory::Sportsbook,
            PlatformId::Prizepicks | PlatformId::Underdog => PlatformCategory::Dfs,
            PlatformId::Sleeper => PlatformCategory::Fantasy,
        }
    }

    pub fn availability(&self) -> Availability {
        match self {
            PlatformId::Fanduel
            | PlatformId::Draftkings
            | PlatformId::Caesars
            | PlatformId::Fanatics
            | PlatformId::Espnbet => Availability::AllowedStates(SPORTSBOOK_STATES),
            PlatformId::Betmgm => Availability::AllowedStates(BETMGM_STATES),
            PlatformId::Betrivers => Availability::AllowedStates(BETRIVERS_STATES),
            PlatformId::Prizepicks | PlatformId::Underdog => {
                Availability::RestrictedStates(DFS_RESTRICTED_STATES)
            }
            PlatformId::Sleeper => Availability::Everywhere,
        }
    }
}

impl FromStr for PlatformId {
    type Err = UnknownPlatform;

    /// Accepts canonical ids plus the legacy ids older clients still send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match key.as_str() {
            "fanduel" | "fd" => Ok(PlatformId::Fanduel),
            "draftkings" | "dk" => Ok(PlatformId::Draftkings),
            "betmgm" | "mgm" => Ok(PlatformId::Betmgm),
            "caesars" | "caesarssportsbook" | "williamhill" => Ok(PlatformId::Caesars),
            "fanatics" | "fanaticssportsbook" => Ok(PlatformId::Fanatics),
            "espnbet" | "espn" | "barstool" => Ok(PlatformId::Espnbet),
            "betrivers" | "rivers" => Ok(PlatformId::Betrivers),
            "prizepicks" | "pp" => Ok(PlatformId::Prizepicks),
            "underdog" | "underdogfantasy" => Ok(PlatformId::Underdog),
            "sleeper" => Ok(PlatformId::Sleeper),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
