//! Domain primitives: TimeMs, UserId.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    pub fn plus_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }

    pub fn minus_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_sub(ms))
    }

    /// Whole days elapsed from `earlier` to `self` (0 if `earlier` is later).
    pub fn days_since(&self, earlier: TimeMs) -> i64 {
        (self.0 - earlier.0).max(0) / MS_PER_DAY
    }

    pub fn to_datetime(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

/// Application user identifier (auth provider uid).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserIdParseError {
    #[error("user id is empty")]
    Empty,
    #[error("user id exceeds 128 characters")]
    TooLong,
    #[error("user id contains invalid character {0:?}")]
    InvalidChar(char),
}

impl UserId {
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = UserIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UserIdParseError::Empty);
        }
        if s.len() > 128 {
            return Err(UserIdParseError::TooLong);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
        {
            return Err(UserIdParseError::InvalidChar(c));
        }
        Ok(UserId(s.to_string()))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::from_str(" abc_123 ").unwrap().as_str(), "abc_123");
        assert_eq!(UserId::from_str(""), Err(UserIdParseError::Empty));
        assert_eq!(
            UserId::from_str("a b"),
            Err(UserIdParseError::InvalidChar(' '))
        );
        assert_eq!(
            UserId::from_str(&"x".repeat(129)),
            Err(UserIdParseError::TooLong)
        );
    }

    #[test]
    fn test_days_since() {
        let t0 = TimeMs::new(0);
        assert_eq!(TimeMs::new(MS_PER_DAY * 6 + 5).days_since(t0), 6);
        assert_eq!(t0.days_since(TimeMs::new(MS_PER_DAY)), 0);
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
        assert_eq!(TimeMs::new(1000).plus_ms(500).as_ms(), 1500);
    }
}
