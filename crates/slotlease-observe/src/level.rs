use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::LoggerError;

/// Validated `EnvFilter` expression.
///
/// Holds the filter exactly as configured (surrounding whitespace trimmed), e.g. `"info"` or
/// `"slotlease_core=debug,slotlease_redis=trace,info"`. Construction checks the expression
/// with `EnvFilter::try_new`, so [`LoggerLevel::to_env_filter`] never has to fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    /// Validate and wrap a filter expression.
    ///
    /// # Examples
    /// ```
    /// use slotlease_observe::LoggerLevel;
    ///
    /// let lvl = LoggerLevel::new(" slotlease_core=debug,info ").unwrap();
    /// assert_eq!(lvl.as_str(), "slotlease_core=debug,info");
    /// assert!(LoggerLevel::new("slotlease_core=chatty").is_err());
    /// ```
    pub fn new(s: impl Into<String>) -> Result<Self, LoggerError> {
        let raw = s.into();
        let expr = raw.trim();
        if expr.is_empty() {
            return Err(LoggerError::InvalidLevel("empty filter".to_string()));
        }
        EnvFilter::try_new(expr)
            .map(|_| Self(expr.to_string()))
            .map_err(|e| LoggerError::InvalidLevel(format!("{expr}: {e}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the filter handed to the subscriber.
    pub fn to_env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.as_str()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::LoggerLevel;

    #[test]
    fn accepts_valid_levels() {
        for lvl in ["info", "warn", "trace", "slotlease_core=debug,slotlease_redis=trace,info"] {
            assert!(lvl.parse::<LoggerLevel>().is_ok(), "rejected {lvl}");
        }
    }

    #[test]
    fn rejects_invalid_levels() {
        for lvl in ["slotlease_core=loud", "other=trace,another=wat", "", "   "] {
            assert!(lvl.parse::<LoggerLevel>().is_err(), "accepted {lvl:?}");
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let lvl: LoggerLevel = "  debug\n".parse().unwrap();
        assert_eq!(lvl.as_str(), "debug");
        assert_eq!(lvl.to_string(), "debug");
    }

    #[test]
    fn default_is_info() {
        let lvl = LoggerLevel::default();
        assert_eq!(lvl.as_str(), "info");
        let _ = lvl.to_env_filter();
    }

    #[test]
    fn serde_as_plain_string() {
        let lvl: LoggerLevel = serde_json::from_str(r#""debug""#).unwrap();
        assert_eq!(lvl.as_str(), "debug");
        assert_eq!(serde_json::to_string(&lvl).unwrap(), r#""debug""#);
        assert!(serde_json::from_str::<LoggerLevel>(r#""x=nope""#).is_err());
    }
}
