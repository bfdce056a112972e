//! Metric categories
//!
//! Every sample belongs to exactly one category, and the store keeps one
//! partition per category.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level partition of metric samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    /// HTTP route handler timings
    Api,
    /// Background event-listener processing timings
    Event,
    /// Blockchain client call timings
    Blockchain,
}

impl MetricCategory {
    /// All categories, in partition order
    pub const ALL: [MetricCategory; 3] = [Self::Api, Self::Event, Self::Blockchain];

    /// Stable partition index
    pub fn index(self) -> usize {
        match self {
            Self::Api => 0,
            Self::Event => 1,
            Self::Blockchain => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Event => "event",
            Self::Blockchain => "blockchain",
        }
    }

    /// Tag key that carries the sample name for this category
    pub fn name_key(self) -> &'static str {
        match self {
            Self::Api => crate::tags::keys::ENDPOINT,
            Self::Event => crate::tags::keys::EVENT_TYPE,
            Self::Blockchain => crate::tags::keys::OPERATION,
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for MetricCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "event" => Ok(Self::Event),
            "blockchain" => Ok(Self::Blockchain),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_through_str() {
        for category in MetricCategory::ALL {
            assert_eq!(category.as_str().parse::<MetricCategory>().unwrap(), category);
        }
        assert_eq!(" API ".parse::<MetricCategory>().unwrap(), MetricCategory::Api);
    }

    #[test]
    fn test_unknown_category() {
        let err = "storage".parse::<MetricCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown metric category: storage");
    }

    #[test]
    fn test_indices_are_distinct() {
        let indices: Vec<usize> = MetricCategory::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MetricCategory::Blockchain).unwrap();
        assert_eq!(json, "\"blockchain\"");
    }
}
