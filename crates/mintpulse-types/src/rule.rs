//! Alert rules
//!
//! A rule is a static threshold condition over samples whose category and
//! name match. Rules are evaluated per dimension value (for example one
//! endpoint), so the pair (rule id, dimension value) identifies an alert.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alert::AlertSeverity;
use crate::category::MetricCategory;
use crate::sample::MetricSample;

/// Identifier of an alert rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

/// Sample name matcher: `*`, `prefix*`, or an exact name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NamePattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl NamePattern {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            Self::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Self::Prefix(prefix.to_string())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Exact(exact) => name == exact,
        }
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::Any
    }
}

impl From<String> for NamePattern {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<NamePattern> for String {
    fn from(pattern: NamePattern) -> Self {
        match pattern {
            NamePattern::Any => "*".to_string(),
            NamePattern::Prefix(prefix) => format!("{}*", prefix),
            NamePattern::Exact(exact) => exact,
        }
    }
}

/// Threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">", alias = "gt")]
    GreaterThan,
    #[serde(rename = ">=", alias = "gte")]
    GreaterOrEqual,
}

impl Comparator {
    /// Whether `observed` breaches `threshold`
    pub fn breaches(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => observed > threshold,
            Self::GreaterOrEqual => observed >= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// Largest accepted `RuleStatistic::Average` window
pub const MAX_AVERAGE_WINDOW: usize = 1_000;

/// Which value of a dimension is compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleStatistic {
    /// The incoming sample's own value
    #[default]
    Sample,
    /// Rolling mean over the last `window` samples of the dimension
    Average { window: usize },
}

/// A static threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: RuleId,

    /// Restrict to one category; `None` matches all
    #[serde(default)]
    pub category: Option<MetricCategory>,

    /// Sample name pattern
    #[serde(default)]
    pub name: NamePattern,

    /// Dimension key alerts are deduplicated by
    #[serde(default = "default_dimension")]
    pub dimension: String,

    pub comparator: Comparator,

    pub threshold: f64,

    #[serde(default)]
    pub statistic: RuleStatistic,

    /// Samples a dimension must see before the rule may trigger
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default)]
    pub severity: AlertSeverity,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_dimension() -> String {
    "name".to_string()
}

fn default_min_samples() -> usize {
    1
}

impl AlertRule {
    /// Start building a rule
    pub fn builder(id: impl Into<String>) -> AlertRuleBuilder {
        AlertRuleBuilder::new(id)
    }

    /// Whether the rule applies to a sample at all
    pub fn matches(&self, sample: &MetricSample) -> bool {
        if let Some(category) = self.category {
            if category != sample.category {
                return false;
            }
        }
        self.name.matches(&sample.name)
    }

    /// Check the rule for configuration mistakes
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("rule id must not be empty".to_string());
        }
        if !self.threshold.is_finite() {
            return Err(format!("threshold must be finite, got {}", self.threshold));
        }
        if self.dimension.trim().is_empty() {
            return Err("dimension key must not be empty".to_string());
        }
        if self.min_samples == 0 {
            return Err("min_samples must be at least 1".to_string());
        }
        if let RuleStatistic::Average { window } = self.statistic {
            if window == 0 {
                return Err("average window must be at least 1".to_string());
            }
            if window > MAX_AVERAGE_WINDOW {
                return Err(format!(
                    "average window must be at most {}, got {}",
                    MAX_AVERAGE_WINDOW, window
                ));
            }
        }
        Ok(())
    }

    /// Human-readable summary used in alert messages
    pub fn describe(&self) -> String {
        if let Some(ref description) = self.description {
            return description.clone();
        }
        let statistic = match self.statistic {
            RuleStatistic::Sample => "value".to_string(),
            RuleStatistic::Average { window } => format!("average of last {}", window),
        };
        format!(
            "{} {} {} by {}",
            statistic,
            self.comparator.symbol(),
            self.threshold,
            self.dimension
        )
    }
}

/// Builder for alert rules
#[derive(Debug)]
pub struct AlertRuleBuilder {
    rule: AlertRule,
}

impl AlertRuleBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            rule: AlertRule {
                id: RuleId::new(id),
                category: None,
                name: NamePattern::Any,
                dimension: default_dimension(),
                comparator: Comparator::GreaterThan,
                threshold: 0.0,
                statistic: RuleStatistic::Sample,
                min_samples: 1,
                severity: AlertSeverity::Warning,
                description: None,
            },
        }
    }

    pub fn category(mut self, category: MetricCategory) -> Self {
        self.rule.category = Some(category);
        self
    }

    pub fn name(mut self, pattern: &str) -> Self {
        self.rule.name = NamePattern::parse(pattern);
        self
    }

    pub fn dimension(mut self, key: impl Into<String>) -> Self {
        self.rule.dimension = key.into();
        self
    }

    /// Trigger when the observed value is strictly above `threshold`
    pub fn above(mut self, threshold: f64) -> Self {
        self.rule.comparator = Comparator::GreaterThan;
        self.rule.threshold = threshold;
        self
    }

    /// Trigger when the observed value is at or above `threshold`
    pub fn at_least(mut self, threshold: f64) -> Self {
        self.rule.comparator = Comparator::GreaterOrEqual;
        self.rule.threshold = threshold;
        self
    }

    pub fn average_over(mut self, window: usize) -> Self {
        self.rule.statistic = RuleStatistic::Average { window };
        self
    }

    pub fn min_samples(mut self, count: usize) -> Self {
        self.rule.min_samples = count;
        self
    }

    pub fn severity(mut self, severity: AlertSeverity) -> Self {
        self.rule.severity = severity;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    pub fn build(self) -> AlertRule {
        self.rule
    }
}
