//! Metric samples
//!
//! A sample is one measurement of a named operation. Samples are built once
//! and never mutated after they reach the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::MetricCategory;
use crate::tags::{keys, Tags};

/// Category-specific sample fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum CategoryFields {
    Api {
        method: Option<String>,
        status_code: Option<u16>,
    },
    Event {
        queue_size: usize,
        event_source: String,
    },
    Blockchain {
        network: String,
        success: bool,
    },
}

impl CategoryFields {
    /// Empty fields for a category
    pub fn empty(category: MetricCategory) -> Self {
        match category {
            MetricCategory::Api => Self::Api {
                method: None,
                status_code: None,
            },
            MetricCategory::Event => Self::Event {
                queue_size: 0,
                event_source: "unknown".to_string(),
            },
            MetricCategory::Blockchain => Self::Blockchain {
                network: "unknown".to_string(),
                success: true,
            },
        }
    }

    pub fn category(&self) -> MetricCategory {
        match self {
            Self::Api { .. } => MetricCategory::Api,
            Self::Event { .. } => MetricCategory::Event,
            Self::Blockchain { .. } => MetricCategory::Blockchain,
        }
    }
}

/// One recorded measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Partition this sample belongs to
    pub category: MetricCategory,

    /// Endpoint path, event type or blockchain operation
    pub name: String,

    /// Elapsed duration in milliseconds
    pub value: f64,

    /// When the measurement finished
    pub timestamp: DateTime<Utc>,

    /// Arbitrary dimensions
    pub tags: Tags,

    /// Category-specific fields
    pub fields: CategoryFields,
}

impl MetricSample {
    /// Create a sample with the given fields, timestamped now
    pub fn with_fields(fields: CategoryFields, name: impl Into<String>, value: f64) -> Self {
        let mut sample = Self {
            category: fields.category(),
            name: name.into(),
            value,
            timestamp: Utc::now(),
            tags: Tags::new(),
            fields,
        };
        sample.apply_canonical_tags();
        sample
    }

    /// Create a sample with empty category fields
    pub fn new(category: MetricCategory, name: impl Into<String>, value: f64) -> Self {
        Self::with_fields(CategoryFields::empty(category), name, value)
    }

    /// API route timing
    pub fn api(endpoint: impl Into<String>, value: f64) -> Self {
        Self::new(MetricCategory::Api, endpoint, value)
    }

    /// API route timing with request details
    pub fn api_request(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        value: f64,
    ) -> Self {
        Self::with_fields(
            CategoryFields::Api {
                method: Some(method.into()),
                status_code: Some(status_code),
            },
            endpoint,
            value,
        )
    }

    /// Event processing timing
    pub fn event(
        event_type: impl Into<String>,
        value: f64,
        queue_size: usize,
        event_source: impl Into<String>,
    ) -> Self {
        Self::with_fields(
            CategoryFields::Event {
                queue_size,
                event_source: event_source.into(),
            },
            event_type,
            value,
        )
    }

    /// Blockchain call timing
    pub fn blockchain(
        operation: impl Into<String>,
        value: f64,
        network: impl Into<String>,
        success: bool,
    ) -> Self {
        Self::with_fields(
            CategoryFields::Blockchain {
                network: network.into(),
                success,
            },
            operation,
            value,
        )
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a single tag
    pub fn with_tag(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self.apply_canonical_tags();
        self
    }

    /// Merge a tag set; canonical tags derived from the fields always win
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self.apply_canonical_tags();
        self
    }

    /// Value of a grouping dimension.
    ///
    /// `name` always resolves to the sample name; anything else is looked up
    /// in the tags, which include the canonical name key and field values.
    pub fn dimension(&self, key: &str) -> Option<&str> {
        if key == "name" {
            return Some(self.name.as_str());
        }
        self.tags.get(key)
    }

    /// Whether this sample records a failed operation
    pub fn is_failure(&self) -> bool {
        match &self.fields {
            CategoryFields::Blockchain { success, .. } => !success,
            CategoryFields::Api {
                status_code: Some(code),
                ..
            } if *code >= 500 => true,
            _ => self.tags.get(keys::SUCCESS) == Some("false"),
        }
    }

    fn apply_canonical_tags(&mut self) {
        self.tags
            .insert(self.category.name_key(), self.name.clone());

        match &self.fields {
            CategoryFields::Api {
                method,
                status_code,
            } => {
                if let Some(method) = method {
                    self.tags.insert(keys::METHOD, method.to_ascii_uppercase());
                }
                if let Some(code) = status_code {
                    self.tags.insert(keys::STATUS_CODE, code.to_string());
                }
            }
            CategoryFields::Event { event_source, .. } => {
                self.tags.insert(keys::EVENT_SOURCE, event_source.clone());
            }
            CategoryFields::Blockchain { network, success } => {
                self.tags.insert(keys::NETWORK, network.clone());
                self.tags.insert(keys::SUCCESS, success.to_string());
            }
        }
    }
}
