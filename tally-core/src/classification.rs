//! Per-transaction categorization decisions.

use serde::{Deserialize, Serialize};

use crate::category::DEFAULT_CATEGORY;

/// Confidence reported when the classifier gave none we could read
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A classifier verdict. Transient; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub category: String,
    /// Always within [0.0, 1.0]
    pub confidence: f64,
}

impl Classification {
    pub fn new(category: impl Into<String>, confidence: f64) -> Self {
        Self {
            category: category.into(),
            confidence: clamp_confidence(confidence),
        }
    }

    /// Strictly below the threshold means a human has to decide.
    pub fn needs_escalation(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY, DEFAULT_CONFIDENCE)
    }
}

/// Clamp into [0.0, 1.0]; NaN reads as the default confidence.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_CONFIDENCE;
    }
    value.clamp(0.0, 1.0)
}

/// Which stage decided a transaction's category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Method {
    #[serde(rename = "rule")]
    Rule,
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "operator")]
    Operator,
    /// Backend failed outright; default category without escalation
    #[serde(rename = "fallback")]
    Fallback,
}

impl Method {
    pub fn label(&self) -> &'static str {
        match self {
            Method::Rule => "Rule",
            Method::Model => "AI",
            Method::Operator => "Manual",
            Method::Fallback => "Fallback",
        }
    }
}

/// Final outcome for one transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Categorized {
    pub category: String,
    pub method: Method,
}
