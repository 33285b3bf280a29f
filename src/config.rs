//! Mining configuration.
//!
//! # Examples
//!
//! ```
//! use arl_recommender::config::{ArlConfig, Metric};
//!
//! let config = ArlConfig::new()
//!     .with_min_support(0.05)
//!     .with_metric(Metric::Lift)
//!     .with_min_threshold(1.0);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.metric, Metric::Lift);
//! ```

use crate::error::{ArlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule metric used for threshold filtering and ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// P(antecedent ∪ consequent)
    #[default]
    Support,
    /// P(consequent | antecedent)
    Confidence,
    /// confidence / P(consequent)
    Lift,
    /// support - P(antecedent) * P(consequent)
    Leverage,
    /// (1 - P(consequent)) / (1 - confidence)
    Conviction,
}

impl Metric {
    /// All recognized metrics, in declaration order.
    pub const ALL: [Metric; 5] = [
        Metric::Support,
        Metric::Confidence,
        Metric::Lift,
        Metric::Leverage,
        Metric::Conviction,
    ];

    /// Lowercase name as accepted by [`Metric::from_str`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Metric::Support => "support",
            Metric::Confidence => "confidence",
            Metric::Lift => "lift",
            Metric::Leverage => "leverage",
            Metric::Conviction => "conviction",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ArlError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| {
                ArlError::invalid_config(
                    "metric",
                    s,
                    "one of support|confidence|lift|leverage|conviction",
                )
            })
    }
}

/// Time bucket used to group one user's records into a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasketGranularity {
    /// One basket per user per calendar day (`YYYY-MM-DD`)
    Day,
    /// One basket per user per ISO week (`YYYY-Www`)
    Week,
    /// One basket per user per calendar month (`YYYY-MM`)
    #[default]
    Month,
    /// One basket per user per calendar year (`YYYY`)
    Year,
}

impl FromStr for BasketGranularity {
    type Err = ArlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(ArlError::invalid_config(
                "basket_granularity",
                s,
                "one of day|week|month|year",
            )),
        }
    }
}

/// What to do with a record that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Drop the record, log it, and count it in the build report.
    #[default]
    Skip,
    /// Abort the whole computation on the first bad record.
    FailFast,
}

/// Configuration for the full mining pipeline.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use arl_recommender::config::ArlConfig;
///
/// let config = ArlConfig::from_json_str(r#"{"min_support": 0.2, "metric": "confidence"}"#)
///     .expect("valid config");
/// assert_eq!(config.min_support, 0.2);
/// assert_eq!(config.min_threshold, 0.01);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArlConfig {
    /// Minimum itemset support, in (0, 1]
    pub min_support: f64,
    /// Minimum value of `metric` for a rule to be kept
    pub min_threshold: f64,
    /// Metric used to filter rules
    pub metric: Metric,
    /// Time bucket for basket identity
    pub basket_granularity: BasketGranularity,
    /// Malformed record handling
    pub on_malformed: MalformedRecordPolicy,
    /// Largest itemset size to mine (None = unbounded)
    pub max_len: Option<usize>,
    /// Count candidate supports on the rayon pool (requires the `parallel` feature)
    pub parallel: bool,
}

impl Default for ArlConfig {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_threshold: 0.01,
            metric: Metric::Support,
            basket_granularity: BasketGranularity::Month,
            on_malformed: MalformedRecordPolicy::Skip,
            max_len: None,
            parallel: false,
        }
    }
}

impl ArlConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum support threshold.
    #[must_use]
    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    /// Set the minimum rule metric threshold.
    #[must_use]
    pub fn with_min_threshold(mut self, min_threshold: f64) -> Self {
        self.min_threshold = min_threshold;
        self
    }

    /// Set the rule filtering metric.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the basket time bucket.
    #[must_use]
    pub fn with_basket_granularity(mut self, granularity: BasketGranularity) -> Self {
        self.basket_granularity = granularity;
        self
    }

    /// Set the malformed record policy.
    #[must_use]
    pub fn with_malformed_policy(mut self, policy: MalformedRecordPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Cap the size of mined itemsets.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Enable or disable parallel support counting.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Check every field against its constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::InvalidConfiguration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        validate_min_support(self.min_support)?;
        validate_min_threshold(self.min_threshold)?;
        if self.max_len == Some(0) {
            return Err(ArlError::invalid_config("max_len", 0, ">= 1"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON and a configuration
    /// error for unknown metric or granularity names and out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut doc: serde_json::Value = serde_json::from_str(json)?;
        let metric = take_name(&mut doc, "metric")
            .map(|name| name.parse::<Metric>())
            .transpose()?;
        let granularity = take_name(&mut doc, "basket_granularity")
            .map(|name| name.parse::<BasketGranularity>())
            .transpose()?;

        let mut config: Self = serde_json::from_value(doc)?;
        if let Some(metric) = metric {
            config.metric = metric;
        }
        if let Some(granularity) = granularity {
            config.basket_granularity = granularity;
        }
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a float field is not representable.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// Name-valued fields go through `FromStr` so bad names surface as
// configuration errors. Non-string values stay put for serde to reject.
fn take_name(doc: &mut serde_json::Value, key: &str) -> Option<String> {
    let fields = doc.as_object_mut()?;
    if !fields.get(key)?.is_string() {
        return None;
    }
    match fields.remove(key)? {
        serde_json::Value::String(name) => Some(name),
        _ => None,
    }
}

pub(crate) fn validate_min_support(min_support: f64) -> Result<()> {
    if min_support.is_finite() && min_support > 0.0 && min_support <= 1.0 {
        Ok(())
    } else {
        Err(ArlError::invalid_config(
            "min_support",
            min_support,
            "0 < min_support <= 1",
        ))
    }
}

pub(crate) fn validate_min_threshold(min_threshold: f64) -> Result<()> {
    if min_threshold.is_finite() && min_threshold >= 0.0 {
        Ok(())
    } else {
        Err(ArlError::invalid_config(
            "min_threshold",
            min_threshold,
            "finite and >= 0",
        ))
    }
}
