//! Error types for association rule learning.
//!
//! Configuration problems are reported before any computation starts;
//! malformed input records are reported per record.

use thiserror::Error;

/// Main error type for the basket, mining, and recommendation stages.
///
/// # Examples
///
/// ```
/// use arl_recommender::error::ArlError;
///
/// let err = ArlError::invalid_config("min_support", 0.0, "0 < min_support <= 1");
/// assert!(err.to_string().contains("min_support"));
/// ```
#[derive(Debug, Error)]
pub enum ArlError {
    /// A configuration value is out of range or unrecognized.
    #[error("Invalid configuration: {param} = {value}, expected {constraint}")]
    InvalidConfiguration {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// An input record is missing an identifier or has an unparsable timestamp.
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Zero-based position of the record in the input sequence
        index: usize,
        /// Why the record was rejected
        reason: String,
    },

    /// An itemset was constructed from zero items.
    #[error("Itemset must contain at least one item")]
    EmptyItemset,

    /// An item label could not be split into item and category identifiers.
    #[error("Invalid item label '{0}', expected <item_id>_<category_id>")]
    InvalidItemLabel(String),

    /// Config (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An internal invariant did not hold.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArlError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(
        param: &str,
        value: impl std::fmt::Display,
        constraint: &str,
    ) -> Self {
        Self::InvalidConfiguration {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a malformed record error.
    #[must_use]
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ArlError {
    fn from(err: serde_json::Error) -> Self {
        ArlError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ArlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_display() {
        let err = ArlError::invalid_config("min_threshold", -0.5, ">= 0");
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("min_threshold"));
        assert!(msg.contains("-0.5"));
        assert!(msg.contains(">= 0"));
    }

    #[test]
    fn test_malformed_record_display() {
        let err = ArlError::malformed(3, "missing user_id");
        assert_eq!(
            err.to_string(),
            "Malformed record at index 3: missing user_id"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: ArlError = json_err.into();
        assert!(matches!(err, ArlError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_error_debug_impl() {
        let err = ArlError::Internal("missing subset".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Internal"));
    }
}
