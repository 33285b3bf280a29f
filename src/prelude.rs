//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use arl_recommender::prelude::*;
//! ```

pub use crate::basket::{BasketBuilder, BasketId, Item, PresenceMatrix, RawRecord};
pub use crate::config::{ArlConfig, BasketGranularity, MalformedRecordPolicy, Metric};
pub use crate::error::{ArlError, Result};
pub use crate::mining::{sort_rules, Apriori, AssociationRule, FrequentItemsets, Itemset, RuleGenerator};
pub use crate::pipeline::{ArlPipeline, PipelineOutput};
pub use crate::recommend::{recommend, ArlRecommender};
