//! Rule-based recommendation.
//!
//! Given an item a user just bought, look up the association rules whose
//! antecedent is that item and suggest their consequents, best rule first.
//!
//! # Quick Start
//!
//! ```
//! use arl_recommender::basket::{Item, PresenceMatrix};
//! use arl_recommender::config::Metric;
//! use arl_recommender::mining::{Apriori, RuleGenerator};
//! use arl_recommender::recommend::recommend;
//!
//! let matrix = PresenceMatrix::from_labels(&[
//!     ("B1", &["X", "Y"]),
//!     ("B2", &["X", "Y"]),
//!     ("B3", &["X"]),
//!     ("B4", &["Y", "Z"]),
//! ]);
//! let itemsets = Apriori::new().with_min_support(0.25).mine(&matrix).unwrap();
//! let rules = RuleGenerator::new().generate(&itemsets).unwrap();
//!
//! let picks = recommend(&Item::named("Z"), &rules, 1, Metric::Lift);
//! assert_eq!(picks, vec![Item::named("Y")]);
//! ```

use crate::basket::Item;
use crate::config::Metric;
use crate::mining::rules::rank_cmp;
use crate::mining::{sort_rules, AssociationRule};
use std::collections::HashSet;
use tracing::debug;

/// Recommend up to the consequents of the `top_n` best rules for `item`.
///
/// Rules whose antecedent is exactly `{item}` are used; if there are none,
/// rules whose antecedent merely contains `item` are used instead. Matching
/// rules are ranked by `metric` (ties: support, then antecedent labels),
/// their consequents flattened, and repeated items dropped after their
/// first (best-ranked) occurrence. No match gives an empty result.
#[must_use]
pub fn recommend(
    item: &Item,
    rules: &[AssociationRule],
    top_n: usize,
    metric: Metric,
) -> Vec<Item> {
    let mut matches: Vec<&AssociationRule> = rules
        .iter()
        .filter(|r| r.antecedent.len() == 1 && r.antecedent.contains(item))
        .collect();
    let exact = !matches.is_empty();
    if !exact {
        matches = rules
            .iter()
            .filter(|r| r.antecedent.contains(item))
            .collect();
    }
    matches.sort_by(|a, b| rank_cmp(a, b, metric));

    let mut seen = HashSet::new();
    let picks: Vec<Item> = matches
        .into_iter()
        .take(top_n)
        .flat_map(|r| r.consequent.items())
        .filter(|i| seen.insert(*i))
        .cloned()
        .collect();

    debug!(item = %item, exact, picks = picks.len(), "recommendation lookup");
    picks
}

/// A rule table kept sorted by one ranking metric, for repeated lookups.
///
/// ```
/// use arl_recommender::basket::{Item, PresenceMatrix};
/// use arl_recommender::config::Metric;
/// use arl_recommender::mining::{Apriori, RuleGenerator};
/// use arl_recommender::recommend::ArlRecommender;
///
/// let matrix = PresenceMatrix::from_labels(&[("B1", &["2_0", "15_1"]), ("B2", &["2_0", "15_1"])]);
/// let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
/// let rules = RuleGenerator::new().generate(&itemsets).unwrap();
///
/// let recommender = ArlRecommender::new(rules, Metric::Lift);
/// assert_eq!(recommender.recommend_label("2_0", 3).unwrap(), vec![Item::named("15_1")]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArlRecommender {
    rules: Vec<AssociationRule>,
    metric: Metric,
}

impl ArlRecommender {
    /// Take ownership of `rules` and sort them by `metric`.
    #[must_use]
    pub fn new(mut rules: Vec<AssociationRule>, metric: Metric) -> Self {
        sort_rules(&mut rules, metric);
        Self { rules, metric }
    }

    /// Rules in ranking order.
    #[must_use]
    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    /// The ranking metric.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of rules held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// See [`recommend`].
    #[must_use]
    pub fn recommend(&self, item: &Item, top_n: usize) -> Vec<Item> {
        recommend(item, &self.rules, top_n, self.metric)
    }

    /// Recommend for a combined `<item_id>_<category_id>` label.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ArlError::InvalidItemLabel`] for a label
    /// without both parts.
    pub fn recommend_label(&self, label: &str, top_n: usize) -> crate::Result<Vec<Item>> {
        Ok(self.recommend(&Item::parse(label)?, top_n))
    }
}
