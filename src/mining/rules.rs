//! Association rule generation from frequent itemsets.

use super::{FrequentItemset, FrequentItemsets, Itemset};
use crate::config::{validate_min_threshold, ArlConfig, Metric};
use crate::error::{ArlError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

/// Association rule: antecedent => consequent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    /// Items in the antecedent (left side)
    pub antecedent: Itemset,
    /// Items in the consequent (right side)
    pub consequent: Itemset,
    /// P(antecedent)
    pub antecedent_support: f64,
    /// P(consequent)
    pub consequent_support: f64,
    /// Support: P(antecedent ∪ consequent)
    pub support: f64,
    /// Confidence: P(consequent | antecedent) = support / P(antecedent)
    pub confidence: f64,
    /// Lift: confidence / P(consequent)
    pub lift: f64,
    /// Leverage: support - P(antecedent) * P(consequent)
    pub leverage: f64,
    /// Conviction: (1 - P(consequent)) / (1 - confidence), infinite at confidence 1
    pub conviction: f64,
}

impl AssociationRule {
    /// Value of `metric` for this rule.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Support => self.support,
            Metric::Confidence => self.confidence,
            Metric::Lift => self.lift,
            Metric::Leverage => self.leverage,
            Metric::Conviction => self.conviction,
        }
    }

    fn from_counts(
        antecedent: &FrequentItemset,
        consequent: &FrequentItemset,
        union: &FrequentItemset,
        n_baskets: usize,
    ) -> Self {
        let n = n_baskets as f64;
        let antecedent_support = antecedent.count as f64 / n;
        let consequent_support = consequent.count as f64 / n;
        let support = union.count as f64 / n;
        // Ratio of counts keeps confidence exactly within [0, 1].
        let confidence = union.count as f64 / antecedent.count as f64;
        let lift = confidence / consequent_support;
        let leverage = support - antecedent_support * consequent_support;
        let conviction = if union.count >= antecedent.count {
            f64::INFINITY
        } else {
            (1.0 - consequent_support) / (1.0 - confidence)
        };

        Self {
            antecedent: antecedent.itemset.clone(),
            consequent: consequent.itemset.clone(),
            antecedent_support,
            consequent_support,
            support,
            confidence,
            lift,
            leverage,
            conviction,
        }
    }
}

/// Ranking order: `metric` descending, then support descending, then
/// antecedent and consequent in ascending label order.
#[must_use]
pub fn rank_cmp(a: &AssociationRule, b: &AssociationRule, metric: Metric) -> Ordering {
    b.metric(metric)
        .total_cmp(&a.metric(metric))
        .then_with(|| b.support.total_cmp(&a.support))
        .then_with(|| a.antecedent.cmp(&b.antecedent))
        .then_with(|| a.consequent.cmp(&b.consequent))
}

/// Sort rules best-first by `metric` with deterministic tie-breaking.
pub fn sort_rules(rules: &mut [AssociationRule], metric: Metric) {
    rules.sort_by(|a, b| rank_cmp(a, b, metric));
}

/// Derives association rules from frequent itemsets.
///
/// # Example
///
/// ```
/// use arl_recommender::basket::PresenceMatrix;
/// use arl_recommender::config::Metric;
/// use arl_recommender::mining::{Apriori, RuleGenerator};
///
/// let matrix = PresenceMatrix::from_labels(&[
///     ("B1", &["X", "Y"]),
///     ("B2", &["X", "Y"]),
///     ("B3", &["X"]),
///     ("B4", &["Y", "Z"]),
/// ]);
/// let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
/// let rules = RuleGenerator::new()
///     .with_metric(Metric::Support)
///     .with_min_threshold(0.5)
///     .generate(&itemsets)
///     .unwrap();
///
/// assert_eq!(rules.len(), 2);
/// assert!((rules[0].confidence - 2.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RuleGenerator {
    metric: Metric,
    min_threshold: f64,
}

impl RuleGenerator {
    /// Support metric with a 0.01 threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metric: Metric::Support,
            min_threshold: 0.01,
        }
    }

    /// Generator settings taken from a pipeline configuration.
    #[must_use]
    pub fn from_config(config: &ArlConfig) -> Self {
        Self {
            metric: config.metric,
            min_threshold: config.min_threshold,
        }
    }

    /// Set the metric the threshold applies to.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the minimum metric value.
    #[must_use]
    pub fn with_min_threshold(mut self, min_threshold: f64) -> Self {
        self.min_threshold = min_threshold;
        self
    }

    /// Generate every rule whose metric reaches the threshold, sorted by
    /// [`rank_cmp`] on that metric.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::InvalidConfiguration`] for a negative or
    /// non-finite threshold, and [`ArlError::Internal`] if a subset of a
    /// frequent itemset is missing from `itemsets`.
    pub fn generate(&self, itemsets: &FrequentItemsets) -> Result<Vec<AssociationRule>> {
        validate_min_threshold(self.min_threshold)?;
        let n_baskets = itemsets.n_baskets();
        let mut rules = Vec::new();

        // For each frequent itemset with at least 2 items
        for union in itemsets.iter().filter(|e| e.itemset.len() >= 2) {
            for (antecedent, consequent) in proper_splits(&union.itemset)? {
                let antecedent = lookup(itemsets, &antecedent)?;
                let consequent = lookup(itemsets, &consequent)?;
                let rule = AssociationRule::from_counts(antecedent, consequent, union, n_baskets);
                if rule.metric(self.metric) >= self.min_threshold {
                    rules.push(rule);
                }
            }
        }

        sort_rules(&mut rules, self.metric);
        info!(
            rules = rules.len(),
            metric = %self.metric,
            min_threshold = self.min_threshold,
            "association rules generated"
        );
        Ok(rules)
    }
}

impl Default for RuleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(itemsets: &'a FrequentItemsets, itemset: &Itemset) -> Result<&'a FrequentItemset> {
    itemsets.get(itemset).ok_or_else(|| {
        ArlError::Internal(format!("subset {itemset} of a frequent itemset is not frequent"))
    })
}

/// All (antecedent, consequent) splits of `itemset` into two non-empty parts.
fn proper_splits(itemset: &Itemset) -> Result<Vec<(Itemset, Itemset)>> {
    let items = itemset.items();
    let n = items.len();
    if n >= u64::BITS as usize {
        return Err(ArlError::Internal(format!(
            "itemset of {n} items is too large to split"
        )));
    }

    // Masks 1..2^n - 1 skip the empty and full antecedents
    let full: u64 = (1 << n) - 1;
    let mut splits = Vec::with_capacity(full as usize - 1);
    for mask in 1..full {
        let (left, right): (Vec<_>, Vec<_>) = items
            .iter()
            .enumerate()
            .partition(|(i, _)| mask & (1u64 << *i) != 0);
        splits.push((
            Itemset::new(left.into_iter().map(|(_, item)| item.clone()))?,
            Itemset::new(right.into_iter().map(|(_, item)| item.clone()))?,
        ));
    }
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::{Item, PresenceMatrix};
    use crate::mining::Apriori;

    fn items(labels: &[&str]) -> Itemset {
        Itemset::new(labels.iter().map(|l| Item::named(*l))).unwrap()
    }

    fn scenario_itemsets() -> FrequentItemsets {
        let matrix = PresenceMatrix::from_labels(&[
            ("B1", &["X", "Y"]),
            ("B2", &["X", "Y"]),
            ("B3", &["X"]),
            ("B4", &["Y", "Z"]),
        ]);
        Apriori::new().with_min_support(0.5).mine(&matrix).unwrap()
    }

    fn four_basket_itemsets(min_support: f64) -> FrequentItemsets {
        let matrix = PresenceMatrix::from_labels(&[
            ("T1", &["1", "2", "3"]),
            ("T2", &["1", "2"]),
            ("T3", &["1", "3"]),
            ("T4", &["2", "3"]),
        ]);
        Apriori::new().with_min_support(min_support).mine(&matrix).unwrap()
    }

    #[test]
    fn test_scenario_rule_metrics() {
        let rules = RuleGenerator::new()
            .with_min_threshold(0.0)
            .generate(&scenario_itemsets())
            .unwrap();

        let rule = rules
            .iter()
            .find(|r| r.antecedent == items(&["X"]) && r.consequent == items(&["Y"]))
            .expect("Should have rule {X} => {Y}");

        assert!((rule.support - 0.5).abs() < 1e-12);
        assert!((rule.antecedent_support - 0.75).abs() < 1e-12);
        assert!((rule.consequent_support - 0.75).abs() < 1e-12);
        // Confidence({X} => {Y}) = 0.5 / 0.75 = 0.667
        assert!((rule.confidence - 0.6666666).abs() < 1e-5);
        // Lift({X} => {Y}) = 0.667 / 0.75 = 0.889
        assert!((rule.lift - 0.8888888).abs() < 1e-5);
        assert!((rule.leverage - (0.5 - 0.5625)).abs() < 1e-12);
        assert!((rule.conviction - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_one_gives_infinite_conviction() {
        let matrix = PresenceMatrix::from_labels(&[("B1", &["A", "B"]), ("B2", &["B"])]);
        let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
        let rules = RuleGenerator::new().generate(&itemsets).unwrap();
        let a_to_b = rules
            .iter()
            .find(|r| r.antecedent == items(&["A"]))
            .unwrap();
        assert_eq!(a_to_b.confidence, 1.0);
        assert!(a_to_b.conviction.is_infinite());
    }

    #[test]
    fn test_rules_from_three_itemset() {
        let matrix = PresenceMatrix::from_labels(&[
            ("T1", &["1", "2", "3"]),
            ("T2", &["1", "2", "3"]),
            ("T3", &["1", "2"]),
        ]);
        let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
        let rules = RuleGenerator::new().generate(&itemsets).unwrap();

        // Three pairs give 2 rules each, the triple gives 6
        assert_eq!(rules.len(), 12);
        for rule in &rules {
            assert!(rule.antecedent.is_disjoint(&rule.consequent));
            assert!(!rule.antecedent.is_empty() && !rule.consequent.is_empty());
        }
    }

    #[test]
    fn test_min_confidence_filter() {
        let rules = RuleGenerator::new()
            .with_metric(Metric::Confidence)
            .with_min_threshold(0.8)
            .generate(&four_basket_itemsets(0.25))
            .unwrap();

        for rule in &rules {
            assert!(
                rule.confidence >= 0.8,
                "Rule {} => {} has confidence {:.2} < 0.8",
                rule.antecedent,
                rule.consequent,
                rule.confidence
            );
        }
        // {1,2} => {3} has confidence 0.25 / 0.5 = 0.5 and is dropped
        assert!(!rules
            .iter()
            .any(|r| r.antecedent == items(&["1", "2"]) && r.consequent == items(&["3"])));
    }

    #[test]
    fn test_rules_sorted_by_metric_then_support_then_antecedent() {
        let rules = RuleGenerator::new()
            .with_metric(Metric::Confidence)
            .with_min_threshold(0.0)
            .generate(&four_basket_itemsets(0.5))
            .unwrap();

        // Six symmetric rules, all confidence 2/3 and support 0.5: antecedent order decides
        assert_eq!(rules.len(), 6);
        let order: Vec<(String, String)> = rules
            .iter()
            .map(|r| (r.antecedent.to_string(), r.consequent.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("{1}".to_string(), "{2}".to_string()),
                ("{1}".to_string(), "{3}".to_string()),
                ("{2}".to_string(), "{1}".to_string()),
                ("{2}".to_string(), "{3}".to_string()),
                ("{3}".to_string(), "{1}".to_string()),
                ("{3}".to_string(), "{2}".to_string()),
            ]
        );
    }

    #[test]
    fn test_sort_rules_by_lift() {
        let mut rules = RuleGenerator::new()
            .with_min_threshold(0.0)
            .generate(&four_basket_itemsets(0.25))
            .unwrap();
        sort_rules(&mut rules, Metric::Lift);
        for pair in rules.windows(2) {
            assert!(pair[0].lift >= pair[1].lift);
        }
    }

    #[test]
    fn test_single_item_itemsets_give_no_rules() {
        let matrix = PresenceMatrix::from_labels(&[("T1", &["1"]), ("T2", &["2"])]);
        let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
        assert_eq!(itemsets.len(), 2);
        assert!(RuleGenerator::new().generate(&itemsets).unwrap().is_empty());
    }

    #[test]
    fn test_empty_itemsets_give_no_rules() {
        let rules = RuleGenerator::new()
            .generate(&FrequentItemsets::default())
            .unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let err = RuleGenerator::new()
            .with_min_threshold(-1.0)
            .generate(&scenario_itemsets())
            .unwrap_err();
        assert!(matches!(err, ArlError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_proper_splits_count() {
        let splits = proper_splits(&items(&["a", "b", "c"])).unwrap();
        assert_eq!(splits.len(), 6);
        assert!(splits
            .iter()
            .all(|(l, r)| l.union(r) == items(&["a", "b", "c"]) && l.is_disjoint(r)));
    }
}
