//! Pattern mining algorithms for association rule discovery.
//!
//! This module discovers frequent itemsets in a basket presence matrix and
//! derives association rules from them (market basket analysis).
//!
//! # Algorithms
//!
//! - [`Apriori`]: level-wise frequent itemset mining with subset pruning
//! - [`RuleGenerator`]: rule derivation with support, confidence, lift,
//!   leverage and conviction
//!
//! # Example
//!
//! ```
//! use arl_recommender::basket::PresenceMatrix;
//! use arl_recommender::config::Metric;
//! use arl_recommender::mining::{Apriori, RuleGenerator};
//!
//! let matrix = PresenceMatrix::from_labels(&[
//!     ("B1", &["X", "Y"]),
//!     ("B2", &["X", "Y"]),
//!     ("B3", &["X"]),
//!     ("B4", &["Y", "Z"]),
//! ]);
//!
//! let itemsets = Apriori::new()
//!     .with_min_support(0.5)
//!     .mine(&matrix)
//!     .expect("valid support");
//! assert_eq!(itemsets.len(), 3);
//!
//! let rules = RuleGenerator::new()
//!     .with_metric(Metric::Confidence)
//!     .with_min_threshold(0.6)
//!     .generate(&itemsets)
//!     .expect("consistent itemsets");
//! for rule in &rules {
//!     println!("{} => {} (conf={:.2}, lift={:.2})",
//!         rule.antecedent, rule.consequent, rule.confidence, rule.lift);
//! }
//! ```

pub mod rules;

pub use rules::{sort_rules, AssociationRule, RuleGenerator};

use crate::basket::{Item, PresenceMatrix};
use crate::config::{validate_min_support, ArlConfig};
use crate::error::{ArlError, Result};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// A non-empty set of items, kept sorted and deduplicated.
///
/// Itemsets order lexicographically by their sorted item labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Itemset(Vec<Item>);

impl Itemset {
    /// Build an itemset from any collection of items.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::EmptyItemset`] if `items` is empty.
    pub fn new(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut items: Vec<Item> = items.into_iter().collect();
        if items.is_empty() {
            return Err(ArlError::EmptyItemset);
        }
        items.sort();
        items.dedup();
        Ok(Self(items))
    }

    /// The one-item itemset `{item}`.
    #[must_use]
    pub fn single(item: Item) -> Self {
        Self(vec![item])
    }

    /// Items in ascending label order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.0
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; itemsets are non-empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `item` is a member.
    #[must_use]
    pub fn contains(&self, item: &Item) -> bool {
        self.0.binary_search(item).is_ok()
    }

    /// Whether every member of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Itemset) -> bool {
        self.0.iter().all(|item| other.contains(item))
    }

    /// Whether `self` and `other` share no item.
    #[must_use]
    pub fn is_disjoint(&self, other: &Itemset) -> bool {
        !self.0.iter().any(|item| other.contains(item))
    }

    /// Union of two itemsets.
    #[must_use]
    pub fn union(&self, other: &Itemset) -> Itemset {
        let mut items = self.0.clone();
        items.extend(other.0.iter().cloned());
        items.sort();
        items.dedup();
        Itemset(items)
    }

    /// Items of `self` not in `other`, or `None` if nothing is left.
    #[must_use]
    pub fn difference(&self, other: &Itemset) -> Option<Itemset> {
        let items: Vec<Item> = self
            .0
            .iter()
            .filter(|item| !other.contains(item))
            .cloned()
            .collect();
        (!items.is_empty()).then_some(Itemset(items))
    }
}

impl fmt::Display for Itemset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Itemset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A frequent itemset with its basket count and support.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequentItemset {
    /// The items
    pub itemset: Itemset,
    /// Baskets containing every item
    pub count: usize,
    /// `count / n_baskets`
    pub support: f64,
}

/// All frequent itemsets of one mining run.
///
/// Entries are sorted by support descending, then size ascending, then
/// itemset order, so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrequentItemsets {
    n_baskets: usize,
    entries: Vec<FrequentItemset>,
    #[serde(skip)]
    index: BTreeMap<Itemset, usize>,
}

impl FrequentItemsets {
    fn from_entries(n_baskets: usize, mut entries: Vec<FrequentItemset>) -> Self {
        entries.sort_by(|a, b| {
            b.support
                .total_cmp(&a.support)
                .then_with(|| a.itemset.len().cmp(&b.itemset.len()))
                .then_with(|| a.itemset.cmp(&b.itemset))
        });
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.itemset.clone(), i))
            .collect();
        Self {
            n_baskets,
            entries,
            index,
        }
    }

    /// Number of baskets the supports are relative to.
    #[must_use]
    pub fn n_baskets(&self) -> usize {
        self.n_baskets
    }

    /// Number of frequent itemsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing met the support threshold.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &FrequentItemset> {
        self.entries.iter()
    }

    /// Lookup by itemset.
    #[must_use]
    pub fn get(&self, itemset: &Itemset) -> Option<&FrequentItemset> {
        self.index.get(itemset).map(|&i| &self.entries[i])
    }

    /// Support of `itemset` if it is frequent.
    #[must_use]
    pub fn support(&self, itemset: &Itemset) -> Option<f64> {
        self.get(itemset).map(|e| e.support)
    }

    /// Frequent itemsets with exactly `k` items.
    pub fn of_size(&self, k: usize) -> impl Iterator<Item = &FrequentItemset> {
        self.entries.iter().filter(move |e| e.itemset.len() == k)
    }

    /// Size of the largest frequent itemset (0 if empty).
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.entries.iter().map(|e| e.itemset.len()).max().unwrap_or(0)
    }

    /// Itemset → support mapping.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<Itemset, f64> {
        self.entries
            .iter()
            .map(|e| (e.itemset.clone(), e.support))
            .collect()
    }
}

impl<'a> IntoIterator for &'a FrequentItemsets {
    type Item = &'a FrequentItemset;
    type IntoIter = std::slice::Iter<'a, FrequentItemset>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Column-index itemset with its basket count.
type Level = Vec<(Vec<usize>, usize)>;

/// Apriori algorithm for frequent itemset mining.
///
/// # Algorithm
///
/// 1. Find frequent 1-itemsets (support >= `min_support`)
/// 2. Join frequent k-itemsets sharing their first k-1 items into
///    (k+1)-candidates
/// 3. Drop candidates with any infrequent k-subset
/// 4. Count the survivors against the matrix and keep the frequent ones
/// 5. Repeat until a level comes back empty or `max_len` is reached
///
/// # Example
///
/// ```
/// use arl_recommender::basket::{Item, PresenceMatrix};
/// use arl_recommender::mining::{Apriori, Itemset};
///
/// let matrix = PresenceMatrix::from_labels(&[
///     ("B1", &["1", "2", "3"]),
///     ("B2", &["1", "2"]),
///     ("B3", &["1", "3"]),
///     ("B4", &["2", "3"]),
/// ]);
///
/// let itemsets = Apriori::new().with_min_support(0.5).mine(&matrix).unwrap();
/// let pair = Itemset::new([Item::named("1"), Item::named("2")]).unwrap();
/// assert_eq!(itemsets.support(&pair), Some(0.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Apriori {
    min_support: f64,
    max_len: Option<usize>,
    parallel: bool,
}

impl Apriori {
    /// Create a new Apriori instance with default parameters.
    ///
    /// # Default Parameters
    ///
    /// - `min_support`: 0.01 (1%)
    /// - `max_len`: unbounded
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_support: 0.01,
            max_len: None,
            parallel: false,
        }
    }

    /// Miner settings taken from a pipeline configuration.
    #[must_use]
    pub fn from_config(config: &ArlConfig) -> Self {
        Self {
            min_support: config.min_support,
            max_len: config.max_len,
            parallel: config.parallel,
        }
    }

    /// Set the minimum support threshold, in (0, 1].
    #[must_use]
    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    /// Stop after itemsets of `max_len` items.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Count candidate supports on the rayon pool.
    ///
    /// Has no effect unless the `parallel` feature is enabled.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// The configured support threshold.
    #[must_use]
    pub fn min_support(&self) -> f64 {
        self.min_support
    }

    /// Mine every frequent itemset of `matrix`.
    ///
    /// A matrix with zero baskets yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::InvalidConfiguration`] if `min_support` is not in
    /// (0, 1] or `max_len` is zero.
    pub fn mine(&self, matrix: &PresenceMatrix) -> Result<FrequentItemsets> {
        validate_min_support(self.min_support)?;
        if self.max_len == Some(0) {
            return Err(ArlError::invalid_config("max_len", 0, ">= 1"));
        }

        let n_baskets = matrix.n_baskets();
        if n_baskets == 0 {
            return Ok(FrequentItemsets::default());
        }
        let min_count = self.min_count(n_baskets);

        let mut all: Level = Vec::new();
        let mut current = self.find_frequent_1_itemsets(matrix, min_count);
        let mut k = 1;

        loop {
            debug!(level = k, frequent = current.len(), "apriori level done");
            if current.is_empty() {
                break;
            }
            all.extend(current.iter().cloned());
            if self.max_len.is_some_and(|max| k >= max) {
                break;
            }

            let candidates = generate_candidates(&current);
            debug!(level = k + 1, candidates = candidates.len(), "generated candidates");
            if candidates.is_empty() {
                break;
            }

            current = self.prune_candidates(candidates, matrix, min_count);
            k += 1;
        }

        let entries = all
            .into_iter()
            .map(|(cols, count)| FrequentItemset {
                itemset: Itemset(cols.iter().map(|&c| matrix.items()[c].clone()).collect()),
                count,
                support: count as f64 / n_baskets as f64,
            })
            .collect();
        let itemsets = FrequentItemsets::from_entries(n_baskets, entries);
        info!(
            baskets = n_baskets,
            itemsets = itemsets.len(),
            max_len = itemsets.max_len(),
            min_support = self.min_support,
            "frequent itemsets mined"
        );
        Ok(itemsets)
    }

    /// Smallest basket count whose support ratio reaches `min_support`.
    ///
    /// Compares `count / n >= min_support` exactly as floats, so a count is
    /// frequent here iff its reported support passes the threshold.
    fn min_count(&self, n_baskets: usize) -> usize {
        let n = n_baskets as f64;
        let mut count = (self.min_support * n).floor() as usize;
        while count > 0 && (count - 1) as f64 / n >= self.min_support {
            count -= 1;
        }
        while count <= n_baskets && (count as f64 / n) < self.min_support {
            count += 1;
        }
        count.max(1)
    }

    /// Find all frequent 1-itemsets.
    fn find_frequent_1_itemsets(&self, matrix: &PresenceMatrix, min_count: usize) -> Level {
        let candidates: Vec<Vec<usize>> = (0..matrix.n_items()).map(|c| vec![c]).collect();
        self.prune_candidates(candidates, matrix, min_count)
    }

    /// Count candidates and keep those reaching `min_count`.
    fn prune_candidates(
        &self,
        candidates: Vec<Vec<usize>>,
        matrix: &PresenceMatrix,
        min_count: usize,
    ) -> Level {
        let counts = count_all(matrix, &candidates, self.parallel);
        candidates
            .into_iter()
            .zip(counts)
            .filter(|(_, count)| *count >= min_count)
            .collect()
    }
}

impl Default for Apriori {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate (k+1)-candidates from the frequent k-itemsets of `prev`.
///
/// `prev` is sorted lexicographically, so itemsets sharing a (k-1)-prefix
/// are contiguous.
fn generate_candidates(prev: &Level) -> Vec<Vec<usize>> {
    let frequent: HashSet<&[usize]> = prev.iter().map(|(cols, _)| cols.as_slice()).collect();
    let mut candidates = Vec::new();

    for i in 0..prev.len() {
        let set1 = &prev[i].0;
        let k = set1.len();
        for (set2, _) in &prev[i + 1..] {
            // Join step: same prefix, different last item
            if set1[..k - 1] != set2[..k - 1] {
                break;
            }
            let mut candidate = set1.clone();
            candidate.push(set2[k - 1]);

            // Prune step: all k-subsets must be frequent
            if !has_infrequent_subset(&candidate, &frequent) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

/// Check if a candidate has any infrequent (k-1)-subset.
fn has_infrequent_subset(candidate: &[usize], frequent: &HashSet<&[usize]>) -> bool {
    // The two subsets dropping one of the last two items are the join parents.
    let k = candidate.len();
    (0..k.saturating_sub(2)).any(|skip| {
        let subset: Vec<usize> = candidate
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| (i != skip).then_some(c))
            .collect();
        !frequent.contains(subset.as_slice())
    })
}

#[cfg(feature = "parallel")]
fn count_all(matrix: &PresenceMatrix, candidates: &[Vec<usize>], parallel: bool) -> Vec<usize> {
    if parallel {
        candidates
            .par_iter()
            .map(|cols| matrix.count_columns(cols))
            .collect()
    } else {
        candidates
            .iter()
            .map(|cols| matrix.count_columns(cols))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn count_all(matrix: &PresenceMatrix, candidates: &[Vec<usize>], _parallel: bool) -> Vec<usize> {
    candidates
        .iter()
        .map(|cols| matrix.count_columns(cols))
        .collect()
}
