//! Basket construction from raw transaction records.
//!
//! A basket is one user's purchases within one time bucket (a calendar month
//! by default). Records are grouped into baskets and reduced to a binary
//! presence matrix with one row per basket and one column per item.
//!
//! # Example
//!
//! ```
//! use arl_recommender::basket::{BasketBuilder, RawRecord};
//!
//! let records = vec![
//!     RawRecord::new("7256", "9", "4", "2017-08-06 16:11:00"),
//!     RawRecord::new("7256", "46", "4", "2017-08-21 10:00:00"),
//!     RawRecord::new("7256", "9", "4", "2017-10-02 09:30:00"),
//!     RawRecord::new("7256", "38", "4", "2017-10-14 12:45:00"),
//! ];
//!
//! let build = BasketBuilder::new().build(&records).expect("valid records");
//! assert_eq!(build.matrix.shape(), (2, 3));
//! assert_eq!(build.report.skipped_records, 0);
//! ```

use crate::config::{ArlConfig, BasketGranularity, MalformedRecordPolicy};
use crate::error::{ArlError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, warn};

/// Separator joining identifier parts in item and basket labels.
///
/// Joins are not injective when a part itself contains `_`: `("1_2", "3")`
/// and `("1", "2_3")` both give `1_2_3`. [`Item::parse`] splits at the last one.
pub const LABEL_SEPARATOR: char = '_';

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// An unvalidated input row, as a driver would deserialize it from CSV.
///
/// Missing or blank fields are `None`/empty and cause the record to be
/// rejected by [`TransactionRecord::from_raw`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Customer identifier
    pub user_id: Option<String>,
    /// Service identifier (only unique within a category)
    pub item_id: Option<String>,
    /// Category identifier
    pub category_id: Option<String>,
    /// Purchase time, ISO-8601 style
    pub timestamp: Option<String>,
}

impl RawRecord {
    /// Create a record with every field present.
    pub fn new(
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        category_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            item_id: Some(item_id.into()),
            category_id: Some(category_id.into()),
            timestamp: Some(timestamp.into()),
        }
    }
}

/// A validated transaction: all identifiers present, timestamp parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    user_id: String,
    item_id: String,
    category_id: String,
    timestamp: NaiveDateTime,
}

impl TransactionRecord {
    /// Validate and build a record.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::MalformedRecord`] (index 0) if an identifier is
    /// blank or the timestamp cannot be parsed.
    pub fn new(user_id: &str, item_id: &str, category_id: &str, timestamp: &str) -> Result<Self> {
        Self::from_raw(0, &RawRecord::new(user_id, item_id, category_id, timestamp))
    }

    /// Validate the record at position `index` of an input sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::MalformedRecord`] carrying `index` and the first
    /// problem found.
    pub fn from_raw(index: usize, raw: &RawRecord) -> Result<Self> {
        let user_id = required(index, "user_id", raw.user_id.as_deref())?;
        let item_id = required(index, "item_id", raw.item_id.as_deref())?;
        let category_id = required(index, "category_id", raw.category_id.as_deref())?;
        let ts_text = required(index, "timestamp", raw.timestamp.as_deref())?;
        let timestamp = parse_timestamp(ts_text).ok_or_else(|| {
            ArlError::malformed(index, format!("unparsable timestamp '{ts_text}'"))
        })?;

        Ok(Self {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            category_id: category_id.to_string(),
            timestamp,
        })
    }

    /// Customer identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Raw service identifier.
    #[must_use]
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Category identifier.
    #[must_use]
    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    /// Parsed purchase time (wall clock as written in the source).
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// The composite item this record refers to.
    #[must_use]
    pub fn item(&self) -> Item {
        Item::new(&self.item_id, &self.category_id)
    }

    /// The basket this record belongs to under `granularity`.
    #[must_use]
    pub fn basket_id(&self, granularity: BasketGranularity) -> BasketId {
        BasketId::new(&self.user_id, &time_bucket(self.timestamp, granularity))
    }
}

fn required<'a>(index: usize, field: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ArlError::malformed(index, format!("missing {field}"))),
    }
}

/// Parse an ISO-8601 style timestamp.
///
/// Accepts RFC 3339 (offset kept as written, not converted to UTC),
/// `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM`, bare `YYYY-MM-DD` and bare
/// `YYYY-MM` (read as midnight on the first of the month).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_year_month(text))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// chrono needs a day to build a date, so `YYYY-MM` is matched by hand.
fn parse_year_month(text: &str) -> Option<NaiveDate> {
    let (year, month) = text.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Truncate a timestamp to its bucket label, e.g. `2017-08` for months.
#[must_use]
pub fn time_bucket(timestamp: NaiveDateTime, granularity: BasketGranularity) -> String {
    match granularity {
        BasketGranularity::Day => timestamp.format("%Y-%m-%d").to_string(),
        BasketGranularity::Week => {
            let week = timestamp.iso_week();
            format!("{:04}-W{:02}", week.year(), week.week())
        }
        BasketGranularity::Month => timestamp.format("%Y-%m").to_string(),
        BasketGranularity::Year => format!("{:04}", timestamp.year()),
    }
}

/// A service offering: raw item id combined with its category, e.g. `9_4`.
///
/// The same raw item id under two categories gives two distinct items.
/// Items order lexicographically by label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(String);

impl Item {
    /// Combine an item id and a category id.
    #[must_use]
    pub fn new(item_id: &str, category_id: &str) -> Self {
        Self(format!("{item_id}{LABEL_SEPARATOR}{category_id}"))
    }

    /// Parse a combined `<item_id>_<category_id>` label, splitting at the last `_`.
    ///
    /// # Errors
    ///
    /// Returns [`ArlError::InvalidItemLabel`] when either side is empty.
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        match label.rsplit_once(LABEL_SEPARATOR) {
            Some((item, category)) if !item.is_empty() && !category.is_empty() => {
                Ok(Self::new(item, category))
            }
            _ => Err(ArlError::InvalidItemLabel(label.to_string())),
        }
    }

    /// An item identified only by an opaque label.
    #[must_use]
    pub fn named(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Full label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }

    /// Raw item id part of the label.
    #[must_use]
    pub fn item_id(&self) -> &str {
        self.0
            .rsplit_once(LABEL_SEPARATOR)
            .map_or(self.0.as_str(), |(item, _)| item)
    }

    /// Category part of the label, if the label has one.
    #[must_use]
    pub fn category_id(&self) -> Option<&str> {
        self.0.rsplit_once(LABEL_SEPARATOR).map(|(_, cat)| cat)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Basket identity: user id combined with a time bucket, e.g. `7256_2017-08`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasketId(String);

impl BasketId {
    /// Combine a user id with a bucket label.
    #[must_use]
    pub fn new(user_id: &str, bucket: &str) -> Self {
        Self(format!("{user_id}{LABEL_SEPARATOR}{bucket}"))
    }

    /// A basket identified only by an opaque label.
    #[must_use]
    pub fn named(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Full label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BasketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary basket × item table.
///
/// Rows and columns are sorted by label and unique. Cells are stored
/// row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresenceMatrix {
    baskets: Vec<BasketId>,
    items: Vec<Item>,
    cells: Vec<bool>,
}

impl PresenceMatrix {
    /// Pivot a basket → items mapping into a matrix.
    #[must_use]
    pub fn from_baskets(baskets: &BTreeMap<BasketId, BTreeSet<Item>>) -> Self {
        let items: Vec<Item> = baskets
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n_items = items.len();
        let mut cells = vec![false; baskets.len() * n_items];

        for (row, basket_items) in baskets.values().enumerate() {
            for item in basket_items {
                if let Ok(col) = items.binary_search(item) {
                    cells[row * n_items + col] = true;
                }
            }
        }

        Self {
            baskets: baskets.keys().cloned().collect(),
            items,
            cells,
        }
    }

    /// Build a matrix from `(basket, items)` label pairs.
    ///
    /// Repeated baskets are merged and repeated items collapse to presence.
    ///
    /// ```
    /// use arl_recommender::basket::PresenceMatrix;
    ///
    /// let m = PresenceMatrix::from_labels(&[("B1", &["X", "Y"]), ("B2", &["X", "X"])]);
    /// assert_eq!(m.shape(), (2, 2));
    /// ```
    #[must_use]
    pub fn from_labels(rows: &[(&str, &[&str])]) -> Self {
        let mut baskets: BTreeMap<BasketId, BTreeSet<Item>> = BTreeMap::new();
        for (basket, items) in rows {
            baskets
                .entry(BasketId::named(*basket))
                .or_default()
                .extend(items.iter().map(|label| Item::named(*label)));
        }
        Self::from_baskets(&baskets)
    }

    /// Returns the shape as (`n_baskets`, `n_items`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.baskets.len(), self.items.len())
    }

    /// Number of basket rows.
    #[must_use]
    pub fn n_baskets(&self) -> usize {
        self.baskets.len()
    }

    /// Number of item columns.
    #[must_use]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// True when there are no baskets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.baskets.is_empty()
    }

    /// Row labels.
    #[must_use]
    pub fn baskets(&self) -> &[BasketId] {
        &self.baskets
    }

    /// Column labels.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Column index of `item`.
    #[must_use]
    pub fn item_index(&self, item: &Item) -> Option<usize> {
        self.items.binary_search(item).ok()
    }

    /// Row index of `basket`.
    #[must_use]
    pub fn basket_index(&self, basket: &BasketId) -> Option<usize> {
        self.baskets.binary_search(basket).ok()
    }

    /// Cell value; out-of-range positions read as absent.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.baskets.len()
            && col < self.items.len()
            && self.cells[row * self.items.len() + col]
    }

    /// Whether `item` was bought in `basket`.
    #[must_use]
    pub fn contains(&self, basket: &BasketId, item: &Item) -> bool {
        match (self.basket_index(basket), self.item_index(item)) {
            (Some(row), Some(col)) => self.get(row, col),
            _ => false,
        }
    }

    /// One basket row as a slice of presence flags, `None` past the last row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[bool]> {
        if row >= self.baskets.len() {
            return None;
        }
        let n = self.items.len();
        self.cells.get(row * n..(row + 1) * n)
    }

    /// Items present in the basket at `row`; empty past the last row.
    pub fn basket_items(&self, row: usize) -> impl Iterator<Item = &Item> + '_ {
        self.row(row)
            .unwrap_or_default()
            .iter()
            .zip(&self.items)
            .filter_map(|(&present, item)| present.then_some(item))
    }

    /// Number of baskets whose row has every column in `cols` set.
    #[must_use]
    pub fn count_columns(&self, cols: &[usize]) -> usize {
        let n = self.items.len();
        if cols.iter().any(|&c| c >= n) {
            return 0;
        }
        self.cells
            .chunks_exact(n.max(1))
            .take(self.baskets.len())
            .filter(|row| cols.iter().all(|&c| row[c]))
            .count()
    }

    /// Fraction of baskets containing every item of `items`.
    ///
    /// Unknown items give 0.0, as does an empty matrix.
    #[must_use]
    pub fn support(&self, items: &[Item]) -> f64 {
        if self.baskets.is_empty() {
            return 0.0;
        }
        let cols: Option<Vec<usize>> = items.iter().map(|i| self.item_index(i)).collect();
        match cols {
            Some(cols) => self.count_columns(&cols) as f64 / self.baskets.len() as f64,
            None => 0.0,
        }
    }
}

/// A record rejected during basket construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// Zero-based position in the input
    pub index: usize,
    /// Why it was rejected
    pub reason: String,
}

/// Summary of one basket build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BuildReport {
    /// Records seen
    pub total_records: usize,
    /// Records that made it into a basket
    pub accepted_records: usize,
    /// Records dropped under the skip policy
    pub skipped_records: usize,
    /// Details for each skipped record
    pub rejected: Vec<RejectedRecord>,
    /// Distinct baskets
    pub n_baskets: usize,
    /// Distinct items
    pub n_items: usize,
}

/// Output of [`BasketBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BasketBuild {
    /// Basket × item presence table
    pub matrix: PresenceMatrix,
    /// Accepted/skipped accounting
    pub report: BuildReport,
}

/// Groups transaction records into baskets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasketBuilder {
    granularity: BasketGranularity,
    policy: MalformedRecordPolicy,
}

impl BasketBuilder {
    /// Monthly baskets, skipping malformed records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder settings taken from a pipeline configuration.
    #[must_use]
    pub fn from_config(config: &ArlConfig) -> Self {
        Self {
            granularity: config.basket_granularity,
            policy: config.on_malformed,
        }
    }

    /// Set the basket time bucket.
    #[must_use]
    pub fn with_granularity(mut self, granularity: BasketGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set the malformed record policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MalformedRecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate `records` and pivot them into a presence matrix.
    ///
    /// # Errors
    ///
    /// Under [`MalformedRecordPolicy::FailFast`], returns the first
    /// [`ArlError::MalformedRecord`]. Under the skip policy this never fails.
    pub fn build(&self, records: &[RawRecord]) -> Result<BasketBuild> {
        let mut valid = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for (index, raw) in records.iter().enumerate() {
            match TransactionRecord::from_raw(index, raw) {
                Ok(record) => valid.push(record),
                Err(err) => match self.policy {
                    MalformedRecordPolicy::FailFast => return Err(err),
                    MalformedRecordPolicy::Skip => {
                        let reason = match err {
                            ArlError::MalformedRecord { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        warn!(index, %reason, "skipping malformed record");
                        rejected.push(RejectedRecord { index, reason });
                    }
                },
            }
        }

        if !rejected.is_empty() {
            warn!(
                skipped = rejected.len(),
                total = records.len(),
                "malformed records skipped"
            );
        }

        let matrix = self.build_validated(&valid);
        let report = BuildReport {
            total_records: records.len(),
            accepted_records: valid.len(),
            skipped_records: rejected.len(),
            rejected,
            n_baskets: matrix.n_baskets(),
            n_items: matrix.n_items(),
        };
        info!(
            baskets = report.n_baskets,
            items = report.n_items,
            accepted = report.accepted_records,
            skipped = report.skipped_records,
            "basket matrix built"
        );

        Ok(BasketBuild { matrix, report })
    }

    /// Pivot already-validated records into a presence matrix.
    #[must_use]
    pub fn build_validated(&self, records: &[TransactionRecord]) -> PresenceMatrix {
        let mut baskets: BTreeMap<BasketId, BTreeSet<Item>> = BTreeMap::new();
        for record in records {
            baskets
                .entry(record.basket_id(self.granularity))
                .or_default()
                .insert(record.item());
        }
        PresenceMatrix::from_baskets(&baskets)
    }
}
