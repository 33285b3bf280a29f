//! End-to-end run: records → baskets → itemsets → rules.

use crate::basket::{BasketBuilder, BuildReport, Item, PresenceMatrix, RawRecord};
use crate::config::{ArlConfig, Metric};
use crate::error::Result;
use crate::mining::{Apriori, AssociationRule, FrequentItemsets, RuleGenerator};
use crate::recommend::{recommend, ArlRecommender};

/// A validated configuration bound to the four pipeline stages.
///
/// # Example
///
/// ```
/// use arl_recommender::basket::{Item, RawRecord};
/// use arl_recommender::config::ArlConfig;
/// use arl_recommender::pipeline::ArlPipeline;
///
/// let records = vec![
///     RawRecord::new("1", "2", "0", "2017-08-01 10:00:00"),
///     RawRecord::new("1", "15", "1", "2017-08-03 10:00:00"),
///     RawRecord::new("2", "2", "0", "2017-09-11 10:00:00"),
///     RawRecord::new("2", "15", "1", "2017-09-12 10:00:00"),
///     RawRecord::new("3", "9", "4", "2017-09-12 10:00:00"),
/// ];
///
/// let pipeline = ArlPipeline::new(ArlConfig::new().with_min_support(0.5)).unwrap();
/// let output = pipeline.run(&records).unwrap();
/// assert_eq!(output.matrix.n_baskets(), 3);
/// assert_eq!(output.recommend(&Item::new("2", "0"), 1), vec![Item::new("15", "1")]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArlPipeline {
    config: ArlConfig,
}

impl ArlPipeline {
    /// Validate `config` up front.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ArlError::InvalidConfiguration`] before any work is done.
    pub fn new(config: ArlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ArlConfig {
        &self.config
    }

    /// Run every stage over `records`.
    ///
    /// # Errors
    ///
    /// Fails only under the fail-fast policy on a malformed record. Empty
    /// input, or input with no frequent itemsets, gives empty results.
    pub fn run(&self, records: &[RawRecord]) -> Result<PipelineOutput> {
        let build = BasketBuilder::from_config(&self.config).build(records)?;
        let itemsets = Apriori::from_config(&self.config).mine(&build.matrix)?;
        let rules = RuleGenerator::from_config(&self.config).generate(&itemsets)?;

        Ok(PipelineOutput {
            report: build.report,
            matrix: build.matrix,
            itemsets,
            rules,
        })
    }
}

/// Every artifact of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Record accounting from basket construction
    pub report: BuildReport,
    /// Basket × item presence table
    pub matrix: PresenceMatrix,
    /// Frequent itemsets with supports
    pub itemsets: FrequentItemsets,
    /// Rules sorted by the configured metric
    pub rules: Vec<AssociationRule>,
}

impl PipelineOutput {
    /// Recommend for `item`, ranking rules by lift.
    #[must_use]
    pub fn recommend(&self, item: &Item, top_n: usize) -> Vec<Item> {
        recommend(item, &self.rules, top_n, Metric::Lift)
    }

    /// A lift-ranked recommender over a copy of the rules.
    #[must_use]
    pub fn recommender(&self) -> ArlRecommender {
        ArlRecommender::new(self.rules.clone(), Metric::Lift)
    }
}
