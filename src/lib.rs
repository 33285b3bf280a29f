//! Association rule learning for service recommendation.
//!
//! Historical purchases are grouped into baskets (one user's services within
//! one calendar month), frequent itemsets are mined with Apriori, and
//! association rules derived from them drive "customers who bought X also
//! bought Y" recommendations.
//!
//! # Quick Start
//!
//! ```
//! use arl_recommender::prelude::*;
//!
//! let records = vec![
//!     RawRecord::new("7256", "9", "4", "2017-08-06 16:11:00"),
//!     RawRecord::new("7256", "46", "4", "2017-08-21 10:00:00"),
//!     RawRecord::new("7256", "9", "4", "2017-10-02 09:30:00"),
//!     RawRecord::new("7256", "38", "4", "2017-10-14 12:45:00"),
//!     RawRecord::new("10000", "9", "4", "2017-08-02 09:30:00"),
//!     RawRecord::new("10000", "46", "4", "2017-08-30 09:30:00"),
//! ];
//!
//! let config = ArlConfig::new().with_min_support(0.5);
//! let output = ArlPipeline::new(config).unwrap().run(&records).unwrap();
//!
//! let picks = output.recommend(&Item::new("46", "4"), 1);
//! assert_eq!(picks, vec![Item::new("9", "4")]);
//! ```
//!
//! # Modules
//!
//! - [`basket`]: Records, items, baskets and the presence matrix
//! - [`mining`]: Apriori frequent itemsets and association rules
//! - [`recommend`]: Rule lookup for next-item suggestions
//! - [`pipeline`]: All stages wired to one [`config::ArlConfig`]
//! - [`config`]: Thresholds, metrics and policies
//! - [`error`]: Error type
//!
//! # Features
//!
//! - `parallel`: count candidate supports on the rayon thread pool

pub mod basket;
pub mod config;
pub mod error;
pub mod mining;
pub mod pipeline;
pub mod prelude;
pub mod recommend;

pub use error::{ArlError, Result};
