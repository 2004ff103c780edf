//! Industry insights — AI-generated market analysis, one row per industry.
//!
//! An insight is created the first time any user selects its industry and
//! then shared by everyone in that industry. Rows carry a `next_update`
//! deadline; refreshing stale rows is an out-of-band job, not part of the
//! request path.

pub mod generator;
pub mod model;

pub use generator::{GeneratorConfig, InsightGenerator, LlmInsightGenerator};
pub use model::{DemandLevel, IndustryInsight, InsightData, MarketOutlook, SalaryRange};
