//! Industry insight data model.
//!
//! The JSON field names are camelCase because they are shared with the
//! generation prompt: the model is asked for exactly this shape, and the
//! parsed payload is served back to API clients unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hiring demand for an industry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandLevel {
    #[serde(alias = "HIGH", alias = "high")]
    High,
    #[serde(alias = "MEDIUM", alias = "medium")]
    Medium,
    #[serde(alias = "LOW", alias = "low")]
    Low,
}

impl std::fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// Overall market direction for an industry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketOutlook {
    #[serde(alias = "POSITIVE", alias = "positive")]
    Positive,
    #[serde(alias = "NEUTRAL", alias = "neutral")]
    Neutral,
    #[serde(alias = "NEGATIVE", alias = "negative")]
    Negative,
}

impl std::fmt::Display for MarketOutlook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "Positive"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Negative => write!(f, "Negative"),
        }
    }
}

/// Salary distribution for one role within an industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRange {
    pub role: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub median: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// The AI-generated portion of an industry insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightData {
    pub salary_ranges: Vec<SalaryRange>,
    /// Projected growth, as a percentage.
    pub growth_rate: f64,
    pub demand_level: DemandLevel,
    pub top_skills: Vec<String>,
    pub market_outlook: MarketOutlook,
    pub key_trends: Vec<String>,
    pub recommended_skills: Vec<String>,
}

/// A stored insight row: one per industry, refreshed on a fixed cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryInsight {
    pub id: Uuid,
    /// Industry key, e.g. "tech-software-development". Unique across rows.
    pub industry: String,
    #[serde(flatten)]
    pub data: InsightData,
    pub last_updated: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
}

impl IndustryInsight {
    /// Wrap freshly generated data for an industry. `next_update` is set
    /// `refresh_days` ahead so an out-of-band refresh job knows when this
    /// row goes stale.
    pub fn new(industry: impl Into<String>, data: InsightData, refresh_days: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            industry: industry.into(),
            data,
            last_updated: now,
            next_update: now + chrono::Duration::days(i64::from(refresh_days)),
        }
    }

    /// Whether the refresh deadline has passed.
    pub fn is_stale(&self) -> bool {
        Utc::now() >= self.next_update
    }
}
