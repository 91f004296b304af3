use crate::error::{ReviewError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw review data as returned from external store APIs/feeds
pub type RawReviewData = serde_json::Value;

/// Categorical sentiment classification of a review text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(ReviewError::Source {
                message: format!("unknown sentiment label: {other}"),
            }),
        }
    }
}

/// One user-submitted rating-plus-text record, the single entity of the
/// dataset. Built once at collection time, enriched once with a sentiment
/// label, then read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub username: String,
    pub review: String,
    pub rating: u8,
    pub like_count: u32,
    pub review_time: DateTime<Utc>,
    pub reply: Option<String>,
    pub reply_time: Option<DateTime<Utc>>,
    pub sentiment_label: SentimentLabel,
    pub score: f64,
}

/// Sort order requested from a review source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Newest,
    Helpful,
}

impl FromStr for SortOrder {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "helpful" => Ok(SortOrder::Helpful),
            other => Err(ReviewError::Config(format!("unknown sort order: {other}"))),
        }
    }
}

/// Parameters identifying what to fetch from a review source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceQuery {
    pub app_id: String,
    pub lang: String,
    pub country: String,
    pub sort: SortOrder,
    pub max_reviews: usize,
}

/// Core trait that all review data sources must implement
#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    /// Unique identifier for this source
    fn source_name(&self) -> &'static str;

    /// Fetch raw review records for the given query
    async fn fetch_reviews(&self, query: &SourceQuery) -> Result<Vec<RawReviewData>>;

    /// Map a raw record onto the canonical Review schema
    fn normalize(&self, raw: &RawReviewData) -> Result<Review>;

    /// Determine if a raw record should be skipped
    fn should_skip(&self, _raw: &RawReviewData) -> (bool, String) {
        (false, String::new())
    }
}
