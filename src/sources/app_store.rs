use crate::error::{ReviewError, Result};
use crate::types::{RawReviewData, Review, ReviewSource, SentimentLabel, SortOrder, SourceQuery};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Reviews served per RSS feed page.
const PAGE_SIZE: usize = 50;

/// Collector for Apple App Store reviews via the public customer-reviews
/// RSS JSON feed. The feed carries no developer replies, so normalized
/// records always have the reply fields absent.
pub struct AppStoreSource {
    client: reqwest::Client,
}

impl AppStoreSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn sort_token(sort: SortOrder) -> &'static str {
        match sort {
            SortOrder::Newest => "mostrecent",
            SortOrder::Helpful => "mosthelpful",
        }
    }

    fn feed_url(query: &SourceQuery, page: usize) -> String {
        format!(
            "https://itunes.apple.com/{}/rss/customerreviews/page={}/id={}/sortby={}/json",
            query.country,
            page,
            query.app_id,
            Self::sort_token(query.sort)
        )
    }

    /// `feed.entry` is an array of reviews, a single object when the page
    /// holds one review, or absent past the last page.
    fn entries_from_feed(feed: &Value) -> Vec<RawReviewData> {
        match feed.pointer("/feed/entry") {
            Some(Value::Array(entries)) => entries.to_vec(),
            Some(entry @ Value::Object(_)) => vec![entry.clone()],
            _ => Vec::new(),
        }
    }

    fn label_str<'a>(raw: &'a Value, pointer: &str) -> Option<&'a str> {
        raw.pointer(pointer).and_then(|v| v.as_str())
    }
}

impl Default for AppStoreSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReviewSource for AppStoreSource {
    fn source_name(&self) -> &'static str {
        "app_store"
    }

    #[instrument(skip(self, query), fields(app_id = %query.app_id))]
    async fn fetch_reviews(&self, query: &SourceQuery) -> Result<Vec<RawReviewData>> {
        let pages = query.max_reviews.div_ceil(PAGE_SIZE).max(1);
        let mut all_reviews = Vec::new();

        for page in 1..=pages {
            let url = Self::feed_url(query, page);
            debug!("Fetching App Store feed page {}", page);
            let response = self.client.get(&url).send().await?;
            let feed: Value = response.json().await?;

            let entries = Self::entries_from_feed(&feed);
            if entries.is_empty() {
                debug!("Feed page {} was empty, stopping pagination", page);
                break;
            }
            all_reviews.extend(entries);
            if all_reviews.len() >= query.max_reviews {
                all_reviews.truncate(query.max_reviews);
                break;
            }
        }

        info!(
            "Successfully fetched {} reviews from the App Store",
            all_reviews.len()
        );
        Ok(all_reviews)
    }

    fn normalize(&self, raw: &RawReviewData) -> Result<Review> {
        let username = Self::label_str(raw, "/author/name/label")
            .ok_or_else(|| ReviewError::MissingField("author name".to_string()))?
            .trim()
            .to_string();

        let rating: i64 = Self::label_str(raw, "/im:rating/label")
            .ok_or_else(|| ReviewError::MissingField("rating".to_string()))?
            .parse()
            .map_err(|_| ReviewError::Source {
                message: "rating label was not an integer".to_string(),
            })?;
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::Source {
                message: format!("rating {rating} outside 1..=5"),
            });
        }

        let review = Self::label_str(raw, "/content/label")
            .unwrap_or_default()
            .to_string();

        let review_time = Self::label_str(raw, "/updated/label")
            .ok_or_else(|| ReviewError::MissingField("review timestamp".to_string()))
            .and_then(|stamp| {
                DateTime::parse_from_rfc3339(stamp).map_err(|e| ReviewError::Source {
                    message: format!("bad review timestamp '{stamp}': {e}"),
                })
            })?
            .with_timezone(&Utc);

        // voteSum can go negative when downvotes outweigh upvotes; the
        // dataset column is a non-negative like count.
        let like_count = Self::label_str(raw, "/im:voteSum/label")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| {
                if v < 0 {
                    warn!("Clamping negative vote sum {} to 0", v);
                }
                v.max(0) as u32
            })
            .unwrap_or(0);

        Ok(Review {
            username,
            review,
            rating: rating as u8,
            like_count,
            review_time,
            reply: None,
            reply_time: None,
            sentiment_label: SentimentLabel::Neutral,
            score: 0.0,
        })
    }
}
