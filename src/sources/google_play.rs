use crate::error::{ReviewError, Result};
use crate::types::{RawReviewData, Review, ReviewSource, SentimentLabel, SortOrder, SourceQuery};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

const BATCHEXECUTE_URL: &str = "https://play.google.com/_/PlayStoreUi/data/batchexecute";

/// Collector for Google Play reviews.
///
/// The Play Store has no public review API; the web frontend loads reviews
/// through the `batchexecute` RPC endpoint, which returns an anti-JSON
/// prefixed envelope wrapping a JSON string payload of positional arrays.
pub struct GooglePlaySource {
    client: reqwest::Client,
}

impl GooglePlaySource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn sort_token(sort: SortOrder) -> u8 {
        match sort {
            SortOrder::Newest => 2,
            SortOrder::Helpful => 1,
        }
    }

    /// Peels the batchexecute envelope down to the review array.
    ///
    /// Shape: `)]}'` prefix, then chunked lines; the payload line is a JSON
    /// array whose `[0][2]` element is itself a JSON-encoded string holding
    /// the actual response, with the review records at index 0.
    fn extract_reviews(body: &str) -> Result<Vec<RawReviewData>> {
        let stripped = body.trim_start_matches(")]}'").trim_start();
        let payload_line = stripped
            .lines()
            .find(|line| line.trim_start().starts_with("[["))
            .ok_or_else(|| ReviewError::Source {
                message: "batchexecute response contained no payload line".to_string(),
            })?;

        let envelope: Value = serde_json::from_str(payload_line)?;
        let inner_json = envelope
            .get(0)
            .and_then(|chunk| chunk.get(2))
            .and_then(|payload| payload.as_str())
            .ok_or_else(|| ReviewError::Source {
                message: "batchexecute payload missing inner JSON string".to_string(),
            })?;

        let inner: Value = serde_json::from_str(inner_json)?;
        let reviews = inner
            .get(0)
            .and_then(|r| r.as_array())
            .ok_or_else(|| ReviewError::Source {
                message: "batchexecute payload held no review array".to_string(),
            })?;

        Ok(reviews.to_vec())
    }

    fn timestamp_from(value: &Value, field: &str) -> Result<DateTime<Utc>> {
        let secs = value
            .as_i64()
            .ok_or_else(|| ReviewError::MissingField(field.to_string()))?;
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| ReviewError::Source {
                message: format!("{field} out of range: {secs}"),
            })
    }
}

impl Default for GooglePlaySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReviewSource for GooglePlaySource {
    fn source_name(&self) -> &'static str {
        "google_play"
    }

    #[instrument(skip(self, query), fields(app_id = %query.app_id))]
    async fn fetch_reviews(&self, query: &SourceQuery) -> Result<Vec<RawReviewData>> {
        debug!("Fetching reviews from Google Play batchexecute endpoint");
        let rpc_arg = format!(
            "[null,null,[2,{},[{},null,null]],[\"{}\",7]]",
            Self::sort_token(query.sort),
            query.max_reviews,
            query.app_id
        );
        let f_req = format!(
            "[[[\"UsvDTd\",{},null,\"generic\"]]]",
            serde_json::to_string(&rpc_arg)?
        );

        let url = format!(
            "{}?hl={}&gl={}",
            BATCHEXECUTE_URL, query.lang, query.country
        );
        let response = self
            .client
            .post(&url)
            .form(&[("f.req", f_req)])
            .send()
            .await?;
        let body = response.text().await?;

        let mut reviews = Self::extract_reviews(&body)?;
        if reviews.len() > query.max_reviews {
            reviews.truncate(query.max_reviews);
        }
        info!(
            "Successfully fetched {} reviews from Google Play",
            reviews.len()
        );
        Ok(reviews)
    }

    /// A raw Play review is a positional array: reviewer at `[1][0]`, rating
    /// at `[2]`, text at `[4]`, posted-at unix seconds at `[5][0]`, thumbs-up
    /// count at `[6]`, and the developer reply (text, [posted-at]) at `[7]`.
    fn normalize(&self, raw: &RawReviewData) -> Result<Review> {
        let username = raw
            .get(1)
            .and_then(|u| u.get(0))
            .and_then(|n| n.as_str())
            .ok_or_else(|| ReviewError::MissingField("reviewer name".to_string()))?
            .trim()
            .to_string();

        let rating = raw
            .get(2)
            .and_then(|r| r.as_i64())
            .ok_or_else(|| ReviewError::MissingField("rating".to_string()))?;
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::Source {
                message: format!("rating {rating} outside 1..=5"),
            });
        }

        // Rating-only reviews carry a null text node; null-fill rather than fail.
        let review = raw
            .get(4)
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let review_time = raw
            .get(5)
            .and_then(|t| t.get(0))
            .map(|secs| Self::timestamp_from(secs, "review timestamp"))
            .transpose()?
            .ok_or_else(|| ReviewError::MissingField("review timestamp".to_string()))?;

        let like_count = raw.get(6).and_then(|l| l.as_u64()).unwrap_or(0) as u32;

        let mut reply = raw
            .get(7)
            .and_then(|r| r.get(1))
            .and_then(|t| t.as_str())
            .map(|s| s.trim().to_string());
        let mut reply_time = raw
            .get(7)
            .and_then(|r| r.get(2))
            .and_then(|t| t.get(0))
            .map(|secs| Self::timestamp_from(secs, "reply timestamp"))
            .transpose()?;

        // A reply stamped before the review it answers is source noise;
        // treat the whole reply as absent.
        if let Some(rt) = reply_time {
            if rt < review_time {
                warn!("Dropping reply timestamped before its review");
                reply = None;
                reply_time = None;
            }
        }

        Ok(Review {
            username,
            review,
            rating: rating as u8,
            like_count,
            review_time,
            reply,
            reply_time,
            sentiment_label: SentimentLabel::Neutral,
            score: 0.0,
        })
    }

    fn should_skip(&self, raw: &RawReviewData) -> (bool, String) {
        if raw.get(4).map(|t| t.is_null()).unwrap_or(true) {
            return (true, "Rating-only review with no text.".to_string());
        }
        (false, String::new())
    }
}
