use crate::error::Result;
use crate::sentiment;
use crate::types::{RawReviewData, Review, ReviewSource, SourceQuery};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

/// Result of a complete pipeline run for one source
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub source_name: String,
    pub total_reviews: usize,
    pub collected_reviews: usize,
    pub skipped_reviews: usize,
    pub errors: Vec<String>,
}

pub struct Pipeline;

impl Pipeline {
    /// Normalize and enrich a single raw review record
    #[instrument(skip(source, raw_review), fields(source_name = %source.source_name()))]
    fn process_review(
        source: &dyn ReviewSource,
        raw_review: &RawReviewData,
    ) -> Result<Option<Review>> {
        let (should_skip, skip_reason) = source.should_skip(raw_review);
        if should_skip {
            debug!("Skipping review: {}", skip_reason);
            return Ok(None);
        }

        let mut review = source.normalize(raw_review)?;

        // Enrich exactly once; the record is read-only downstream.
        let (label, score) = sentiment::classify(&review.review);
        review.sentiment_label = label;
        review.score = score;

        debug!("Successfully processed review by {}", review.username);
        Ok(Some(review))
    }

    /// Run the fetch → normalize → enrich stages for a single source.
    ///
    /// A fetch failure aborts the run; a failure on an individual record is
    /// recorded and the batch continues.
    #[instrument(skip(source, query), fields(source_name = %source.source_name()))]
    pub async fn run_for_source(
        source: Box<dyn ReviewSource>,
        query: &SourceQuery,
    ) -> Result<(Vec<Review>, PipelineResult)> {
        let source_name = source.source_name().to_string();
        info!("Starting pipeline for {}", source_name);
        println!("🚀 Starting pipeline for {}", source_name);
        counter!("rm_pipeline_runs_total", "source" => source_name.clone()).increment(1);
        let t_pipeline = std::time::Instant::now();

        // Step 1: Fetch raw reviews
        println!("📡 Fetching reviews from {}...", source_name);
        let t_fetch = std::time::Instant::now();
        let raw_reviews = source.fetch_reviews(query).await?;
        histogram!("rm_fetch_duration_seconds", "source" => source_name.clone())
            .record(t_fetch.elapsed().as_secs_f64());
        info!("Fetched {} raw reviews", raw_reviews.len());
        println!("✅ Fetched {} raw reviews", raw_reviews.len());

        // Step 2: Normalize and enrich
        println!("🔧 Processing reviews...");
        let mut reviews = Vec::new();
        let mut errors = Vec::new();
        let mut skipped = 0;

        for (i, raw_review) in raw_reviews.iter().enumerate() {
            match Self::process_review(&*source, raw_review) {
                Ok(Some(review)) => {
                    reviews.push(review);
                    if (i + 1) % 100 == 0 {
                        debug!("Processed {}/{} reviews", i + 1, raw_reviews.len());
                        println!("   Processed {}/{} reviews", i + 1, raw_reviews.len());
                    }
                }
                Ok(None) => {
                    skipped += 1;
                }
                Err(e) => {
                    let error_msg = format!("Failed to process review {i}: {e}");
                    error!("Processing failed for review {}: {}", i, e);
                    errors.push(error_msg);
                }
            }
        }

        info!(
            "Processed {} reviews ({} skipped, {} errors)",
            reviews.len(),
            skipped,
            errors.len()
        );
        println!(
            "✅ Processed {} reviews ({} skipped, {} errors)",
            reviews.len(),
            skipped,
            errors.len()
        );
        counter!("rm_reviews_collected_total", "source" => source_name.clone())
            .increment(reviews.len() as u64);
        counter!("rm_reviews_skipped_total", "source" => source_name.clone())
            .increment(skipped as u64);
        counter!("rm_review_errors_total", "source" => source_name.clone())
            .increment(errors.len() as u64);
        histogram!("rm_pipeline_duration_seconds", "source" => source_name.clone())
            .record(t_pipeline.elapsed().as_secs_f64());

        let result = PipelineResult {
            source_name,
            total_reviews: raw_reviews.len(),
            collected_reviews: reviews.len(),
            skipped_reviews: skipped,
            errors,
        };
        Ok((reviews, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReviewError;
    use crate::types::{SentimentLabel, SortOrder};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct StubSource;

    #[async_trait::async_trait]
    impl ReviewSource for StubSource {
        fn source_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_reviews(&self, _query: &SourceQuery) -> Result<Vec<RawReviewData>> {
            Ok(vec![
                json!({"user": "ann", "text": "great app", "rating": 5}),
                json!({"user": "bob", "text": "terrible, crashes", "rating": 1}),
                json!({"user": "skipme"}),
                json!({"rating": 3}),
            ])
        }

        fn normalize(&self, raw: &RawReviewData) -> Result<Review> {
            let username = raw["user"]
                .as_str()
                .ok_or_else(|| ReviewError::MissingField("user".to_string()))?;
            let text = raw["text"]
                .as_str()
                .ok_or_else(|| ReviewError::MissingField("text".to_string()))?;
            Ok(Review {
                username: username.to_string(),
                review: text.to_string(),
                rating: raw["rating"].as_u64().unwrap_or(3) as u8,
                like_count: 0,
                review_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                reply: None,
                reply_time: None,
                sentiment_label: SentimentLabel::Neutral,
                score: 0.0,
            })
        }

        fn should_skip(&self, raw: &RawReviewData) -> (bool, String) {
            if raw["user"].as_str() == Some("skipme") {
                return (true, "test skip".to_string());
            }
            (false, String::new())
        }
    }

    #[tokio::test]
    async fn record_failures_do_not_abort_the_batch() {
        let query = SourceQuery {
            app_id: "app".to_string(),
            lang: "en".to_string(),
            country: "us".to_string(),
            sort: SortOrder::Newest,
            max_reviews: 10,
        };
        let (reviews, result) = Pipeline::run_for_source(Box::new(StubSource), &query)
            .await
            .unwrap();

        assert_eq!(result.total_reviews, 4);
        assert_eq!(result.collected_reviews, 2);
        assert_eq!(result.skipped_reviews, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(reviews.len(), 2);
    }

    #[tokio::test]
    async fn reviews_are_enriched_with_sentiment() {
        let query = SourceQuery {
            app_id: "app".to_string(),
            lang: "en".to_string(),
            country: "us".to_string(),
            sort: SortOrder::Newest,
            max_reviews: 10,
        };
        let (reviews, _) = Pipeline::run_for_source(Box::new(StubSource), &query)
            .await
            .unwrap();

        assert_eq!(reviews[0].sentiment_label, SentimentLabel::Positive);
        assert_eq!(reviews[1].sentiment_label, SentimentLabel::Negative);
        assert!(reviews.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }
}
