use crate::dataset;
use crate::error::Result;
use crate::types::Review;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

/// Runs the fixed battery of descriptive aggregations over a persisted
/// review dataset. Each query is independent and stateless; the dataset is
/// loaded once into an in-memory SQLite table and only ever read.
pub struct Analyzer {
    conn: Connection,
}

impl Analyzer {
    pub fn from_reviews(reviews: &[Review]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r#"
            CREATE TABLE reviews (
                username     TEXT    NOT NULL,
                review       TEXT    NOT NULL,
                rating       INTEGER NOT NULL,
                like_count   INTEGER NOT NULL,
                review_time  TEXT    NOT NULL,
                reply        TEXT,
                reply_time   TEXT,
                sentiment    TEXT    NOT NULL,
                score        REAL    NOT NULL
            );
            "#,
        )?;

        {
            let mut stmt = conn.prepare(
                "INSERT INTO reviews
                 (username, review, rating, like_count, review_time, reply, reply_time, sentiment, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for review in reviews {
                stmt.execute(params![
                    review.username,
                    review.review,
                    review.rating as i64,
                    review.like_count as i64,
                    review.review_time.to_rfc3339(),
                    review.reply,
                    review.reply_time.map(|t| t.to_rfc3339()),
                    review.sentiment_label.as_str(),
                    review.score,
                ])?;
            }
        }

        debug!("Loaded {} reviews into the report table", reviews.len());
        Ok(Self { conn })
    }

    pub fn from_dataset<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reviews = dataset::read_dataset(path)?;
        Self::from_reviews(&reviews)
    }

    pub fn total_reviews(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Query 1: review count and average rating per sentiment label.
    pub fn sentiment_summary(&self) -> Result<Vec<(String, i64, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT sentiment, COUNT(*) AS n, AVG(rating)
             FROM reviews GROUP BY sentiment ORDER BY n DESC, sentiment",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 2: rating distribution.
    pub fn rating_distribution(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rating, COUNT(*) FROM reviews GROUP BY rating ORDER BY rating",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 3: overall average rating. None on an empty dataset.
    pub fn average_rating(&self) -> Result<Option<f64>> {
        let avg = self
            .conn
            .query_row("SELECT AVG(rating) FROM reviews", [], |row| row.get(0))?;
        Ok(avg)
    }

    /// Query 4: (rating, sentiment) matrix; every row falls in exactly one cell.
    pub fn rating_sentiment_matrix(&self) -> Result<Vec<(i64, String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rating, sentiment, COUNT(*)
             FROM reviews GROUP BY rating, sentiment ORDER BY rating, sentiment",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 5: top-k reviewers by review count.
    pub fn top_reviewers(&self, k: usize) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT username, COUNT(*) AS n
             FROM reviews GROUP BY username ORDER BY n DESC, username LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![k as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 6: top-k reviews by like count.
    pub fn most_liked_reviews(&self, k: usize) -> Result<Vec<(String, i64, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT username, like_count, substr(review, 1, 60)
             FROM reviews ORDER BY like_count DESC, username LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![k as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 7: reviews per calendar month.
    pub fn monthly_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT strftime('%Y-%m', review_time) AS month, COUNT(*)
             FROM reviews GROUP BY month ORDER BY month",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 8a: average review→reply delay in hours, over replied reviews.
    pub fn average_response_time_hours(&self) -> Result<Option<f64>> {
        let avg = self.conn.query_row(
            "SELECT AVG((julianday(reply_time) - julianday(review_time)) * 24.0)
             FROM reviews WHERE reply_time IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    /// Query 8b: the same delay broken down by rating.
    pub fn response_time_by_rating(&self) -> Result<Vec<(i64, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rating, AVG((julianday(reply_time) - julianday(review_time)) * 24.0)
             FROM reviews WHERE reply_time IS NOT NULL GROUP BY rating ORDER BY rating",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 9: replied vs total review counts per rating.
    pub fn reply_coverage_by_rating(&self) -> Result<Vec<(i64, i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rating,
                    SUM(CASE WHEN reply IS NOT NULL THEN 1 ELSE 0 END) AS replied,
                    COUNT(*) AS total
             FROM reviews GROUP BY rating ORDER BY rating",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Query 10: each review categorized against the computed mean rating.
    pub fn rating_threshold_categories(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE WHEN rating >= (SELECT AVG(rating) FROM reviews)
                         THEN 'at or above average' ELSE 'below average' END AS category,
                    COUNT(*)
             FROM reviews GROUP BY category ORDER BY category",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Runs the full battery and prints each result as an aligned text table.
    pub fn print_report(&self) -> Result<()> {
        let total = self.total_reviews()?;
        info!("Running report battery over {} reviews", total);
        println!("\n📊 Review report ({} reviews)\n", total);

        println!("1. Sentiment summary");
        println!("   {:<10} {:>7} {:>12}", "sentiment", "count", "avg rating");
        for (sentiment, count, avg) in self.sentiment_summary()? {
            println!("   {:<10} {:>7} {:>12.2}", sentiment, count, avg);
        }

        println!("\n2. Rating distribution");
        println!("   {:<7} {:>7}", "rating", "count");
        for (rating, count) in self.rating_distribution()? {
            println!("   {:<7} {:>7}", rating, count);
        }

        println!("\n3. Average rating");
        match self.average_rating()? {
            Some(avg) => println!("   {:.2}", avg),
            None => println!("   (no reviews)"),
        }

        println!("\n4. Rating x sentiment matrix");
        println!("   {:<7} {:<10} {:>7}", "rating", "sentiment", "count");
        for (rating, sentiment, count) in self.rating_sentiment_matrix()? {
            println!("   {:<7} {:<10} {:>7}", rating, sentiment, count);
        }

        println!("\n5. Top reviewers");
        println!("   {:<24} {:>7}", "username", "reviews");
        for (username, count) in self.top_reviewers(5)? {
            println!("   {:<24} {:>7}", username, count);
        }

        println!("\n6. Most liked reviews");
        println!("   {:<24} {:>6}  {}", "username", "likes", "review");
        for (username, likes, snippet) in self.most_liked_reviews(5)? {
            println!("   {:<24} {:>6}  {}", username, likes, snippet);
        }

        println!("\n7. Reviews per month");
        println!("   {:<8} {:>7}", "month", "count");
        for (month, count) in self.monthly_counts()? {
            println!("   {:<8} {:>7}", month, count);
        }

        println!("\n8. Average response time (replied reviews)");
        match self.average_response_time_hours()? {
            Some(hours) => println!("   overall: {:.1} hours", hours),
            None => println!("   (no replied reviews)"),
        }
        for (rating, hours) in self.response_time_by_rating()? {
            println!("   rating {}: {:.1} hours", rating, hours);
        }

        println!("\n9. Reply coverage by rating");
        println!("   {:<7} {:>8} {:>7}", "rating", "replied", "total");
        for (rating, replied, total) in self.reply_coverage_by_rating()? {
            println!("   {:<7} {:>8} {:>7}", rating, replied, total);
        }

        println!("\n10. Reviews vs the mean rating");
        println!("   {:<20} {:>7}", "category", "count");
        for (category, count) in self.rating_threshold_categories()? {
            println!("   {:<20} {:>7}", category, count);
        }
        println!();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentimentLabel;
    use chrono::{Duration, TimeZone, Utc};

    fn review(username: &str, rating: u8, sentiment: SentimentLabel) -> Review {
        Review {
            username: username.to_string(),
            review: format!("review by {username}"),
            rating,
            like_count: 0,
            review_time: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            reply: None,
            reply_time: None,
            sentiment_label: sentiment,
            score: 0.5,
        }
    }

    #[test]
    fn average_rating_matches_known_fixture() {
        let reviews: Vec<Review> = [5u8, 5, 5, 4, 1]
            .iter()
            .enumerate()
            .map(|(i, &r)| review(&format!("user{i}"), r, SentimentLabel::Neutral))
            .collect();
        let analyzer = Analyzer::from_reviews(&reviews).unwrap();
        assert_eq!(analyzer.average_rating().unwrap(), Some(4.0));
    }

    #[test]
    fn empty_dataset_has_no_average() {
        let analyzer = Analyzer::from_reviews(&[]).unwrap();
        assert_eq!(analyzer.average_rating().unwrap(), None);
        assert_eq!(analyzer.total_reviews().unwrap(), 0);
        assert!(analyzer.average_response_time_hours().unwrap().is_none());
    }

    #[test]
    fn top_reviewer_is_the_most_prolific_user() {
        let mut reviews = vec![
            review("casual_1", 4, SentimentLabel::Positive),
            review("casual_2", 2, SentimentLabel::Negative),
        ];
        for _ in 0..3 {
            reviews.push(review("power_user", 5, SentimentLabel::Positive));
        }
        let analyzer = Analyzer::from_reviews(&reviews).unwrap();
        let top = analyzer.top_reviewers(3).unwrap();
        assert_eq!(top[0], ("power_user".to_string(), 3));
    }

    #[test]
    fn sentiment_counts_sum_to_total() {
        let reviews = vec![
            review("a", 5, SentimentLabel::Positive),
            review("b", 1, SentimentLabel::Negative),
            review("c", 3, SentimentLabel::Neutral),
            review("d", 4, SentimentLabel::Positive),
        ];
        let analyzer = Analyzer::from_reviews(&reviews).unwrap();
        let sum: i64 = analyzer
            .sentiment_summary()
            .unwrap()
            .iter()
            .map(|(_, n, _)| n)
            .sum();
        assert_eq!(sum, analyzer.total_reviews().unwrap());
    }

    #[test]
    fn matrix_partitions_the_dataset() {
        let reviews = vec![
            review("a", 5, SentimentLabel::Positive),
            review("b", 5, SentimentLabel::Positive),
            review("c", 5, SentimentLabel::Neutral),
            review("d", 1, SentimentLabel::Negative),
        ];
        let analyzer = Analyzer::from_reviews(&reviews).unwrap();
        let matrix = analyzer.rating_sentiment_matrix().unwrap();

        let sum: i64 = matrix.iter().map(|(_, _, n)| n).sum();
        assert_eq!(sum, 4);

        let mut cells: Vec<(i64, String)> = matrix
            .iter()
            .map(|(r, s, _)| (*r, s.clone()))
            .collect();
        cells.dedup();
        assert_eq!(cells.len(), matrix.len());
    }

    #[test]
    fn response_time_averages_over_replied_reviews_only() {
        let mut replied = review("a", 2, SentimentLabel::Negative);
        replied.reply = Some("sorry about that".to_string());
        replied.reply_time = Some(replied.review_time + Duration::hours(12));
        let unreplied = review("b", 5, SentimentLabel::Positive);

        let analyzer = Analyzer::from_reviews(&[replied, unreplied]).unwrap();
        let avg = analyzer.average_response_time_hours().unwrap().unwrap();
        assert!((avg - 12.0).abs() < 1e-6);

        let coverage = analyzer.reply_coverage_by_rating().unwrap();
        assert_eq!(coverage, vec![(2, 1, 1), (5, 0, 1)]);
    }

    #[test]
    fn threshold_categories_cover_all_reviews() {
        let reviews = vec![
            review("a", 5, SentimentLabel::Positive),
            review("b", 4, SentimentLabel::Positive),
            review("c", 1, SentimentLabel::Negative),
        ];
        let analyzer = Analyzer::from_reviews(&reviews).unwrap();
        let categories = analyzer.rating_threshold_categories().unwrap();
        let sum: i64 = categories.iter().map(|(_, n)| n).sum();
        assert_eq!(sum, 3);
        // mean is 10/3; ratings 4 and 5 sit at or above it
        assert!(categories.contains(&("at or above average".to_string(), 2)));
        assert!(categories.contains(&("below average".to_string(), 1)));
    }

    #[test]
    fn monthly_counts_bucket_by_calendar_month() {
        let mut jan = review("a", 3, SentimentLabel::Neutral);
        jan.review_time = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut feb = review("b", 3, SentimentLabel::Neutral);
        feb.review_time = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let mut feb2 = review("c", 3, SentimentLabel::Neutral);
        feb2.review_time = Utc.with_ymd_and_hms(2024, 2, 27, 0, 0, 0).unwrap();

        let analyzer = Analyzer::from_reviews(&[jan, feb, feb2]).unwrap();
        assert_eq!(
            analyzer.monthly_counts().unwrap(),
            vec![("2024-01".to_string(), 1), ("2024-02".to_string(), 2)]
        );
    }
}
