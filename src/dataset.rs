use crate::error::{ReviewError, Result};
use crate::types::{Review, SentimentLabel};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Column header of the flat dataset file, in persisted order.
pub const DATASET_HEADER: [&str; 9] = [
    "Username",
    "Review",
    "Rating",
    "LikeCount",
    "ReviewTime",
    "Reply",
    "ReplyTime",
    "Sentiment_Label",
    "Score",
];

/// Writes the full set of reviews to a CSV file, exactly once per run.
/// Absent reply fields serialize as empty strings, timestamps as RFC 3339.
pub fn write_dataset<P: AsRef<Path>>(path: P, reviews: &[Review]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(DATASET_HEADER)?;
    for review in reviews {
        let row = [
            review.username.clone(),
            review.review.clone(),
            review.rating.to_string(),
            review.like_count.to_string(),
            review.review_time.to_rfc3339(),
            review.reply.clone().unwrap_or_default(),
            review
                .reply_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            review.sentiment_label.as_str().to_string(),
            review.score.to_string(),
        ];
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!("Wrote {} reviews to {}", reviews.len(), path.display());
    Ok(())
}

/// Reads a persisted dataset back into memory for analysis.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<Review>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())?;

    let mut reviews = Vec::new();
    for record in reader.records() {
        let record = record?;
        reviews.push(review_from_record(&record)?);
    }
    Ok(reviews)
}

fn field<'a>(record: &'a csv::StringRecord, index: usize) -> Result<&'a str> {
    record
        .get(index)
        .ok_or_else(|| ReviewError::MissingField(DATASET_HEADER[index].to_string()))
}

fn parse_time(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ReviewError::Source {
            message: format!("bad {column} timestamp '{value}': {e}"),
        })
}

fn review_from_record(record: &csv::StringRecord) -> Result<Review> {
    let rating_raw = field(record, 2)?;
    let rating: u8 = rating_raw.parse().map_err(|_| ReviewError::Source {
        message: format!("bad Rating value '{rating_raw}'"),
    })?;
    let like_count_raw = field(record, 3)?;
    let like_count: u32 = like_count_raw.parse().map_err(|_| ReviewError::Source {
        message: format!("bad LikeCount value '{like_count_raw}'"),
    })?;
    let score_raw = field(record, 8)?;
    let score: f64 = score_raw.parse().map_err(|_| ReviewError::Source {
        message: format!("bad Score value '{score_raw}'"),
    })?;

    let reply = match field(record, 5)? {
        "" => None,
        text => Some(text.to_string()),
    };
    let reply_time = match field(record, 6)? {
        "" => None,
        stamp => Some(parse_time(stamp, "ReplyTime")?),
    };

    Ok(Review {
        username: field(record, 0)?.to_string(),
        review: field(record, 1)?.to_string(),
        rating,
        like_count,
        review_time: parse_time(field(record, 4)?, "ReviewTime")?,
        reply,
        reply_time,
        sentiment_label: SentimentLabel::from_str(field(record, 7)?)?,
        score,
    })
}
