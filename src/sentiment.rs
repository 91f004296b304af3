use crate::types::SentimentLabel;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z']+").unwrap());

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "great", "excellent", "awesome", "amazing", "love", "loved", "loves", "best",
        "fantastic", "wonderful", "perfect", "helpful", "useful", "easy", "smooth", "fast",
        "nice", "happy", "enjoy", "enjoyable", "recommend", "recommended", "beautiful",
        "intuitive", "reliable", "responsive", "stable", "brilliant", "superb", "satisfied",
        "fun", "clean", "simple", "works", "worth", "thanks", "thank",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad", "terrible", "awful", "horrible", "worst", "hate", "hated", "hates", "poor",
        "useless", "broken", "crash", "crashes", "crashed", "crashing", "bug", "bugs", "buggy",
        "slow", "laggy", "lag", "annoying", "disappointing", "disappointed", "frustrating",
        "unusable", "scam", "spam", "ads", "expensive", "confusing", "stuck", "freeze",
        "freezes", "frozen", "error", "errors", "fails", "failed", "failing", "uninstall",
        "uninstalled", "waste", "wrong", "refund",
    ]
    .into_iter()
    .collect()
});

/// Classifies a review text with a lexicon majority vote.
///
/// Returns the label plus a confidence score in [0,1]: the dominant
/// polarity's share of all lexicon hits. Texts with no hits, or with a
/// tie, come back neutral with a score of 0.
pub fn classify(text: &str) -> (SentimentLabel, f64) {
    let lowered = text.to_lowercase();
    let mut positive = 0usize;
    let mut negative = 0usize;

    for token in WORD_RE.find_iter(&lowered) {
        let word = token.as_str();
        if POSITIVE_WORDS.contains(word) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(word) {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 || positive == negative {
        return (SentimentLabel::Neutral, 0.0);
    }

    if positive > negative {
        (SentimentLabel::Positive, positive as f64 / total as f64)
    } else {
        (SentimentLabel::Negative, negative as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_text_is_positive() {
        let (label, score) = classify("Great app, easy to use and works perfectly. Love it!");
        assert_eq!(label, SentimentLabel::Positive);
        assert!(score > 0.5);
        assert!(score <= 1.0);
    }

    #[test]
    fn negative_text_is_negative() {
        let (label, score) = classify("Terrible. Crashes constantly, full of bugs and ads.");
        assert_eq!(label, SentimentLabel::Negative);
        assert!(score > 0.5);
    }

    #[test]
    fn empty_text_is_neutral_with_zero_score() {
        let (label, score) = classify("");
        assert_eq!(label, SentimentLabel::Neutral);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn balanced_text_is_neutral() {
        let (label, score) = classify("good app but buggy");
        assert_eq!(label, SentimentLabel::Neutral);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn no_lexicon_hits_is_neutral() {
        let (label, score) = classify("It opens the settings screen on launch.");
        assert_eq!(label, SentimentLabel::Neutral);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn casing_does_not_matter() {
        let (upper, _) = classify("GREAT APP");
        let (lower, _) = classify("great app");
        assert_eq!(upper, lower);
    }
}
