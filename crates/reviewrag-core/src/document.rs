use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{ReviewDocument, ReviewMetadata, ReviewRecord};

pub const FEEDBACK_MARKER: &str = "User Feedback:";
pub const UNKNOWN_VERSION: &str = "unknown";

pub fn review_id(record: &ReviewRecord) -> String {
    format!("review_{}", record.review_id)
}

/// Flattened text that gets embedded: metadata lines, then the raw feedback.
pub fn build_document(record: &ReviewRecord) -> String {
    let mut parts = vec![
        format!("Review Date: {}", record.at.format("%Y-%m-%d")),
        format!("Rating: {} stars", record.score),
        format!("App Version: {}", version_label(record)),
        format!("Thumbs Up: {}", record.thumbs_up),
    ];
    if record.has_reply() {
        parts.push("Official Reply: Yes".to_string());
    }
    parts.push(format!("\n{}\n{}", FEEDBACK_MARKER, record.content));
    parts.join("\n")
}

pub fn build_metadata(record: &ReviewRecord) -> ReviewMetadata {
    ReviewMetadata {
        date: record.at.format("%Y-%m-%d").to_string(),
        year: chrono::Datelike::year(&record.at),
        month: record.at.format("%Y-%m").to_string(),
        score: record.score,
        version: version_label(record).to_string(),
        thumbs_up: record.thumbs_up,
        has_reply: record.has_reply(),
        is_negative: record.is_negative(),
        is_positive: record.is_positive(),
    }
}

fn version_label(record: &ReviewRecord) -> &str {
    record.version.as_deref().unwrap_or(UNKNOWN_VERSION)
}

/// Text after the feedback marker, cut to `max_chars` characters with `...` when longer.
pub fn feedback_excerpt(document: &str, max_chars: usize) -> Option<String> {
    let start = document.find(FEEDBACK_MARKER)? + FEEDBACK_MARKER.len();
    let content = document[start..].trim();
    if content.chars().count() > max_chars {
        let cut: String = content.chars().take(max_chars).collect();
        Some(format!("{}...", cut))
    } else {
        Some(content.to_string())
    }
}

#[derive(Default)]
pub struct ReviewProcessor;

impl ReviewProcessor {
    pub fn new() -> Self { Self }

    /// Builds one document per record. Ids must come out unique.
    pub fn process(&self, records: &[ReviewRecord]) -> Result<Vec<ReviewDocument>> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut docs = Vec::with_capacity(records.len());
        for record in records {
            let id = review_id(record);
            if !seen.insert(id.clone()) {
                return Err(Error::InvalidRecord(format!("duplicate review id {}", id)));
            }
            docs.push(ReviewDocument { id, document: build_document(record), metadata: build_metadata(record) });
        }
        tracing::debug!(count = docs.len(), "prepared review documents");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_timestamp;

    fn record(score: u8, reply: Option<&str>) -> ReviewRecord {
        ReviewRecord {
            at: parse_timestamp("2024-03-09 17:45:00").expect("ts"),
            score,
            content: "Keeps crashing on the chat screen".to_string(),
            version: Some("15.4.0".to_string()),
            thumbs_up: 7,
            reply: reply.map(str::to_string),
            review_id: "abc-123".to_string(),
        }
    }

    #[test]
    fn document_without_reply_omits_reply_line() {
        let doc = build_document(&record(2, None));
        assert_eq!(
            doc,
            "Review Date: 2024-03-09\nRating: 2 stars\nApp Version: 15.4.0\nThumbs Up: 7\n\nUser Feedback:\nKeeps crashing on the chat screen"
        );
        assert!(!doc.contains("Official Reply"));
    }

    #[test]
    fn document_with_reply_includes_reply_line() {
        let doc = build_document(&record(2, Some("Sorry about that")));
        assert!(doc.contains("Thumbs Up: 7\nOfficial Reply: Yes\n\nUser Feedback:"));
        // the reply text itself is not embedded
        assert!(!doc.contains("Sorry about that"));
    }

    #[test]
    fn polarity_follows_rating() {
        for score in 1..=5u8 {
            let m = build_metadata(&record(score, None));
            assert_eq!(m.is_negative, score <= 2, "score {score}");
            assert_eq!(m.is_positive, score >= 4, "score {score}");
        }
        let neutral = build_metadata(&record(3, None));
        assert!(!neutral.is_negative && !neutral.is_positive);
    }

    #[test]
    fn metadata_fields() {
        let m = build_metadata(&record(4, Some("thanks")));
        assert_eq!(m.date, "2024-03-09");
        assert_eq!(m.year, 2024);
        assert_eq!(m.month, "2024-03");
        assert_eq!(m.version, "15.4.0");
        assert!(m.has_reply);
    }

    #[test]
    fn missing_version_is_labelled_unknown() {
        let mut r = record(5, None);
        r.version = None;
        assert!(build_document(&r).contains("App Version: unknown"));
        assert_eq!(build_metadata(&r).version, "unknown");
    }

    #[test]
    fn processor_rejects_duplicate_ids() {
        let r = record(1, None);
        let err = ReviewProcessor::new().process(&[r.clone(), r]).expect_err("duplicate");
        assert!(err.to_string().contains("review_abc-123"));
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let doc = build_document(&record(1, None));
        assert_eq!(feedback_excerpt(&doc, 300).as_deref(), Some("Keeps crashing on the chat screen"));
        assert_eq!(feedback_excerpt(&doc, 5).as_deref(), Some("Keeps..."));
        assert!(feedback_excerpt("no marker here", 10).is_none());
    }
}
