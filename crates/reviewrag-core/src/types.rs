//! Domain types shared by the indexer and the analyzer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type ReviewId = String;

/// One source row of the review dataset.
///
/// - `at`: when the review was written
/// - `score`: star rating, 1..=5
/// - `version`: app version the review was written against, if known
/// - `reply`: official developer reply, if any
/// - `review_id`: external identifier, unique within a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub at: NaiveDateTime,
    pub score: u8,
    pub content: String,
    pub version: Option<String>,
    pub thumbs_up: u32,
    pub reply: Option<String>,
    pub review_id: String,
}

impl ReviewRecord {
    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    pub fn is_negative(&self) -> bool {
        self.score <= 2
    }

    pub fn is_positive(&self) -> bool {
        self.score >= 4
    }
}

/// Flat scalar sidecar stored next to each document.
///
/// The field names double as the filter vocabulary (see `filter::Field`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub date: String,
    pub year: i32,
    pub month: String,
    pub score: u8,
    pub version: String,
    pub thumbs_up: u32,
    pub has_reply: bool,
    pub is_negative: bool,
    pub is_positive: bool,
}

/// A review ready for embedding: stable id, flattened text, metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    pub id: ReviewId,
    pub document: String,
    pub metadata: ReviewMetadata,
}

/// One nearest-neighbour hit. `distance` is the raw vector distance, lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedReview {
    pub id: ReviewId,
    pub document: String,
    pub metadata: ReviewMetadata,
    pub distance: f32,
}

/// Header persisted alongside a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHeader {
    pub description: String,
    pub total_reviews: usize,
    pub date_created: String,
    pub date_range_start: String,
    pub date_range_end: String,
    pub embedding_model: String,
}

impl CollectionHeader {
    pub fn date_range(&self) -> String {
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
        format!("{} to {}", or_na(&self.date_range_start), or_na(&self.date_range_end))
    }
}
