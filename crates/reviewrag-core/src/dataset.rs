//! Review CSV loading, recency window, sampling and corpus statistics.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::error::Error;
use crate::types::ReviewRecord;

/// Column layout of the cleaned review export.
#[derive(Debug, Deserialize)]
struct RawReview {
    at: String,
    score: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "reviewCreatedVersion", default)]
    review_created_version: Option<String>,
    #[serde(rename = "thumbsUpCount")]
    thumbs_up_count: String,
    #[serde(rename = "replyContent", default)]
    reply_content: Option<String>,
    #[serde(rename = "reviewId")]
    review_id: String,
}

pub fn load_reviews(path: &Path) -> Result<Vec<ReviewRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open review dataset {}", path.display()))?;
    read_reviews(file).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn read_reviews<R: Read>(reader: R) -> Result<Vec<ReviewRecord>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let mut records = Vec::new();
    for (row, raw) in rdr.deserialize::<RawReview>().enumerate() {
        // header is line 1
        let line = row + 2;
        let raw = raw.with_context(|| format!("Malformed CSV row at line {}", line))?;
        records.push(to_record(raw).map_err(|e| anyhow::anyhow!("line {}: {}", line, e))?);
    }
    Ok(records)
}

fn to_record(raw: RawReview) -> crate::error::Result<ReviewRecord> {
    let at = parse_timestamp(&raw.at)?;
    let score = parse_whole_number(&raw.score, "score")?;
    if !(1..=5).contains(&score) {
        return Err(Error::InvalidRecord(format!("score {} outside 1..=5", score)));
    }
    let thumbs_up = parse_whole_number(&raw.thumbs_up_count, "thumbsUpCount")?;
    let review_id = raw.review_id.trim().to_string();
    if review_id.is_empty() {
        return Err(Error::InvalidRecord("empty reviewId".into()));
    }
    Ok(ReviewRecord {
        at,
        score: score as u8,
        content: raw.content.unwrap_or_default(),
        version: non_empty(raw.review_created_version),
        thumbs_up: u32::try_from(thumbs_up)
            .map_err(|_| Error::InvalidRecord(format!("thumbsUpCount {} out of range", thumbs_up)))?,
        reply: non_empty(raw.reply_content),
        review_id,
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Accepts `5` as well as the `5.0` that spreadsheet exports produce.
fn parse_whole_number(s: &str, column: &str) -> crate::error::Result<i64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(Error::InvalidRecord(format!("{} is not a whole number: {:?}", column, s))),
    }
}

pub fn parse_timestamp(s: &str) -> crate::error::Result<NaiveDateTime> {
    let s = s.trim();
    const FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for fmt in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc());
    }
    if let Some(ts) = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)) {
        return Ok(ts);
    }
    Err(Error::InvalidRecord(format!("unrecognised timestamp {:?}", s)))
}

/// `None` when the window is disabled (`days == 0`).
pub fn recency_cutoff(now: NaiveDateTime, days: u32) -> Option<NaiveDateTime> {
    (days > 0).then(|| now - Duration::days(i64::from(days)))
}

pub fn filter_recent(records: Vec<ReviewRecord>, cutoff: NaiveDateTime) -> Vec<ReviewRecord> {
    records.into_iter().filter(|r| r.at >= cutoff).collect()
}

/// Draws up to `size / 5` reviews per star rating, shuffles, and caps at `size`.
pub fn stratified_sample(records: Vec<ReviewRecord>, size: usize, seed: u64) -> Vec<ReviewRecord> {
    if size == 0 || records.len() <= size {
        return records;
    }
    let per_score = size / 5;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut by_score: BTreeMap<u8, Vec<ReviewRecord>> = BTreeMap::new();
    for r in records {
        by_score.entry(r.score).or_default().push(r);
    }
    let mut sample = Vec::with_capacity(size);
    for (_, mut group) in by_score {
        group.shuffle(&mut rng);
        group.truncate(per_score);
        sample.extend(group);
    }
    sample.shuffle(&mut rng);
    sample.truncate(size);
    sample
}

/// Summary figures printed after a build.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStats {
    pub total: usize,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub avg_rating: f64,
    pub versions: usize,
    pub negative: usize,
    pub positive: usize,
}

impl CorpusStats {
    pub fn from_records(records: &[ReviewRecord]) -> Self {
        let total = records.len();
        let date_start = records.iter().map(|r| r.at.date()).min();
        let date_end = records.iter().map(|r| r.at.date()).max();
        let sum: u64 = records.iter().map(|r| u64::from(r.score)).sum();
        let avg_rating = if total == 0 { 0.0 } else { sum as f64 / total as f64 };
        let versions = records.iter().filter_map(|r| r.version.as_deref()).collect::<HashSet<_>>().len();
        Self {
            total,
            date_start,
            date_end,
            avg_rating,
            versions,
            negative: records.iter().filter(|r| r.is_negative()).count(),
            positive: records.iter().filter(|r| r.is_positive()).count(),
        }
    }

    pub fn negative_share(&self) -> f64 {
        share(self.negative, self.total)
    }

    pub fn positive_share(&self) -> f64 {
        share(self.positive, self.total)
    }

    pub fn date_range(&self) -> String {
        match (self.date_start, self.date_end) {
            (Some(a), Some(b)) => format!("{} to {}", a, b),
            _ => "N/A".to_string(),
        }
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 * 100.0 / total as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
reviewId,content,score,thumbsUpCount,reviewCreatedVersion,at,replyContent
r1,Matches vanished after update,1,12,15.2.0,2024-06-01 10:00:00,
r2,Fine I guess,3.0,0,,2024-06-02T08:30:00,Thanks for the feedback
r3,Love it,5,3,15.3.1,2024-06-03,
";

    #[test]
    fn reads_rows_with_nullable_columns() {
        let records = read_reviews(CSV.as_bytes()).expect("parse");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].review_id, "r1");
        assert_eq!(records[0].thumbs_up, 12);
        assert!(records[0].reply.is_none());
        assert_eq!(records[1].score, 3);
        assert!(records[1].version.is_none());
        assert_eq!(records[1].reply.as_deref(), Some("Thanks for the feedback"));
        assert_eq!(records[2].at.date(), NaiveDate::from_ymd_opt(2024, 6, 3).expect("date"));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let bad = "reviewId,content,score,thumbsUpCount,reviewCreatedVersion,at,replyContent\nx,meh,7,0,,2024-01-01,\n";
        let err = read_reviews(bad.as_bytes()).expect_err("score 7 must fail");
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn recent_window_keeps_newer_reviews() {
        let records = read_reviews(CSV.as_bytes()).expect("parse");
        let now = parse_timestamp("2024-06-03 12:00:00").expect("ts");
        let cutoff = recency_cutoff(now, 1).expect("enabled");
        let kept = filter_recent(records, cutoff);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].review_id, "r3");
        assert!(recency_cutoff(now, 0).is_none());
    }

    #[test]
    fn sample_is_balanced_and_capped() {
        let base = read_reviews(CSV.as_bytes()).expect("parse");
        let mut records = Vec::new();
        for i in 0..40 {
            let mut r = base[i % 3].clone();
            r.review_id = format!("r{i}");
            records.push(r);
        }
        let sample = stratified_sample(records, 10, 7);
        assert!(sample.len() <= 10);
        for score in [1u8, 3, 5] {
            assert!(sample.iter().filter(|r| r.score == score).count() <= 2);
        }
    }

    #[test]
    fn corpus_stats_counts_polarity() {
        let records = read_reviews(CSV.as_bytes()).expect("parse");
        let stats = CorpusStats::from_records(&records);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.negative, 1);
        assert_eq!(stats.positive, 1);
        assert_eq!(stats.versions, 2);
        assert!((stats.avg_rating - 3.0).abs() < 1e-9);
        assert_eq!(stats.date_range(), "2024-06-01 to 2024-06-03");
    }
}
