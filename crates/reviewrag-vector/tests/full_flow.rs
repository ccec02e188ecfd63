use reviewrag_core::dataset::parse_timestamp;
use reviewrag_core::document::ReviewProcessor;
use reviewrag_core::filter::{FilterConfig, Predicate, ReviewType};
use reviewrag_core::traits::Embedder;
use reviewrag_core::types::{CollectionHeader, ReviewRecord};
use reviewrag_embed::FakeEmbedder;
use reviewrag_vector::{ReviewIndexer, ReviewSearchEngine};
use std::path::Path;
use tempfile::TempDir;

const DIM: usize = 64;
const COLLECTION: &str = "reviews_test_tmp";

fn review(id: &str, score: u8, thumbs_up: u32, content: &str) -> ReviewRecord {
    ReviewRecord {
        at: parse_timestamp("2024-05-10 09:00:00").expect("ts"),
        score,
        content: content.to_string(),
        version: Some("15.9.0".to_string()),
        thumbs_up,
        reply: None,
        review_id: id.to_string(),
    }
}

fn header(total: usize, embedder: &dyn Embedder) -> CollectionHeader {
    CollectionHeader {
        description: "test reviews".into(),
        total_reviews: total,
        date_created: "2024-06-01".into(),
        date_range_start: "2024-05-10".into(),
        date_range_end: "2024-05-10".into(),
        embedding_model: embedder.model_id().to_string(),
    }
}

async fn build(db: &Path, records: &[ReviewRecord]) -> usize {
    let embedder = FakeEmbedder::new(DIM);
    let docs = ReviewProcessor::new().process(records).expect("process");
    let texts: Vec<String> = docs.iter().map(|d| d.document.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("embed");
    let indexer = ReviewIndexer::new(db, COLLECTION, DIM).await.expect("indexer");
    // small insert batches so the append path runs too
    indexer.build(&docs, &embeddings, &header(docs.len(), &embedder), 2).await.expect("build")
}

async fn engine(db: &Path) -> ReviewSearchEngine {
    ReviewSearchEngine::open(db, COLLECTION, Box::new(FakeEmbedder::new(DIM))).await.expect("engine")
}

fn mixed_corpus() -> Vec<ReviewRecord> {
    (0..20)
        .map(|i| review(&format!("m{i}"), (i % 5 + 1) as u8, i * 3, &format!("matching is broken again number {i}")))
        .collect()
}

#[tokio::test]
async fn negative_filter_returns_only_the_one_star_review() {
    let tmp = TempDir::new().expect("tmp");
    let records = vec![review("a", 1, 0, "A"), review("b", 3, 0, "B"), review("c", 5, 0, "C")];
    assert_eq!(build(tmp.path(), &records).await, 3);

    let engine = engine(tmp.path()).await;
    let filter = Predicate::from_config(&FilterConfig { review_type: ReviewType::NegativeOnly, min_thumbs: 0 });
    let hits = engine.retrieve("anything at all", 5, filter.as_ref()).await.expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "review_a");
    assert_eq!(hits[0].metadata.score, 1);
    assert!(hits[0].document.ends_with("User Feedback:\nA"));
}

#[tokio::test]
async fn results_respect_limit_and_filter() {
    let tmp = TempDir::new().expect("tmp");
    build(tmp.path(), &mixed_corpus()).await;
    let engine = engine(tmp.path()).await;

    let unfiltered = engine.retrieve("matching broken", 4, None).await.expect("retrieve");
    assert_eq!(unfiltered.len(), 4);
    for w in unfiltered.windows(2) { assert!(w[0].distance <= w[1].distance); }

    let filter = Predicate::from_config(&FilterConfig { review_type: ReviewType::PositiveOnly, min_thumbs: 20 }).expect("predicate");
    let hits = engine.retrieve("matching broken", 10, Some(&filter)).await.expect("retrieve");
    // i = 8, 9, 13, 14, 18, 19 are 4-5 stars with >= 20 thumbs up
    assert_eq!(hits.len(), 6);
    for h in &hits {
        assert!(filter.matches(&h.metadata), "{:?} violates {}", h.metadata, filter);
    }
}

#[tokio::test]
async fn filter_applies_before_the_top_n_cut() {
    let tmp = TempDir::new().expect("tmp");
    let mut records: Vec<ReviewRecord> = (0..50)
        .map(|i| review(&format!("p{i}"), 5, 0, "great app love the matches"))
        .collect();
    records.push(review("neg", 1, 0, "billing charged me twice"));
    build(tmp.path(), &records).await;
    let engine = engine(tmp.path()).await;

    let filter = Predicate::from_config(&FilterConfig { review_type: ReviewType::NegativeOnly, min_thumbs: 0 });
    let hits = engine.retrieve("great app love the matches", 1, filter.as_ref()).await.expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "review_neg");
}

#[tokio::test]
async fn impossible_filter_is_empty_not_error() {
    let tmp = TempDir::new().expect("tmp");
    build(tmp.path(), &mixed_corpus()).await;
    let engine = engine(tmp.path()).await;
    let filter = Predicate::from_config(&FilterConfig { review_type: ReviewType::All, min_thumbs: 10_000 });
    let hits = engine.retrieve("matching broken", 5, filter.as_ref()).await.expect("no error");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn rebuild_replaces_collection_and_header() {
    let tmp = TempDir::new().expect("tmp");
    build(tmp.path(), &mixed_corpus()).await;
    let count = build(tmp.path(), &[review("only", 4, 1, "just one")]).await;
    assert_eq!(count, 1);

    let engine = engine(tmp.path()).await;
    let stats = engine.stats().await.expect("stats");
    assert_eq!(stats.total_reviews, 1);
    assert_eq!(stats.header.total_reviews, 1);
    assert_eq!(stats.header.embedding_model, "fake:d64");
    assert_eq!(stats.date_range(), "2024-05-10 to 2024-05-10");
}

#[tokio::test]
async fn zero_results_requested_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    build(tmp.path(), &[review("a", 2, 0, "A")]).await;
    let engine = engine(tmp.path()).await;
    assert!(engine.retrieve("q", 0, None).await.is_err());
}

#[tokio::test]
async fn missing_collection_fails_to_open() {
    let tmp = TempDir::new().expect("tmp");
    let res = ReviewSearchEngine::open(tmp.path(), "nope", Box::new(FakeEmbedder::new(DIM))).await;
    assert!(res.is_err());
}
