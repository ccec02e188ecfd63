use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use reviewrag_analyst::{synthesize, AnalysisType, Analyzer, AskRequest, LlmError, TextGenerator, NO_RESULTS_MESSAGE};
use reviewrag_core::dataset::parse_timestamp;
use reviewrag_core::document::ReviewProcessor;
use reviewrag_core::filter::{FilterConfig, ReviewType};
use reviewrag_core::traits::Embedder;
use reviewrag_core::types::{CollectionHeader, ReviewRecord};
use reviewrag_embed::FakeEmbedder;
use reviewrag_vector::{ReviewIndexer, ReviewSearchEngine};

/// Records prompts instead of calling a hosted model.
#[derive(Default)]
struct RecordingGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("lock").push(prompt.to_string());
        Ok("  generated **verbatim**\n".to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Api { status: 401, message: "invalid x-api-key".into() })
    }
}

fn review(id: &str, score: u8, content: &str) -> ReviewRecord {
    ReviewRecord {
        at: parse_timestamp("2024-04-01 12:00:00").expect("ts"),
        score,
        content: content.to_string(),
        version: None,
        thumbs_up: 2,
        reply: None,
        review_id: id.to_string(),
    }
}

async fn analyzer(tmp: &TempDir) -> Analyzer {
    let embedder = FakeEmbedder::new(48);
    let records = vec![review("a", 1, "A"), review("b", 3, "B"), review("c", 5, "C")];
    let docs = ReviewProcessor::new().process(&records).expect("process");
    let texts: Vec<String> = docs.iter().map(|d| d.document.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("embed");
    let header = CollectionHeader { total_reviews: 3, embedding_model: embedder.model_id().to_string(), ..Default::default() };
    ReviewIndexer::new(tmp.path(), "reviews", 48).await.expect("indexer")
        .build(&docs, &embeddings, &header, 1000).await.expect("build");
    let engine = ReviewSearchEngine::open(tmp.path(), "reviews", Box::new(FakeEmbedder::new(48))).await.expect("engine");
    Analyzer::new(Arc::new(engine))
}

#[tokio::test]
async fn empty_retrieval_never_calls_generator() {
    let generator = RecordingGenerator::default();
    let text = synthesize(&generator, "anything?", &[], AnalysisType::RootCause).await.expect("synthesize");
    assert_eq!(text, NO_RESULTS_MESSAGE);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ask_sends_numbered_context_and_returns_text_verbatim() {
    let tmp = TempDir::new().expect("tmp");
    let analyzer = analyzer(&tmp).await;
    let generator = RecordingGenerator::default();
    let request = AskRequest {
        question: "What are the biggest complaints?".into(),
        n_results: 5,
        filter: FilterConfig { review_type: ReviewType::NegativeOnly, min_thumbs: 0 },
        analysis_type: AnalysisType::General,
    };
    let analysis = analyzer.ask(&generator, &request).await.expect("ask");

    assert_eq!(analysis.text, "  generated **verbatim**\n");
    assert_eq!(analysis.retrieved.len(), 1);
    assert_eq!(analysis.retrieved[0].id, "review_a");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    let prompts = generator.prompts.lock().expect("lock");
    assert!(prompts[0].contains("Review 1:\nReview Date: 2024-04-01\nRating: 1 stars"));
    assert!(!prompts[0].contains("Review 2:"));
    assert!(prompts[0].contains("Question: What are the biggest complaints?"));
}

#[tokio::test]
async fn ask_with_unmatched_filter_returns_no_results_message() {
    let tmp = TempDir::new().expect("tmp");
    let analyzer = analyzer(&tmp).await;
    let generator = RecordingGenerator::default();
    let request = AskRequest {
        question: "q".into(),
        n_results: 5,
        filter: FilterConfig { review_type: ReviewType::All, min_thumbs: 100 },
        analysis_type: AnalysisType::FeatureRequests,
    };
    let analysis = analyzer.ask(&generator, &request).await.expect("ask");
    assert!(analysis.retrieved.is_empty());
    assert_eq!(analysis.text, NO_RESULTS_MESSAGE);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generator_failure_propagates() {
    let tmp = TempDir::new().expect("tmp");
    let analyzer = analyzer(&tmp).await;
    let request = AskRequest { question: "q".into(), n_results: 3, filter: FilterConfig::default(), analysis_type: AnalysisType::General };
    let err = analyzer.ask(&FailingGenerator, &request).await.expect_err("must fail");
    assert!(err.to_string().contains("401"));
}
