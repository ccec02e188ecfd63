//! Query-time pipeline: retrieve reviews for a question, then synthesize an
//! answer from them with a hosted model.

pub mod llm;
pub mod prompt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reviewrag_core::filter::{FilterConfig, Predicate};
use reviewrag_core::types::RetrievedReview;
use reviewrag_vector::ReviewSearchEngine;

pub use llm::{AnthropicClient, LlmError, TextGenerator};
pub use prompt::{build_context, render_prompt, AnalysisType};

pub const NO_RESULTS_MESSAGE: &str = "No relevant reviews found with the selected filters.";

pub const QUICK_QUESTIONS: [&str; 5] = [
    "What are the biggest complaints in the last 12 months?",
    "What features are users requesting most?",
    "Why has the rating declined recently?",
    "What do users think about pricing?",
    "What bugs are most commonly reported?",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub n_results: usize,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub analysis_type: AnalysisType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    pub retrieved: Vec<RetrievedReview>,
}

/// Fills the chosen template with `retrieved` and returns the model's text untouched.
///
/// Empty input short-circuits to [`NO_RESULTS_MESSAGE`] without calling `generator`.
pub async fn synthesize(
    generator: &dyn TextGenerator,
    query: &str,
    retrieved: &[RetrievedReview],
    analysis: AnalysisType,
) -> Result<String, LlmError> {
    if retrieved.is_empty() {
        tracing::warn!("no reviews matched; skipping generation");
        return Ok(NO_RESULTS_MESSAGE.to_string());
    }
    let context = build_context(retrieved);
    let prompt = render_prompt(analysis, query, &context);
    generator.generate(&prompt).await
}

pub struct Analyzer {
    engine: Arc<ReviewSearchEngine>,
}

impl Analyzer {
    pub fn new(engine: Arc<ReviewSearchEngine>) -> Self {
        Self { engine }
    }

    pub async fn retrieve(&self, query: &str, n: usize, filter: &FilterConfig) -> Result<Vec<RetrievedReview>> {
        let predicate = Predicate::from_config(filter);
        self.engine.retrieve(query, n, predicate.as_ref()).await
    }

    pub async fn synthesize(
        &self,
        generator: &dyn TextGenerator,
        query: &str,
        retrieved: &[RetrievedReview],
        analysis: AnalysisType,
    ) -> Result<String, LlmError> {
        synthesize(generator, query, retrieved, analysis).await
    }

    pub async fn ask(&self, generator: &dyn TextGenerator, request: &AskRequest) -> Result<Analysis> {
        tracing::info!(question = %request.question, n = request.n_results, analysis = %request.analysis_type, "analyzing");
        let retrieved = self.retrieve(&request.question, request.n_results, &request.filter).await?;
        let text = self.synthesize(generator, &request.question, &retrieved, request.analysis_type).await?;
        Ok(Analysis { text, retrieved })
    }
}
