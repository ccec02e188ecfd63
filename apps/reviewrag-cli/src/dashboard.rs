//! Web dashboard: one HTML page plus a small JSON API over the analyzer.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use reviewrag_analyst::{AnalysisType, Analyzer, AnthropicClient, AskRequest, LlmError, NO_RESULTS_MESSAGE, QUICK_QUESTIONS};
use reviewrag_core::config::{AnalysisSettings, Settings};
use reviewrag_core::document::feedback_excerpt;
use reviewrag_core::filter::{FilterConfig, ReviewType};
use reviewrag_core::types::RetrievedReview;
use reviewrag_vector::CollectionStats;

pub const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "analysis failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error during analysis: {}", msg))
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Loaded once at startup and shared read-only by every request.
pub struct AppState {
    pub analyzer: Analyzer,
    pub settings: Settings,
    pub stats: CollectionStats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub n_results: Option<usize>,
    #[serde(default)]
    pub review_type: ReviewType,
    #[serde(default)]
    pub min_thumbs: u32,
}

impl AnalyzeForm {
    pub fn to_request(&self, limits: &AnalysisSettings) -> Result<AskRequest, ApiError> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Please enter a question".into()));
        }
        let n = self.n_results.unwrap_or(limits.default_results);
        if n < limits.min_results || n > limits.max_results {
            return Err(ApiError::BadRequest(format!(
                "n_results must be between {} and {}",
                limits.min_results, limits.max_results
            )));
        }
        if self.min_thumbs > limits.max_min_thumbs {
            return Err(ApiError::BadRequest(format!("min_thumbs must be at most {}", limits.max_min_thumbs)));
        }
        Ok(AskRequest {
            question: question.to_string(),
            n_results: n,
            filter: FilterConfig { review_type: self.review_type, min_thumbs: self.min_thumbs },
            analysis_type: self.analysis_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReview {
    pub index: usize,
    pub score: u8,
    pub date: String,
    pub thumbs_up: u32,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Analysis { analysis: String, retrieved: Vec<SourceReview> },
    Empty { message: String },
}

impl AnalyzeResponse {
    pub fn from_parts(text: String, retrieved: &[RetrievedReview]) -> Self {
        if retrieved.is_empty() {
            return AnalyzeResponse::Empty { message: NO_RESULTS_MESSAGE.to_string() };
        }
        let sources = retrieved
            .iter()
            .enumerate()
            .map(|(i, r)| SourceReview {
                index: i + 1,
                score: r.metadata.score,
                date: r.metadata.date.clone(),
                thumbs_up: r.metadata.thumbs_up,
                excerpt: feedback_excerpt(&r.document, EXCERPT_CHARS).unwrap_or_default(),
            })
            .collect();
        AnalyzeResponse::Analysis { analysis: text, retrieved: sources }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/analyze", post(analyze))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let header = &state.stats.header;
    Json(json!({
        "total_reviews": state.stats.total_reviews,
        "date_range": state.stats.date_range(),
        "description": header.description,
        "date_created": header.date_created,
        "embedding_model": header.embedding_model,
        "llm_model": state.settings.llm.model,
    }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeForm>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = form.to_request(&state.settings.analysis)?;
    let client = AnthropicClient::new(&state.settings.llm, form.api_key.clone()).map_err(|e| match e {
        LlmError::MissingApiKey { .. } => ApiError::BadRequest("Please enter your Claude API key".into()),
        other => ApiError::internal(other),
    })?;
    let analysis = state.analyzer.ask(&client, &request).await.map_err(ApiError::internal)?;
    Ok(Json(AnalyzeResponse::from_parts(analysis.text, &analysis.retrieved)))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_index(&state.settings.analysis))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

pub fn render_index(limits: &AnalysisSettings) -> String {
    let quick = QUICK_QUESTIONS
        .iter()
        .map(|q| format!("<button type=\"button\" class=\"quick\" data-q=\"{0}\">{0}</button>", html_escape(q)))
        .collect::<Vec<_>>()
        .join("\n");
    let analyses = AnalysisType::ALL
        .iter()
        .map(|t| format!("<option value=\"{}\">{}</option>", t.slug(), t.label()))
        .collect::<Vec<_>>()
        .join("");
    INDEX_HTML
        .replace("{quick_questions}", &quick)
        .replace("{analysis_options}", &analyses)
        .replace("{min_results}", &limits.min_results.to_string())
        .replace("{max_results}", &limits.max_results.to_string())
        .replace("{default_results}", &limits.default_results.to_string())
        .replace("{max_min_thumbs}", &limits.max_min_thumbs.to_string())
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Review Analysis</title>
<style>
body { font-family: sans-serif; max-width: 960px; margin: 2rem auto; }
textarea { width: 100%; height: 5rem; }
.quick { display: block; margin: .2rem 0; }
#sources div { border-top: 1px solid #ddd; padding: .4rem 0; }
#error { color: #b00; }
</style>
</head>
<body>
<h1>Review Analysis</h1>
<p id="stats"></p>
<form id="ask">
  <label>Claude API key <input type="password" name="api_key" placeholder="optional if set on the server"></label>
  <h3>Quick questions</h3>
  {quick_questions}
  <h3>Your question</h3>
  <textarea name="question" placeholder="What are the main complaints about matching?"></textarea>
  <label>Analysis <select name="analysis_type">{analysis_options}</select></label>
  <label>Reviews <input type="range" name="n_results" min="{min_results}" max="{max_results}" value="{default_results}"
    oninput="document.getElementById('n_value').textContent = this.value"> <span id="n_value">{default_results}</span></label>
  <label>Type <select name="review_type">
    <option value="all">All Reviews</option>
    <option value="negative_only">Negative Only</option>
    <option value="positive_only">Positive Only</option>
  </select></label>
  <label>Min helpful votes <input type="number" name="min_thumbs" min="0" max="{max_min_thumbs}" value="0"></label>
  <button type="submit">Analyze</button>
</form>
<p id="error"></p>
<div id="analysis"></div>
<div id="sources"></div>
<script>
const form = document.getElementById('ask');
fetch('/api/stats').then(r => r.json()).then(s => {
  document.getElementById('stats').textContent = `${s.total_reviews} reviews, ${s.date_range}, model ${s.llm_model}`;
});
document.querySelectorAll('.quick').forEach(b => b.addEventListener('click', () => {
  form.question.value = b.dataset.q;
}));
form.addEventListener('submit', async ev => {
  ev.preventDefault();
  const body = {
    question: form.question.value,
    api_key: form.api_key.value || null,
    analysis_type: form.analysis_type.value,
    n_results: Number(form.n_results.value),
    review_type: form.review_type.value,
    min_thumbs: Number(form.min_thumbs.value),
  };
  document.getElementById('error').textContent = '';
  document.getElementById('analysis').textContent = 'Analyzing...';
  document.getElementById('sources').innerHTML = '';
  let res, data;
  try {
    res = await fetch('/api/analyze', { method: 'POST', headers: { 'content-type': 'application/json' }, body: JSON.stringify(body) });
    data = await res.json();
  } catch (err) {
    document.getElementById('analysis').textContent = '';
    document.getElementById('error').textContent = 'Request failed. Please try again.';
    return;
  }
  document.getElementById('analysis').textContent = '';
  if (!res.ok) { document.getElementById('error').textContent = data.error || 'Request failed. Please try again.'; return; }
  if (data.message) { document.getElementById('error').textContent = data.message; return; }
  document.getElementById('analysis').innerText = data.analysis;
  const sources = document.getElementById('sources');
  data.retrieved.forEach(r => {
    const d = document.createElement('div');
    d.textContent = `Review ${r.index} | ${r.score} stars | ${r.date} | ${r.thumbs_up} helpful: ${r.excerpt}`;
    sources.appendChild(d);
  });
});
</script>
</body>
</html>
"#;
