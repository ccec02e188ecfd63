use clap::Parser;
use std::sync::Arc;

use reviewrag_analyst::{AnalysisType, Analyzer, AnthropicClient, AskRequest};
use reviewrag_cli::{db_dir, init_logging};
use reviewrag_core::config::Config;
use reviewrag_core::document::feedback_excerpt;
use reviewrag_core::filter::{FilterConfig, ReviewType};
use reviewrag_embed::get_default_embedder;
use reviewrag_vector::ReviewSearchEngine;

#[derive(Debug, Parser)]
#[command(name = "reviewrag-ask", about = "Ask a question about the indexed reviews")]
struct Args {
    question: String,
    /// Reviews to retrieve (defaults to analysis.default_results)
    #[arg(short = 'n', long)]
    n_results: Option<usize>,
    #[arg(long, conflicts_with = "positive")]
    negative: bool,
    #[arg(long)]
    positive: bool,
    #[arg(long, default_value_t = 0)]
    min_thumbs: u32,
    /// general, root-cause or feature-requests
    #[arg(long, default_value = "general")]
    analysis: AnalysisType,
    /// Overrides the key read from llm.api_key_env
    #[arg(long)]
    api_key: Option<String>,
    /// Only print the retrieved reviews
    #[arg(long)]
    retrieve_only: bool,
}

impl Args {
    fn review_type(&self) -> ReviewType {
        match (self.negative, self.positive) {
            (true, _) => ReviewType::NegativeOnly,
            (_, true) => ReviewType::PositiveOnly,
            _ => ReviewType::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let settings = Config::load()?.settings()?;

    let embedder = get_default_embedder(&settings.embedding)?;
    let engine = ReviewSearchEngine::open(&db_dir(&settings)?, &settings.data.collection, embedder).await?;
    let analyzer = Analyzer::new(Arc::new(engine));

    let request = AskRequest {
        question: args.question.clone(),
        n_results: args.n_results.unwrap_or(settings.analysis.default_results),
        filter: FilterConfig { review_type: args.review_type(), min_thumbs: args.min_thumbs },
        analysis_type: args.analysis,
    };

    if args.retrieve_only {
        let hits = analyzer.retrieve(&request.question, request.n_results, &request.filter).await?;
        println!("🔎 {} reviews for '{}' ({})", hits.len(), request.question, request.filter.review_type.label());
        for (i, hit) in hits.iter().enumerate() {
            let m = &hit.metadata;
            println!("\n{}. {}⭐ | {} | {} helpful | distance {:.4}", i + 1, m.score, m.date, m.thumbs_up, hit.distance);
            println!("   {}", feedback_excerpt(&hit.document, 300).unwrap_or_default());
        }
        return Ok(());
    }

    let client = AnthropicClient::new(&settings.llm, args.api_key.clone())?;
    let analysis = analyzer.ask(&client, &request).await?;
    println!("{}\n", request.analysis_type.label());
    println!("{}", analysis.text);
    if !analysis.retrieved.is_empty() {
        println!("\nSource reviews ({})", analysis.retrieved.len());
        for (i, hit) in analysis.retrieved.iter().enumerate() {
            let m = &hit.metadata;
            println!("  Review {} | {}⭐ | {} | {} helpful", i + 1, m.score, m.date, m.thumbs_up);
        }
    }
    Ok(())
}
