use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use reviewrag_cli::{db_dir, init_logging, reviews_csv};
use reviewrag_core::config::Config;
use reviewrag_core::dataset::{filter_recent, load_reviews, recency_cutoff, stratified_sample, CorpusStats};
use reviewrag_core::document::{feedback_excerpt, ReviewProcessor};
use reviewrag_core::traits::Embedder;
use reviewrag_core::types::CollectionHeader;
use reviewrag_embed::{embed_in_batches, get_default_embedder};
use reviewrag_vector::{ReviewIndexer, ReviewSearchEngine};

const SMOKE_QUERIES: [&str; 3] = ["recent matching problems", "latest pricing complaints", "new feature requests"];

#[derive(Debug, Parser)]
#[command(name = "reviewrag-indexer", about = "Build the review vector collection from a CSV export")]
struct Args {
    /// Reviews CSV (defaults to data.reviews_csv)
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long)]
    db_dir: Option<PathBuf>,
    #[arg(long)]
    collection: Option<String>,
    /// Keep reviews newer than N days; 0 keeps everything
    #[arg(long)]
    recent_days: Option<u32>,
    /// Stratified sample of N reviews across star ratings
    #[arg(long)]
    sample: Option<usize>,
    /// Run a few queries against the fresh collection
    #[arg(long)]
    smoke_test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let settings = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?.settings()?;

    let csv_path = match args.csv { Some(p) => p, None => reviews_csv(&settings)? };
    let db_path = match args.db_dir { Some(p) => p, None => db_dir(&settings)? };
    let collection = args.collection.unwrap_or_else(|| settings.data.collection.clone());
    let recent_days = args.recent_days.unwrap_or(settings.index.recent_days);
    let sample_size = args.sample.unwrap_or(settings.index.sample_size);

    println!("Review Collection Indexer\n=========================");
    println!("CSV: {}", csv_path.display());
    println!("Store: {} (collection '{}')", db_path.display(), collection);

    println!("\n[1/5] Loading reviews");
    let mut records = load_reviews(&csv_path).with_context(|| format!("loading {}", csv_path.display()))?;
    println!("  Loaded {} reviews", records.len());
    if let Some(cutoff) = recency_cutoff(chrono::Local::now().naive_local(), recent_days) {
        records = filter_recent(records, cutoff);
        println!("  {} reviews from the last {} days (since {})", records.len(), recent_days, cutoff.date());
    }
    if sample_size > 0 {
        records = stratified_sample(records, sample_size, settings.index.sample_seed);
        println!("  Sampled {} reviews across ratings", records.len());
    }
    let corpus = CorpusStats::from_records(&records);
    println!("  Date range: {}", corpus.date_range());
    println!("  Avg rating: {:.2}", corpus.avg_rating);
    println!("  Versions: {}", corpus.versions);

    println!("\n[2/5] Preparing documents");
    let docs = ReviewProcessor::new().process(&records)?;
    println!("  Prepared {} documents", docs.len());

    println!("\n[3/5] Embedding");
    let embedder = get_default_embedder(&settings.embedding)?;
    println!("  Model: {} ({} dims)", embedder.model_id(), embedder.dim());
    let texts: Vec<String> = docs.iter().map(|d| d.document.clone()).collect();
    let embeddings = embed_in_batches(embedder.as_ref(), &texts, settings.index.embed_batch_size, true)?;

    println!("\n[4/5] Creating collection");
    fs::create_dir_all(&db_path).with_context(|| format!("creating {}", db_path.display()))?;
    let indexer = ReviewIndexer::new(&db_path, &collection, embedder.dim()).await?.with_progress(true);
    let header = CollectionHeader {
        description: settings.index.description.clone(),
        total_reviews: docs.len(),
        date_created: chrono::Local::now().format("%Y-%m-%d").to_string(),
        date_range_start: corpus.date_start.map(|d| d.to_string()).unwrap_or_default(),
        date_range_end: corpus.date_end.map(|d| d.to_string()).unwrap_or_default(),
        embedding_model: embedder.model_id().to_string(),
    };

    println!("\n[5/5] Inserting");
    let stored = indexer.build(&docs, &embeddings, &header, settings.index.insert_batch_size).await?;

    println!("\n✅ Indexing completed successfully!");
    println!("📊 Total reviews: {}", stored);
    println!("📅 Date range: {}", corpus.date_range());
    println!("⭐ Avg rating: {:.2}", corpus.avg_rating);
    println!("👎 Negative (1-2 stars): {} ({:.1}%)", corpus.negative, corpus.negative_share());
    println!("👍 Positive (4-5 stars): {} ({:.1}%)", corpus.positive, corpus.positive_share());

    if args.smoke_test {
        smoke_test(ReviewSearchEngine::open(&db_path, &collection, embedder).await?).await?;
    }
    println!("\n💡 To ask a question, use: cargo run --bin reviewrag-ask '<question>'");
    Ok(())
}

async fn smoke_test(engine: ReviewSearchEngine) -> anyhow::Result<()> {
    println!("\nSmoke test\n----------");
    for query in SMOKE_QUERIES {
        println!("\n🔎 '{}'", query);
        for hit in engine.retrieve(query, 2, None).await? {
            let m = &hit.metadata;
            println!("  {}⭐ | {} | v{}", m.score, m.date, m.version);
            if let Some(preview) = feedback_excerpt(&hit.document, 100) {
                println!("    {}", preview);
            }
        }
    }
    Ok(())
}
