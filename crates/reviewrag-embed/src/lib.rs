use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, DType};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};

use reviewrag_core::config::{expand_path, EmbeddingSettings};
pub use reviewrag_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::{tokenize_batch_on_device, EncodedBatch};

pub const MINILM_DIM: usize = 384;

/// Sentence embedder for all-MiniLM-L6-v2 (BERT, mean pooling, L2 normalised).
pub struct MiniLmEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, pad_id: u32, dim: usize, max_len: usize, id: String }

impl MiniLmEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let config_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&config_text)?;
        let dim = hidden_size(&config_text).unwrap_or(MINILM_DIM);

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)
                .with_context(|| format!("Failed to read weights {}", weights_path.display()))?;
            let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DType::F32, &device)
        };
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "bert".to_string());
        let id = format!("{}:d{}", name, dim);
        tracing::info!(model = %id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, pad_id, dim, max_len, id })
    }
}

fn hidden_size(config_json: &str) -> Option<usize> {
    let v: serde_json::Value = serde_json::from_str(config_json).ok()?;
    v.get("hidden_size")?.as_u64().map(|d| d as usize)
}

impl Embedder for MiniLmEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let start = Instant::now();
        let enc = tokenize_batch_on_device(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&enc.input_ids, &enc.token_type_ids, Some(&enc.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &enc.attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Token-hash embedder: deterministic, L2 normalised, no model files needed.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("fake:d{}", dim) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || fake_embeddings_requested() {
        tracing::warn!("using FakeEmbedder; results are not semantically meaningful");
        return Ok(Box::new(FakeEmbedder::new(MINILM_DIM)));
    }
    let dir = resolve_model_dir(&settings.model_dir)?;
    Ok(Box::new(MiniLmEmbedder::load(&dir, settings.max_len)?))
}

/// Embeds `texts` in chunks of `batch_size`, preserving order.
pub fn embed_in_batches(embedder: &dyn Embedder, texts: &[String], batch_size: usize, show_progress: bool) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let pb = if show_progress { ProgressBar::new(texts.len() as u64) } else { ProgressBar::hidden() };
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embeddings ({percent}%)")?.progress_chars("#>-"));
    let mut out = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size) {
        let embs = embedder.embed_batch(chunk)?;
        if embs.len() != chunk.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", embs.len(), chunk.len()));
        }
        if let Some(bad) = embs.iter().find(|e| e.len() != embedder.dim()) {
            return Err(anyhow!("embedding dim {} != expected {}", bad.len(), embedder.dim()));
        }
        out.extend(embs);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    Ok(out)
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = expand_path(&dir); if p.exists() { tracing::info!("Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = expand_path(&dir); if p.exists() { tracing::info!("Using MODEL_DIR: {}", p.display()); return Ok(p); } }
    let p = expand_path(configured); if p.exists() { return Ok(p); }
    let parent = Path::new("..").join(&p); if parent.exists() { tracing::info!("Using model dir: {}", parent.display()); return Ok(parent); }
    Err(anyhow!("Could not locate sentence embedding model directory '{}'", configured))
}
