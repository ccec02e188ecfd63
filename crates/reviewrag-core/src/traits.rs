pub trait Embedder: Send + Sync {
    /// Stable identifier of the model (e.g. `all-MiniLM-L6-v2:d384`), recorded in the collection header.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
