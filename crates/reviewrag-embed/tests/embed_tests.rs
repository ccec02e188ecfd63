use reviewrag_embed::{embed_in_batches, Embedder, FakeEmbedder, MINILM_DIM};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batching_preserves_order() {
    let embedder = FakeEmbedder::new(32);
    let texts: Vec<String> = (0..7).map(|i| format!("review number {i}")).collect();
    let batched = embed_in_batches(&embedder, &texts, 3, false).expect("batched");
    let whole = embedder.embed_batch(&texts).expect("whole");
    assert_eq!(batched.len(), 7);
    assert_eq!(batched, whole);
}

#[test]
fn default_embedder_honours_fake_setting() {
    let settings = reviewrag_core::config::EmbeddingSettings { use_fake: true, ..Default::default() };
    let embedder = reviewrag_embed::get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), MINILM_DIM);
    assert!(embedder.model_id().starts_with("fake:"));
}
