use deptrag_core::config::{EmbeddingProvider, EmbeddingSettings};
use deptrag_core::traits::Embedder;
use deptrag_embed::{get_default_embedder, FakeEmbedder};

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Fake, dimension: 64, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.embedder_id(), "fake:xxh64:d64");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_documents(&texts).await.expect("embed_documents");
    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 64);
    assert!((norm(&embs[0]) - 1.0).abs() <= 1e-3, "vector is L2-normalized");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn query_embedding_matches_document_embedding() {
    let embedder = FakeEmbedder::new(32);
    let q = embedder.embed_query("vacation request form").await.unwrap();
    let d = embedder.embed_documents(&["vacation request form".to_string()]).await.unwrap();
    assert_eq!(q, d[0]);
}

#[tokio::test]
async fn shared_words_score_higher_than_unrelated_text() {
    let embedder = FakeEmbedder::new(256);
    let q = embedder.embed_one("working hours policy");
    let near = embedder.embed_one("Our working hours are 9 to 5, see the policy");
    let far = embedder.embed_one("Forklift maintenance checklist");
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}
