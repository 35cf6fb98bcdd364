use std::sync::Arc;
use tempfile::TempDir;

use deptrag_core::chunker::{ChunkingConfig, TextSplitter};
use deptrag_core::config::{EmbeddingProvider, Settings};
use deptrag_core::error::Error;
use deptrag_core::loader::DocumentLoader;
use deptrag_embed::FakeEmbedder;
use deptrag_rag::KnowledgeBase;
use deptrag_vector::{IndexRegistry, IndexState, IndexStore, Invalidation};

fn knowledge_base(upload: &TempDir, vectors: &TempDir) -> (KnowledgeBase, Arc<IndexStore>) {
    let loader = DocumentLoader::new(upload.path(), "general");
    let registry = Arc::new(IndexRegistry::new(vectors.path(), "general"));
    let store = Arc::new(IndexStore::with_registry(
        Arc::clone(&registry),
        loader.clone(),
        TextSplitter::new(ChunkingConfig::default()).unwrap(),
        Arc::new(FakeEmbedder::new(32)),
    ));
    (KnowledgeBase::new(loader, registry), store)
}

#[test]
fn documents_can_be_saved_listed_and_deleted() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let (kb, _) = knowledge_base(&upload, &vectors);

    assert!(kb.list_departments().unwrap().is_empty());
    kb.save_document("finance", "b.txt", "second").unwrap();
    kb.save_document("finance", "a.txt", "first").unwrap();
    kb.save_document("general", "policy.txt", "policy").unwrap();

    assert_eq!(kb.list_departments().unwrap(), vec!["finance", "general"]);
    assert_eq!(kb.list_documents("finance").unwrap(), vec!["a.txt", "b.txt"]);

    kb.save_document("finance", "a.txt", "edited").unwrap();
    assert_eq!(std::fs::read_to_string(upload.path().join("finance/a.txt")).unwrap(), "edited");

    kb.delete_document("finance", "a.txt").unwrap();
    assert_eq!(kb.list_documents("finance").unwrap(), vec!["b.txt"]);
    assert!(matches!(kb.delete_document("finance", "a.txt"), Err(Error::NotFound(_))));
}

#[test]
fn documents_can_be_read_back_for_editing() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let (kb, _) = knowledge_base(&upload, &vectors);

    kb.save_document("it", "vpn.txt", "Use the VPN.\nAsk IT for a token.").unwrap();
    assert_eq!(kb.read_document("it", "vpn.txt").unwrap(), "Use the VPN.\nAsk IT for a token.");

    assert!(matches!(kb.read_document("it", "missing.txt"), Err(Error::NotFound(_))));
    assert!(matches!(kb.read_document("hr", "vpn.txt"), Err(Error::NotFound(_))));
    assert!(matches!(kb.read_document("it", "../it/vpn.txt"), Err(Error::InvalidName(_))));
    assert!(matches!(kb.read_document("..", "vpn.txt"), Err(Error::InvalidName(_))));
}

#[test]
fn file_names_cannot_escape_the_department_folder() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let (kb, _) = knowledge_base(&upload, &vectors);

    assert!(matches!(kb.save_document("finance", "../x.txt", "x"), Err(Error::InvalidName(_))));
    assert!(matches!(kb.save_document("..", "x.txt", "x"), Err(Error::InvalidName(_))));
    assert!(kb.list_documents("a/b").is_err());
}

#[tokio::test]
async fn admin_works_without_an_embedding_service() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.paths.upload_dir = upload.path().to_path_buf();
    settings.paths.vector_dir = vectors.path().to_path_buf();
    settings.embedding.provider = EmbeddingProvider::Remote;
    settings.embedding.api_key_env = "DEPTRAG_TEST_KEY_THAT_IS_NEVER_SET".into();
    std::fs::create_dir_all(vectors.path().join("finance")).unwrap();

    let kb = KnowledgeBase::from_settings(&settings);
    kb.save_document("finance", "budget.txt", "Budgets close in March.").unwrap();
    assert_eq!(kb.list_departments().unwrap(), vec!["finance"]);
    assert_eq!(kb.list_documents("finance").unwrap(), vec!["budget.txt"]);
    assert!(matches!(kb.invalidate("finance").await.unwrap(), Invalidation::Cleared { .. }));
    assert!(!vectors.path().join("finance").exists());
}

#[tokio::test]
async fn invalidation_makes_new_documents_visible() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let (kb, store) = knowledge_base(&upload, &vectors);

    kb.save_document("it", "vpn.txt", "Use the VPN.").unwrap();
    let first = store.get_index("it").await.unwrap();
    assert_eq!(first.chunk_count().await.unwrap(), 1);
    drop(first);

    kb.save_document("it", "printer.txt", "Toner is in cabinet B.").unwrap();
    let stale = store.get_index("it").await.unwrap();
    assert_eq!(stale.chunk_count().await.unwrap(), 1);
    drop(stale);

    assert!(matches!(kb.invalidate("it").await.unwrap(), Invalidation::Cleared { .. }));
    assert_eq!(store.state("it"), IndexState::NotBuilt);
    let fresh = store.get_index("it").await.unwrap();
    assert_eq!(fresh.chunk_count().await.unwrap(), 2);
}

#[tokio::test]
async fn invalidating_unbuilt_department_reports_not_built() {
    let upload = TempDir::new().unwrap();
    let vectors = TempDir::new().unwrap();
    let (kb, _) = knowledge_base(&upload, &vectors);
    assert_eq!(kb.invalidate("marketing").await.unwrap(), Invalidation::NotBuilt);
    assert_eq!(kb.invalidate("general").await.unwrap(), Invalidation::NotBuilt);
}
