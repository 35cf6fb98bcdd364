use std::fs;
use tempfile::TempDir;

use deptrag_core::config::{Config, EmbeddingProvider};
use deptrag_core::loader::DocumentLoader;
use deptrag_core::model_config::JsonModelConfig;
use deptrag_core::traits::ModelSelector;

fn models() -> Vec<String> {
    vec!["gemini-2.5-flash".into(), "gemini-2.5-flash-lite".into(), "gemini-2.5-pro".into()]
}

#[test]
fn department_documents_come_before_general_ones() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("sales")).unwrap();
    fs::create_dir_all(root.join("general")).unwrap();
    fs::write(root.join("sales/B.txt"), "beta").unwrap();
    fs::write(root.join("sales/A.txt"), "alpha").unwrap();
    fs::write(root.join("general/policy.txt"), "policy").unwrap();

    let loader = DocumentLoader::new(root, "general");
    let docs = loader.load_department_documents("sales").expect("load");
    let ids: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();
    assert_eq!(ids, vec!["sales/A.txt", "sales/B.txt", "general/policy.txt"]);
    assert_eq!(docs[0].content, "alpha");
}

#[test]
fn general_department_is_loaded_once() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("general")).unwrap();
    fs::write(tmp.path().join("general/policy.txt"), "policy").unwrap();

    let loader = DocumentLoader::new(tmp.path(), "general");
    let docs = loader.load_department_documents("general").unwrap();
    assert_eq!(docs.len(), 1);
}

#[test]
fn missing_folders_yield_no_documents() {
    let tmp = TempDir::new().unwrap();
    let loader = DocumentLoader::new(tmp.path(), "general");
    assert!(loader.load_department_documents("it").unwrap().is_empty());
}

#[test]
fn unreadable_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("it");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("bad.bin"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
    fs::write(dir.join("good.txt"), "VPN guide").unwrap();
    fs::create_dir_all(dir.join("nested")).unwrap();

    let loader = DocumentLoader::new(tmp.path(), "general");
    let docs = loader.load_department_documents("it").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source_id, "it/good.txt");
}

#[test]
fn traversal_names_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let loader = DocumentLoader::new(tmp.path(), "general");
    assert!(loader.load_department_documents("../etc").is_err());
}

#[test]
fn model_config_defaults_when_missing_or_broken() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    let cfg = JsonModelConfig::new(&path, "gemini-2.5-flash", models());
    assert_eq!(cfg.current_model(), "gemini-2.5-flash");

    fs::write(&path, "{}").unwrap();
    assert_eq!(cfg.current_model(), "gemini-2.5-flash");

    fs::write(&path, "not json").unwrap();
    assert_eq!(cfg.current_model(), "gemini-2.5-flash");
}

#[test]
fn model_config_roundtrips_and_validates() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    let cfg = JsonModelConfig::new(&path, "gemini-2.5-flash", models());

    cfg.set_current_model("gemini-2.5-pro").expect("set");
    assert_eq!(cfg.current_model(), "gemini-2.5-pro");
    assert!(cfg.set_current_model("gpt-4o").is_err());
    assert_eq!(cfg.current_model(), "gemini-2.5-pro");
    assert!(!tmp.path().join("config.json.tmp").exists());
}

#[test]
fn config_layers_file_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            top_k = 3

            [embedding]
            provider = "fake"
            dimension = 32

            [departments]
            it = ["IT Support Specialist", "Junior IT Support"]
            "#,
        )?;
        jail.create_file("config.test.toml", "[paths]\nupload_dir = \"uploads\"\n")?;
        jail.set_env("APP_RETRIEVAL__TOP_K", "6");

        let settings = Config::load()
            .map_err(|e| e.to_string())?
            .settings()
            .map_err(|e| e.to_string())?;
        assert_eq!(settings.retrieval.top_k, 6);
        assert_eq!(settings.retrieval.chunk_size, 1000);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Fake);
        assert_eq!(settings.embedding.dimension, 32);
        assert!(settings.paths.upload_dir.ends_with("uploads"));
        assert!(settings.paths.vector_dir.ends_with("vectorstore"));
        assert_eq!(settings.roles_for("it").len(), 2);
        Ok(())
    });
}

#[test]
fn invalid_overlap_is_rejected_at_load() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[retrieval]\nchunk_size = 100\nchunk_overlap = 150\n")?;
        let result = Config::load().map_err(|e| e.to_string())?.settings();
        assert!(result.is_err());
        Ok(())
    });
}
