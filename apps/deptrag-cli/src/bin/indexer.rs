//! `deptrag-indexer`: pre-builds department indexes so the first question in
//! each department does not pay the embedding cost.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use deptrag_core::chunker::{ChunkingConfig, TextSplitter};
use deptrag_core::config::Config;
use deptrag_core::loader::DocumentLoader;
use deptrag_core::logging;
use deptrag_embed::get_default_embedder;
use deptrag_rag::KnowledgeBase;
use deptrag_vector::IndexStore;

#[derive(Parser)]
#[command(name = "deptrag-indexer", version, about = "Build department indexes ahead of time")]
struct Cli {
    /// Departments to build; defaults to every department folder and configured department
    departments: Vec<String>,

    /// Drop existing indexes first
    #[arg(short, long)]
    force: bool,

    /// Directory holding config.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let settings = Config::load_from(&cli.config_dir)?.settings()?;

    let embedder = get_default_embedder(&settings.embedding)?;
    let splitter = TextSplitter::new(ChunkingConfig {
        chunk_size: settings.retrieval.chunk_size,
        chunk_overlap: settings.retrieval.chunk_overlap,
    })?;
    let general = settings.retrieval.general_department.clone();
    let loader = DocumentLoader::new(&settings.paths.upload_dir, &general);
    let store = Arc::new(IndexStore::new(&settings.paths.vector_dir, loader, splitter, embedder));
    let kb = KnowledgeBase::new(store.loader().clone(), Arc::clone(store.registry()));

    let departments: Vec<String> = if cli.departments.is_empty() {
        let mut all: BTreeSet<String> = kb.list_departments()?.into_iter().collect();
        all.extend(settings.departments.keys().cloned());
        all.remove(&general);
        all.into_iter().collect()
    } else {
        cli.departments
    };

    if cli.force {
        for dept in &departments {
            kb.invalidate(dept).await?;
        }
    }

    let pb = ProgressBar::new(departments.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} departments {msg}")?
            .progress_chars("#>-"),
    );

    let mut built = 0usize;
    let mut empty = Vec::new();
    for dept in &departments {
        pb.set_message(dept.clone());
        match store.get_index(dept).await {
            Some(index) => {
                let chunks = index.chunk_count().await?;
                info!(department = %dept, chunks, "index ready");
                built += 1;
            }
            None => empty.push(dept.clone()),
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("Indexes ready: {built}/{}", departments.len());
    if !empty.is_empty() {
        println!("No index (no documents or build failed): {}", empty.join(", "));
    }
    Ok(())
}
