//! Per-department index lifecycle.
//!
//! The persisted directory `<vector_root>/<department>` is the only source of
//! truth: every request opens it from disk, so deleting it (from this process
//! or another) is observed by the next request. Builds are serialized per
//! department and written to a hidden staging directory that is renamed into
//! place once complete.

use anyhow::{ensure, Result};
use deptrag_core::chunker::TextSplitter;
use deptrag_core::loader::{validate_name, DocumentLoader};
use deptrag_core::traits::Embedder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::registry::{IndexRegistry, IndexState, Invalidation};
use crate::search::DepartmentIndex;
use crate::table::IndexMeta;
use crate::writer::write_index;

pub struct IndexStore {
    registry: Arc<IndexRegistry>,
    loader: DocumentLoader,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
}

impl IndexStore {
    pub fn new(
        vector_root: impl Into<PathBuf>,
        loader: DocumentLoader,
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let registry = Arc::new(IndexRegistry::new(vector_root, loader.general_department()));
        Self::with_registry(registry, loader, splitter, embedder)
    }

    /// Shares `registry` (and so its build locks) with other users in this
    /// process, such as the admin side.
    pub fn with_registry(
        registry: Arc<IndexRegistry>,
        loader: DocumentLoader,
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self { registry, loader, splitter, embedder }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn state(&self, department: &str) -> IndexState {
        self.registry.state(department)
    }

    /// Returns the department's index, building it when nothing usable is
    /// persisted. `None` means there are no documents or the build failed;
    /// failures are logged, never returned.
    pub async fn get_index(&self, department: &str) -> Option<DepartmentIndex> {
        match self.load_index(department).await {
            Ok(index) => index,
            Err(e) => {
                error!(department, error = %e, "index build failed");
                None
            }
        }
    }

    /// Like [`get_index`](Self::get_index) but hands build failures to the
    /// caller. `Ok(None)` means the department has no documents.
    pub async fn load_index(&self, department: &str) -> Result<Option<DepartmentIndex>> {
        validate_name("department", department)?;
        if let Some(index) = self.try_open(department).await {
            return Ok(Some(index));
        }

        let _guard = self.registry.lock(department).await;
        // Another request may have finished the build while we waited.
        if let Some(index) = self.try_open(department).await {
            return Ok(Some(index));
        }
        self.rebuild(department).await
    }

    pub async fn invalidate(&self, department: &str) -> Result<Invalidation> {
        self.registry.invalidate(department).await
    }

    async fn try_open(&self, department: &str) -> Option<DepartmentIndex> {
        let path = self.registry.index_path(department);
        if !path.is_dir() {
            return None;
        }
        match DepartmentIndex::open(&path, department).await {
            Ok(index) => {
                let meta = index.meta();
                if meta.embedder_id == self.embedder.embedder_id() && meta.dimension == self.embedder.dim() {
                    debug!(department, chunks = meta.chunk_count, "loaded persisted index");
                    Some(index)
                } else {
                    info!(
                        department,
                        stored = %meta.embedder_id,
                        current = self.embedder.embedder_id(),
                        "persisted index built with a different embedder, rebuilding"
                    );
                    None
                }
            }
            Err(e) => {
                warn!(department, path = %path.display(), error = %e, "persisted index unreadable, rebuilding");
                None
            }
        }
    }

    /// Builds from documents and replaces whatever is persisted. Caller holds
    /// the department lock.
    async fn rebuild(&self, department: &str) -> Result<Option<DepartmentIndex>> {
        let path = self.registry.index_path(department);
        let docs = self.loader.load_department_documents(department)?;
        let chunks = self.splitter.split_documents(&docs);
        if chunks.is_empty() {
            info!(department, documents = docs.len(), "no documents to index");
            if path.exists() {
                fs::remove_dir_all(&path).await?;
            }
            return Ok(None);
        }

        info!(department, documents = docs.len(), chunks = chunks.len(), "building index");
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        ensure!(
            embeddings.len() == chunks.len(),
            "embedder returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        );

        let meta = IndexMeta::new(self.embedder.embedder_id(), self.embedder.dim(), chunks.len());
        let staging = self.registry.staging_path(department);
        fs::create_dir_all(self.registry.vector_root()).await?;
        if let Err(e) = write_index(&staging, &chunks, &embeddings, &meta).await {
            discard(&staging).await;
            return Err(e);
        }
        let index = self.publish(department, &staging).await?;
        info!(department, chunks = chunks.len(), path = %path.display(), "index persisted");
        Ok(Some(index))
    }

    /// Moves a finished staging directory into place. The in-process lock does
    /// not cover other processes, so a compatible index that appeared at the
    /// destination meanwhile is kept and the staging copy dropped.
    async fn publish(&self, department: &str, staging: &Path) -> Result<DepartmentIndex> {
        let path = self.registry.index_path(department);
        if path.exists() {
            if let Some(index) = self.try_open(department).await {
                info!(department, "index published by another process, keeping it");
                discard(staging).await;
                return Ok(index);
            }
            if let Err(e) = fs::remove_dir_all(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    discard(staging).await;
                    return Err(e.into());
                }
            }
        }
        if let Err(e) = fs::rename(staging, &path).await {
            discard(staging).await;
            if let Some(index) = self.try_open(department).await {
                info!(department, "index published by another process, keeping it");
                return Ok(index);
            }
            return Err(e.into());
        }
        DepartmentIndex::open(&path, department).await
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove staging directory");
        }
    }
}
