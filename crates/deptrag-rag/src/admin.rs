//! Document management against the upload root, plus index invalidation.
//!
//! Nothing here touches the embedding service: documents are plain files and
//! invalidation only removes persisted index directories.

use deptrag_core::config::Settings;
use deptrag_core::error::{Error, Result};
use deptrag_core::loader::{list_files, validate_name, DocumentLoader};
use deptrag_vector::{IndexRegistry, Invalidation};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Admin-side operations. Document changes are not visible to questions until
/// the affected department is invalidated.
#[derive(Clone)]
pub struct KnowledgeBase {
    loader: DocumentLoader,
    registry: Arc<IndexRegistry>,
}

impl KnowledgeBase {
    pub fn new(loader: DocumentLoader, registry: Arc<IndexRegistry>) -> Self {
        Self { loader, registry }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let general = &settings.retrieval.general_department;
        Self::new(
            DocumentLoader::new(&settings.paths.upload_dir, general),
            Arc::new(IndexRegistry::new(&settings.paths.vector_dir, general)),
        )
    }

    /// Department folders under the upload root, sorted. Hidden entries are skipped.
    pub fn list_departments(&self) -> Result<Vec<String>> {
        let root = self.loader.upload_root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && entry.file_type()?.is_dir() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn list_documents(&self, department: &str) -> Result<Vec<String>> {
        validate_name("department", department)?;
        let dir = self.loader.department_dir(department);
        Ok(list_files(&dir)
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    /// Current text of a document, for viewing before an edit.
    pub fn read_document(&self, department: &str, file_name: &str) -> Result<String> {
        let path = self.document_path(department, file_name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(format!("{department}/{file_name}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or overwrites a document, creating the department folder if needed.
    pub fn save_document(&self, department: &str, file_name: &str, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.document_path(department, file_name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, content)?;
        info!(department, file = file_name, "document saved");
        Ok(path)
    }

    pub fn delete_document(&self, department: &str, file_name: &str) -> Result<()> {
        let path = self.document_path(department, file_name)?;
        if !path.is_file() {
            return Err(Error::NotFound(format!("{department}/{file_name}")));
        }
        fs::remove_file(&path)?;
        info!(department, file = file_name, "document deleted");
        Ok(())
    }

    /// Forces the next question to rebuild. The general department clears
    /// every index.
    pub async fn invalidate(&self, department: &str) -> Result<Invalidation> {
        validate_name("department", department)?;
        self.registry
            .invalidate(department)
            .await
            .map_err(|e| Error::Operation(format!("invalidating {department}: {e}")))
    }

    fn document_path(&self, department: &str, file_name: &str) -> Result<PathBuf> {
        validate_name("department", department)?;
        validate_name("file", file_name)?;
        Ok(self.loader.department_dir(department).join(file_name))
    }
}
