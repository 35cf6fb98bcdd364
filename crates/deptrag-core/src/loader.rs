use crate::error::{Error, Result};
use crate::types::Document;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads department folders under the upload root into [`Document`]s.
///
/// A department's corpus is its own folder followed by the shared general
/// folder. Files are read in name order; unreadable files are skipped with a
/// warning so one bad upload never blocks a whole department.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    upload_root: PathBuf,
    general: String,
}

impl DocumentLoader {
    pub fn new(upload_root: impl Into<PathBuf>, general: impl Into<String>) -> Self {
        Self { upload_root: upload_root.into(), general: general.into() }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn general_department(&self) -> &str {
        &self.general
    }

    pub fn department_dir(&self, department: &str) -> PathBuf {
        self.upload_root.join(department)
    }

    /// Department documents first, then general ones. Asking for the general
    /// department itself loads that folder once.
    pub fn load_department_documents(&self, department: &str) -> Result<Vec<Document>> {
        validate_name("department", department)?;
        let mut docs = self.load_folder(department);
        if department != self.general {
            docs.extend(self.load_folder(&self.general));
        }
        debug!(department, documents = docs.len(), "loaded department corpus");
        Ok(docs)
    }

    /// Every regular file directly inside `<upload_root>/<folder>`. A missing
    /// folder yields nothing.
    pub fn load_folder(&self, folder: &str) -> Vec<Document> {
        let dir = self.department_dir(folder);
        if !dir.is_dir() {
            warn!(folder, path = %dir.display(), "document folder not found");
            return Vec::new();
        }
        list_files(&dir)
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                match fs::read_to_string(&path) {
                    Ok(content) => Some(Document::new(content, format!("{folder}/{name}"))),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable document");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Sorted regular files directly inside `dir`, following symlinks.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Department and file names become single path components; anything that
/// could escape the upload root is rejected.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Error::InvalidName(format!("invalid {kind} name: {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_names() {
        for name in ["", " ", ".", "..", "a/b", "..\\x"] {
            assert!(validate_name("department", name).is_err(), "{name:?}");
        }
        assert!(validate_name("department", "finance").is_ok());
        assert!(validate_name("file", "policy.v2.txt").is_ok());
    }
}
