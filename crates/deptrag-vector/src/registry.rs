//! On-disk layout of department indexes and the per-department build locks.
//!
//! Holds no embedder, so admin tooling can invalidate indexes without a
//! connection to the embedding service.

use anyhow::Result;
use deptrag_core::loader::validate_name;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::info;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NotBuilt,
    Persisted,
}

/// Result of an explicit invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Cleared { path: PathBuf },
    NotBuilt,
}

pub struct IndexRegistry {
    vector_root: PathBuf,
    general: String,
    locks: Mutex<LockMap>,
}

impl IndexRegistry {
    pub fn new(vector_root: impl Into<PathBuf>, general: impl Into<String>) -> Self {
        Self { vector_root: vector_root.into(), general: general.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn index_path(&self, department: &str) -> PathBuf {
        self.vector_root.join(department)
    }

    pub fn state(&self, department: &str) -> IndexState {
        if self.index_path(department).is_dir() {
            IndexState::Persisted
        } else {
            IndexState::NotBuilt
        }
    }

    /// Removes persisted indexes so the next request rebuilds. Invalidating
    /// the general department clears every department, since each index
    /// embeds the general documents.
    pub async fn invalidate(&self, department: &str) -> Result<Invalidation> {
        validate_name("department", department)?;
        if department == self.general {
            let mut cleared = false;
            for dept in self.known_departments().await? {
                cleared |= self.remove_locked(&dept).await?;
            }
            info!(path = %self.vector_root.display(), cleared, "cleared all department indexes");
            return Ok(if cleared {
                Invalidation::Cleared { path: self.vector_root.clone() }
            } else {
                Invalidation::NotBuilt
            });
        }
        let path = self.index_path(department);
        if self.remove_locked(department).await? {
            info!(department, path = %path.display(), "index invalidated");
            Ok(Invalidation::Cleared { path })
        } else {
            Ok(Invalidation::NotBuilt)
        }
    }

    /// Takes the department's build lock. The lock entry is dropped again once
    /// no one holds or waits for it.
    pub(crate) async fn lock(&self, department: &str) -> BuildGuard<'_> {
        let lock = self.lock_for(department);
        let guard = lock.lock_owned().await;
        BuildGuard { registry: self, department: department.to_string(), guard: Some(guard) }
    }

    pub(crate) fn vector_root(&self) -> &Path {
        &self.vector_root
    }

    pub(crate) fn staging_path(&self, department: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos());
        self.vector_root.join(format!(".{department}.staging-{}-{nanos}", std::process::id()))
    }

    async fn remove_locked(&self, department: &str) -> Result<bool> {
        let _guard = self.lock(department).await;
        let path = self.index_path(department);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&path).await?;
        Ok(true)
    }

    /// Departments with a persisted index or a live lock entry (a build may be
    /// in flight). Hidden staging directories are skipped.
    async fn known_departments(&self) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = self.lock_map().keys().cloned().collect();
        if self.vector_root.is_dir() {
            let mut entries = fs::read_dir(&self.vector_root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with('.') && entry.file_type().await?.is_dir() {
                    names.insert(name);
                }
            }
        }
        Ok(names)
    }

    fn lock_for(&self, department: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.lock_map().entry(department.to_string()).or_default())
    }

    fn release(&self, department: &str) {
        let mut locks = self.lock_map();
        if locks.get(department).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(department);
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct BuildGuard<'a> {
    registry: &'a IndexRegistry,
    department: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(&self.department);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracked(registry: &IndexRegistry) -> usize {
        registry.lock_map().len()
    }

    #[tokio::test]
    async fn lock_entries_are_dropped_after_use() {
        let tmp = TempDir::new().unwrap();
        let registry = IndexRegistry::new(tmp.path(), "general");

        let guard = registry.lock("it").await;
        assert_eq!(tracked(&registry), 1);
        drop(guard);
        assert_eq!(tracked(&registry), 0);

        for dept in ["nope-1", "nope-2", "nope-3"] {
            assert_eq!(registry.invalidate(dept).await.unwrap(), Invalidation::NotBuilt);
        }
        assert_eq!(tracked(&registry), 0);
    }

    #[tokio::test]
    async fn lock_entry_survives_while_another_task_waits() {
        let tmp = TempDir::new().unwrap();
        let registry = Arc::new(IndexRegistry::new(tmp.path(), "general"));

        let first = registry.lock("finance").await;
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _second = registry.lock("finance").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(first);
        assert!(tracked(&registry) <= 1);
        waiter.await.unwrap();
        assert_eq!(tracked(&registry), 0);
    }

    #[tokio::test]
    async fn general_invalidation_clears_every_department_without_an_embedder() {
        let tmp = TempDir::new().unwrap();
        for dept in ["finance", "it"] {
            std::fs::create_dir_all(tmp.path().join(dept)).unwrap();
        }
        std::fs::create_dir_all(tmp.path().join(".it.staging-1-2")).unwrap();
        let registry = IndexRegistry::new(tmp.path(), "general");

        assert_eq!(registry.state("it"), IndexState::Persisted);
        assert!(matches!(registry.invalidate("general").await.unwrap(), Invalidation::Cleared { .. }));
        assert_eq!(registry.state("finance"), IndexState::NotBuilt);
        assert_eq!(registry.state("it"), IndexState::NotBuilt);
        assert!(tmp.path().join(".it.staging-1-2").exists());
        assert!(registry.invalidate("../it").await.is_err());
    }
}
