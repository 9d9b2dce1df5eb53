//! Durable term -> embedding cache.
//!
//! The cache is read wholesale at startup and grows monotonically. Every
//! new term costs one provider call and one full rewrite of the cache file;
//! rewrites are serialized so two requests resolving different new terms at
//! the same time cannot drop each other's entry.

use crate::embedder::EmbeddingProvider;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use labelscan_core::{Error, Result, Vector};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EmbeddingIndex {
    cache: RwLock<HashMap<String, Vector>>,
    path: Option<PathBuf>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    persist_lock: Mutex<()>,
}

impl EmbeddingIndex {
    /// Open the cache file at `path`, starting empty when it does not exist
    pub fn open<P: AsRef<Path>>(
        path: P,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let data = std::fs::read(&path)?;
            let cache: HashMap<String, Vector> = serde_json::from_slice(&data)
                .map_err(|e| Error::InvalidConfig(format!("corrupt vectors file {:?}: {}", path, e)))?;
            check_uniform_dimension(&cache)?;
            info!("Loaded {} cached embeddings from {:?}", cache.len(), path);
            cache
        } else {
            warn!("Vectors file {:?} not found, starting with an empty cache", path);
            HashMap::new()
        };

        Ok(Self {
            cache: RwLock::new(cache),
            path: Some(path),
            provider,
            persist_lock: Mutex::new(()),
        })
    }

    /// Cache that is never written to disk
    pub fn in_memory(provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            path: None,
            provider,
            persist_lock: Mutex::new(()),
        }
    }

    /// Seed an entry without calling the provider or touching disk
    pub fn preload(&self, term: impl Into<String>, vector: Vector) -> Result<()> {
        let mut cache = self.cache.write();
        if let Some(expected) = cache.values().next().map(Vector::dim) {
            if expected != vector.dim() {
                return Err(Error::InvalidDimension {
                    expected,
                    actual: vector.dim(),
                });
            }
        }
        cache.insert(term.into(), vector);
        Ok(())
    }

    #[inline]
    pub fn get_cached(&self, term: &str) -> Option<Vector> {
        self.cache.read().get(term).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Dimensionality shared by every cached vector
    pub fn dim(&self) -> Option<usize> {
        self.cache.read().values().next().map(Vector::dim)
    }

    /// Cached vector for `term`, computing and persisting it on a miss.
    ///
    /// Fails with [`Error::EmbeddingUnavailable`] when the term is not
    /// cached and the provider cannot produce it.
    ///
    /// Writing the cache file is best-effort: a failed rewrite is logged
    /// and the vector is still returned and kept in memory, so the next
    /// successful rewrite picks it up.
    pub async fn get_embedding(&self, term: &str) -> Result<Vector> {
        if let Some(vector) = self.get_cached(term) {
            return Ok(vector);
        }

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::EmbeddingUnavailable(term.to_string()))?;

        let vector = match provider.embed(term).await {
            Ok(data) => Vector::new(data),
            Err(e) => {
                warn!("Embedding provider failed for {:?}: {}", term, e);
                return Err(Error::EmbeddingUnavailable(term.to_string()));
            }
        };

        self.insert_and_persist(term, vector)
    }

    fn insert_and_persist(&self, term: &str, vector: Vector) -> Result<Vector> {
        let _guard = self.persist_lock.lock();

        {
            let mut cache = self.cache.write();
            // Another request may have resolved the same term meanwhile
            if let Some(existing) = cache.get(term) {
                return Ok(existing.clone());
            }
            if let Some(expected) = cache.values().next().map(Vector::dim) {
                if expected != vector.dim() {
                    return Err(Error::InvalidDimension {
                        expected,
                        actual: vector.dim(),
                    });
                }
            }
            cache.insert(term.to_string(), vector.clone());
        }
        debug!("Cached new embedding for {:?}", term);

        if let Err(e) = self.persist() {
            warn!("Failed to persist embedding cache: {}", e);
        }

        Ok(vector)
    }

    /// Full rewrite of the cache file
    fn persist(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let data = {
            let cache = self.cache.read();
            let ordered: BTreeMap<&String, &Vector> = cache.iter().collect();
            serde_json::to_vec(&ordered)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&data))
            .map_err(|e| Error::Storage(format!("failed to write {:?}: {}", path, e)))?;
        Ok(())
    }
}

fn check_uniform_dimension(cache: &HashMap<String, Vector>) -> Result<()> {
    let mut dims = cache.values().map(Vector::dim);
    if let Some(expected) = dims.next() {
        if let Some(actual) = dims.find(|d| *d != expected) {
            return Err(Error::InvalidDimension { expected, actual });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        dim: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut v = vec![0.0; self.dim];
            v[text.len() % self.dim] = 1.0;
            Ok(v)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::upstream("embedding provider", "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_miss_calls_provider_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dim: 4,
        });

        let index = EmbeddingIndex::open(&path, Some(provider.clone())).unwrap();
        let first = index.get_embedding("serial").await.unwrap();
        let second = index.get_embedding("serial").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(path.exists());

        let reopened = EmbeddingIndex::open(&path, None).unwrap();
        assert_eq!(reopened.get_cached("serial"), Some(first));
    }

    #[tokio::test]
    async fn test_failed_provider_reports_unavailable() {
        let index = EmbeddingIndex::in_memory(Some(Arc::new(FailingProvider)));
        let result = index.get_embedding("capacity").await;
        assert!(matches!(result, Err(Error::EmbeddingUnavailable(_))));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_cached_term_survives_provider_outage() {
        let index = EmbeddingIndex::in_memory(Some(Arc::new(FailingProvider)));
        index.preload("make", Vector::new(vec![1.0, 0.0])).unwrap();
        assert!(index.get_embedding("make").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_dimension_change() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dim: 3,
        });
        let index = EmbeddingIndex::in_memory(Some(provider));
        index.preload("make", Vector::new(vec![1.0, 0.0])).unwrap();

        let result = index.get_embedding("model").await;
        assert!(matches!(result, Err(Error::InvalidDimension { expected: 2, actual: 3 })));
        assert_eq!(index.len(), 1);
    }

    /// Answers every term with a fresh vector and yields before replying so
    /// concurrent misses overlap.
    struct SlowSequenceProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for SlowSequenceProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(vec![n as f32 + 1.0, 1.0])
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_misses_are_all_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dim: 4,
        });
        let index = Arc::new(EmbeddingIndex::open(&path, Some(provider)).unwrap());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let index = index.clone();
                tokio::spawn(async move { index.get_embedding(&format!("term-{}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(index.len(), 64);
        let reopened = EmbeddingIndex::open(&path, None).unwrap();
        assert_eq!(reopened.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_on_one_term_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let provider = Arc::new(SlowSequenceProvider {
            calls: AtomicUsize::new(0),
        });
        let index = Arc::new(EmbeddingIndex::open(&path, Some(provider.clone())).unwrap());

        let a = tokio::spawn({
            let index = index.clone();
            async move { index.get_embedding("serial").await }
        });
        let b = tokio::spawn({
            let index = index.clone();
            async move { index.get_embedding("serial").await }
        });
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(a, b);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_cached("serial"), Some(a.clone()));
        assert_eq!(EmbeddingIndex::open(&path, None).unwrap().get_cached("serial"), Some(a));
        assert!(provider.calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unwritable_cache_file_keeps_vector_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dim: 2,
        });

        let index = EmbeddingIndex::open(blocker.join("vectors.json"), Some(provider.clone())).unwrap();
        let vector = index.get_embedding("model").await.unwrap();
        assert_eq!(index.get_cached("model"), Some(vector));

        index.get_embedding("model").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_rejects_mixed_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        std::fs::write(&path, r#"{"a": [1.0, 0.0], "b": [1.0, 0.0, 0.0]}"#).unwrap();
        assert!(EmbeddingIndex::open(&path, None).is_err());
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = EmbeddingIndex::open(dir.path().join("absent.json"), None).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dim(), None);
    }
}
