//! Text to synthesized-audio cache

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::Result;

/// How cache keys are derived from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyPolicy {
    /// Byte-for-byte text
    #[default]
    Exact,
    /// Text with surrounding whitespace removed
    Trimmed,
}

impl CacheKeyPolicy {
    fn key(self, text: &str) -> String {
        match self {
            Self::Exact => text.to_string(),
            Self::Trimmed => text.trim().to_string(),
        }
    }
}

/// Maps text to the audio file synthesized for it
///
/// Entries are never evicted. A hit requires the file to still exist.
/// The lock is held across synthesis, so concurrent callers asking for the
/// same text synthesize it once.
#[derive(Debug, Default)]
pub struct AudioCache {
    entries: Mutex<HashMap<String, PathBuf>>,
    policy: CacheKeyPolicy,
}

impl AudioCache {
    /// Empty cache with the given key policy
    #[must_use]
    pub fn new(policy: CacheKeyPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Return the cached path for `text`, synthesizing it on a miss
    ///
    /// Only successful synthesis is recorded.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `synthesize`
    pub async fn get_or_create<F, Fut>(&self, text: &str, synthesize: F) -> Result<PathBuf>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        let key = self.policy.key(text);
        let mut entries = self.entries.lock().await;

        if let Some(path) = entries.get(&key) {
            if path.exists() {
                tracing::debug!(path = %path.display(), "audio cache hit");
                return Ok(path.clone());
            }
            tracing::debug!(path = %path.display(), "cached audio missing on disk, dropping entry");
            entries.remove(&key);
        }

        let path = synthesize(text.to_string()).await?;
        entries.insert(key, path.clone());
        Ok(path)
    }

    /// Seed an entry without synthesizing
    pub async fn preload(&self, text: &str, path: PathBuf) {
        let key = self.policy.key(text);
        self.entries.lock().await.insert(key, path);
    }

    /// Number of entries, including ones whose file has since vanished
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache has no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;

    fn write_file(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"mp3").unwrap();
        path
    }

    #[tokio::test]
    async fn test_same_text_synthesizes_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::default();
        let calls = AtomicUsize::new(0);

        let synth = |_text: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            let path = write_file(dir.path(), "a.mp3");
            async move { Ok(path) }
        };

        let first = cache.get_or_create("Welcome, seeker", synth).await.unwrap();
        let second = cache.get_or_create("Welcome, seeker", synth).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_synthesis_is_not_cached() {
        let cache = AudioCache::default();

        let result = cache
            .get_or_create("hello", |_| async { Err(Error::Generation("down".into())) })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_deleted_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::default();
        let stale = dir.path().join("gone.mp3");
        cache.preload("hello", stale.clone()).await;

        let fresh = write_file(dir.path(), "fresh.mp3");
        let expected = fresh.clone();
        let path = cache
            .get_or_create("hello", |_| async move { Ok(fresh) })
            .await
            .unwrap();

        assert_eq!(path, expected);
        assert_ne!(path, stale);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_key_policies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "x.mp3");

        let exact = AudioCache::new(CacheKeyPolicy::Exact);
        exact.preload("hello", path.clone()).await;
        let miss = exact
            .get_or_create("hello ", |_| async { Err(Error::Generation("miss".into())) })
            .await;
        assert!(miss.is_err());

        let trimmed = AudioCache::new(CacheKeyPolicy::Trimmed);
        trimmed.preload("hello", path.clone()).await;
        let hit = trimmed
            .get_or_create("  hello ", |_| async { Err(Error::Generation("miss".into())) })
            .await
            .unwrap();
        assert_eq!(hit, path);
    }
}
