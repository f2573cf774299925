//! In-process college store with optional JSON snapshot persistence.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{CollegeFilter, CollegeStore, StoreResult};
use crate::cache::normalize_key;
use crate::models::College;

// == Memory Store ==
/// Vector-backed store. When opened with a snapshot path, the whole
/// collection is rewritten to that file after every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    colleges: RwLock<Vec<College>>,
    snapshot: Option<PathBuf>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `colleges`, without a snapshot file.
    pub fn with_colleges(colleges: Vec<College>) -> Self {
        Self {
            colleges: RwLock::new(colleges),
            ..Self::default()
        }
    }

    /// Opens a store backed by `path`, loading existing records if the file
    /// exists.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let colleges = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<College>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), count = colleges.len(), "Loaded college snapshot");

        Ok(Self {
            colleges: RwLock::new(colleges),
            snapshot: Some(path),
            writes: AtomicU64::new(0),
        })
    }

    /// Number of successful insert/update operations so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn persist(&self, colleges: &[College]) -> StoreResult<()> {
        if let Some(path) = &self.snapshot {
            let bytes = serde_json::to_vec_pretty(colleges)?;
            tokio::fs::write(path, bytes).await?;
            debug!(path = %path.display(), count = colleges.len(), "Wrote college snapshot");
        }
        Ok(())
    }
}

#[async_trait]
impl CollegeStore for MemoryStore {
    async fn find_one(&self, filter: &CollegeFilter) -> StoreResult<Option<College>> {
        let colleges = self.colleges.read().await;
        Ok(colleges.iter().find(|c| filter.matches(c)).cloned())
    }

    async fn find_many(&self, filter: &CollegeFilter) -> StoreResult<Vec<College>> {
        let colleges = self.colleges.read().await;
        Ok(colleges.iter().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn insert_one(&self, college: College) -> StoreResult<()> {
        let mut colleges = self.colleges.write().await;
        colleges.push(college);
        self.persist(&colleges).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_one(&self, filter: &CollegeFilter, college: College) -> StoreResult<bool> {
        let mut colleges = self.colleges.write().await;
        let Some(slot) = colleges.iter_mut().find(|c| filter.matches(c)) else {
            return Ok(false);
        };
        *slot = college;
        self.persist(&colleges).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn distinct_countries(&self) -> StoreResult<Vec<String>> {
        let colleges = self.colleges.read().await;
        let mut seen = Vec::<String>::new();
        let mut countries = Vec::new();
        for college in colleges.iter() {
            let key = normalize_key(&college.country);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            countries.push(college.country.trim().to_string());
        }
        Ok(countries)
    }
}
