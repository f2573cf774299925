//! Lookup Orchestrator
//!
//! Answers a statistics request from the fastest source that has the
//! record: TTL cache, then durable store, then the upstream provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{normalize_key, TtlCache};
use crate::error::{AppError, Result};
use crate::live::{Partition, SubscriberRegistry};
use crate::models::{College, CollegeSummary, CountryEntry, LiveEvent};
use crate::services::Reconciler;
use crate::store::{CollegeFilter, CollegeStore};
use crate::upstream::{fetch_with_deadline, SharedProvider};

/// Where a served record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Store,
    Upstream,
}

type Gates = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive claim on the miss path of one normalized subject. The map
/// entry is dropped with the last holder.
struct SubjectGate<'a> {
    gates: &'a Gates,
    key: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> SubjectGate<'a> {
    fn new(gates: &'a Gates, key: String) -> Self {
        let gate = gates.lock().entry(key.clone()).or_default().clone();
        Self { gates, key, gate }
    }
}

impl Drop for SubjectGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        let idle = gates
            .get(&self.key)
            .is_some_and(|held| Arc::ptr_eq(held, &self.gate) && Arc::strong_count(held) == 2);
        if idle {
            gates.remove(&self.key);
        }
    }
}

// == Lookup Service ==
pub struct LookupService {
    cache: Arc<TtlCache>,
    store: Arc<dyn CollegeStore>,
    provider: SharedProvider,
    registry: Arc<SubscriberRegistry>,
    reconciler: Arc<Reconciler>,
    upstream_timeout: Duration,
    /// Subjects currently being fetched from upstream
    inflight: Gates,
}

impl LookupService {
    pub fn new(
        cache: Arc<TtlCache>,
        store: Arc<dyn CollegeStore>,
        provider: SharedProvider,
        registry: Arc<SubscriberRegistry>,
        reconciler: Arc<Reconciler>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            provider,
            registry,
            reconciler,
            upstream_timeout,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    // == Get Statistics ==
    /// Returns the record for `name`.
    ///
    /// Cached and stored records are returned at once and revalidated in the
    /// background. Only a full miss waits on the upstream provider.
    pub async fn get_statistics(&self, name: &str) -> Result<College> {
        self.resolve(name).await.map(|(college, _)| college)
    }

    /// Like [`LookupService::get_statistics`], also reporting the source.
    pub async fn resolve(&self, name: &str) -> Result<(College, Source)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "college_name is required".to_string(),
            ));
        }

        if let Some(college) = self.cache.get(name).await {
            debug!(subject = %name, "Served from cache");
            self.reconciler.spawn(name, college.clone());
            return Ok((college, Source::Cache));
        }

        if let Some(college) = self.store.find_one(&CollegeFilter::name(name)).await? {
            debug!(subject = %name, "Served from store");
            self.cache.insert(name, college.clone()).await;
            self.reconciler.spawn(name, college.clone());
            return Ok((college, Source::Store));
        }

        self.fetch_new(name).await
    }

    /// Miss path. Concurrent misses for the same subject queue on one gate;
    /// whoever runs second finds the record already stored.
    async fn fetch_new(&self, name: &str) -> Result<(College, Source)> {
        let claim = SubjectGate::new(&self.inflight, normalize_key(name));
        let _held = claim.gate.lock().await;

        if let Some(college) = self.store.find_one(&CollegeFilter::name(name)).await? {
            debug!(subject = %name, "Fetched by a concurrent lookup");
            return Ok((college, Source::Store));
        }

        let college = fetch_with_deadline(self.provider.as_ref(), name, self.upstream_timeout).await?;
        self.store.insert_one(college.clone()).await?;
        info!(subject = %name, country = %college.country, "Stored new college");

        self.announce_new(&college).await;
        Ok((college, Source::Upstream))
    }

    /// Pushes a freshly inserted record to its country partition and the
    /// countries feed.
    async fn announce_new(&self, college: &College) {
        self.registry
            .broadcast_with(&Partition::country(&college.country), || {
                LiveEvent::new_college(college)
            })
            .await;

        if self.registry.subscriber_count(&Partition::Countries).await == 0 {
            return;
        }
        match self.store.distinct_countries().await {
            Ok(names) => {
                self.registry
                    .broadcast(
                        &Partition::Countries,
                        LiveEvent::countries_update(CountryEntry::numbered(names)),
                    )
                    .await;
            }
            Err(e) => warn!(error = %e, "Countries feed refresh failed"),
        }
    }

    // == Listings ==
    /// Case-insensitive name search. No match is `NotFound`.
    pub async fn search(&self, term: &str) -> Result<Vec<College>> {
        let colleges = self
            .store
            .find_many(&CollegeFilter::name_contains(term))
            .await?;
        if colleges.is_empty() {
            return Err(AppError::NotFound(format!(
                "No colleges matching '{}'",
                term.trim()
            )));
        }
        Ok(colleges)
    }

    pub async fn all_colleges(&self) -> Result<Vec<College>> {
        Ok(self.store.find_many(&CollegeFilter::All).await?)
    }

    /// Summaries of every stored college in `country`. Each summary carries
    /// the country as the caller spelled it (trimmed), not the stored one.
    pub async fn colleges_by_country(&self, country: &str) -> Result<Vec<CollegeSummary>> {
        let country = country.trim();
        let colleges = self
            .store
            .find_many(&CollegeFilter::country(country))
            .await?;
        Ok(colleges
            .iter()
            .map(|college| CollegeSummary::for_country(college, country))
            .collect())
    }

    /// Countries known to the store, or a fixed default list when the store
    /// has none or cannot be read.
    pub async fn countries(&self) -> Vec<CountryEntry> {
        match self.store.distinct_countries().await {
            Ok(names) => {
                let entries = CountryEntry::numbered(names);
                if entries.is_empty() {
                    CountryEntry::defaults()
                } else {
                    entries
                }
            }
            Err(e) => {
                warn!(error = %e, "Falling back to default countries");
                CountryEntry::defaults()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, UpstreamError, UpstreamErrorKind};
    use crate::live::Subscriber;
    use crate::models::StatisticItem;
    use crate::store::{MemoryStore, StoreResult};
    use crate::upstream::CollegeProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct CountingProvider {
        answer: std::result::Result<College, UpstreamErrorKind>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(answer: std::result::Result<College, UpstreamErrorKind>) -> Arc<Self> {
            Self::slow(answer, Duration::ZERO)
        }

        fn slow(answer: std::result::Result<College, UpstreamErrorKind>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answer,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CollegeProvider for CountingProvider {
        async fn fetch(&self, _name: &str) -> std::result::Result<College, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer
                .clone()
                .map_err(|kind| UpstreamError::new(kind, "stub"))
        }
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl CollegeStore for BrokenStore {
        async fn find_one(&self, _: &CollegeFilter) -> StoreResult<Option<College>> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn find_many(&self, _: &CollegeFilter) -> StoreResult<Vec<College>> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn insert_one(&self, _: College) -> StoreResult<()> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn update_one(&self, _: &CollegeFilter, _: College) -> StoreResult<bool> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn distinct_countries(&self) -> StoreResult<Vec<String>> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    struct Fixture {
        lookup: LookupService,
        cache: Arc<TtlCache>,
        registry: Arc<SubscriberRegistry>,
    }

    fn fixture(store: Arc<dyn CollegeStore>, provider: Arc<CountingProvider>) -> Fixture {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(3600)));
        let registry = Arc::new(SubscriberRegistry::new());
        let reconciler = Arc::new(Reconciler::new(
            provider.clone(),
            store.clone(),
            cache.clone(),
            registry.clone(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        ));
        let lookup = LookupService::new(
            cache.clone(),
            store,
            provider,
            registry.clone(),
            reconciler,
            Duration::from_secs(30),
        );
        Fixture {
            lookup,
            cache,
            registry,
        }
    }

    fn alpha() -> College {
        College::named("Alpha U", "India")
            .with_statistics(vec![StatisticItem::new("Total", 500)])
    }

    async fn subscribe(registry: &SubscriberRegistry, partition: Partition) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(8);
        registry
            .register(partition, Subscriber::new(tx, CancellationToken::new()))
            .await;
        rx
    }

    #[tokio::test]
    async fn test_blank_name_is_invalid() {
        let f = fixture(Arc::new(MemoryStore::new()), CountingProvider::new(Ok(alpha())));
        let err = f.lookup.get_statistics("   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_miss_fetches_stores_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let provider = CountingProvider::new(Ok(alpha()));
        let f = fixture(store.clone(), provider.clone());
        let mut india = subscribe(&f.registry, Partition::country("India")).await;
        let mut feed = subscribe(&f.registry, Partition::Countries).await;

        let (college, source) = f.lookup.resolve("Alpha U").await.unwrap();

        assert_eq!(source, Source::Upstream);
        assert_eq!(college, alpha());
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            store.find_one(&CollegeFilter::name("alpha u")).await.unwrap(),
            Some(alpha())
        );
        assert!(f.cache.is_empty().await);

        assert!(india.try_recv().unwrap().contains("\"new_college\""));
        assert!(india.try_recv().is_err());
        assert!(feed.try_recv().unwrap().contains("\"countries_update\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_fetch_once() {
        let store = Arc::new(MemoryStore::new());
        let provider = CountingProvider::slow(Ok(alpha()), Duration::from_millis(50));
        let f = fixture(store.clone(), provider.clone());
        let mut india = subscribe(&f.registry, Partition::country("India")).await;

        let (first, second) = tokio::join!(
            f.lookup.get_statistics("Alpha U"),
            f.lookup.get_statistics("alpha u"),
        );

        assert_eq!(first.unwrap(), alpha());
        assert_eq!(second.unwrap(), alpha());
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.find_many(&CollegeFilter::All).await.unwrap().len(), 1);
        assert_eq!(store.writes(), 1);

        assert!(india.try_recv().unwrap().contains("\"new_college\""));
        assert!(india.try_recv().is_err());
        assert!(f.lookup.inflight.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_after_upstream_failure() {
        let store = Arc::new(MemoryStore::new());
        let provider = CountingProvider::slow(
            Err(UpstreamErrorKind::Unreachable),
            Duration::from_millis(50),
        );
        let f = fixture(store.clone(), provider.clone());

        let (first, second) = tokio::join!(
            f.lookup.get_statistics("Alpha U"),
            f.lookup.get_statistics("Alpha U"),
        );

        // Failures are not shared; each caller tries once and nothing is stored
        assert!(matches!(first, Err(AppError::Upstream(_))));
        assert!(matches!(second, Err(AppError::Upstream(_))));
        assert_eq!(store.writes(), 0);
        assert!(f.lookup.inflight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_store_hit_populates_cache() {
        let store = Arc::new(MemoryStore::with_colleges(vec![alpha()]));
        let provider = CountingProvider::new(Ok(alpha()));
        let f = fixture(store, provider);

        let (_, source) = f.lookup.resolve("ALPHA U").await.unwrap();
        assert_eq!(source, Source::Store);
        assert_eq!(f.cache.get("alpha u").await, Some(alpha()));

        let (_, source) = f.lookup.resolve("Alpha U").await.unwrap();
        assert_eq!(source, Source::Cache);
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let provider = CountingProvider::new(Err(UpstreamErrorKind::RateLimited));
        let f = fixture(store.clone(), provider);
        let mut india = subscribe(&f.registry, Partition::country("India")).await;

        let err = f.lookup.get_statistics("Alpha U").await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Upstream(UpstreamError {
                kind: UpstreamErrorKind::RateLimited,
                ..
            })
        ));
        assert_eq!(store.writes(), 0);
        assert!(f.cache.is_empty().await);
        assert!(india.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let provider = CountingProvider::new(Ok(alpha()));
        let f = fixture(Arc::new(BrokenStore), provider.clone());

        let err = f.lookup.get_statistics("Alpha U").await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_countries_fall_back_to_defaults() {
        let provider = CountingProvider::new(Ok(alpha()));
        let broken = fixture(Arc::new(BrokenStore), provider.clone());
        assert_eq!(broken.lookup.countries().await, CountryEntry::defaults());

        let empty = fixture(Arc::new(MemoryStore::new()), provider);
        assert_eq!(empty.lookup.countries().await.len(), 5);
    }

    #[tokio::test]
    async fn test_search_and_listings() {
        let store = Arc::new(MemoryStore::with_colleges(vec![
            College::named("IIT Bombay", "India"),
            College::named("IIT Delhi", "India"),
            College::named("MIT", "United States"),
        ]));
        let f = fixture(store, CountingProvider::new(Ok(alpha())));

        assert_eq!(f.lookup.search("iit").await.unwrap().len(), 2);
        assert!(matches!(
            f.lookup.search("oxford").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(f.lookup.all_colleges().await.unwrap().len(), 3);

        let india = f.lookup.colleges_by_country(" india ").await.unwrap();
        assert_eq!(india.len(), 2);
        assert_eq!(india[0].country, "india");
    }
}
