//! Reconciliation Engine
//!
//! Background revalidation of records that were just served from the cache
//! or the store. The caller never waits on it; a changed record is written
//! back and pushed to the subject's country partition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{normalize_key, TtlCache};
use crate::live::{Partition, SubscriberRegistry};
use crate::models::{College, LiveEvent};
use crate::store::{CollegeFilter, CollegeStore};
use crate::upstream::{fetch_with_deadline, SharedProvider};

/// How a single reconciliation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Upstream agrees with what was served; nothing written
    Unchanged,
    /// Statistics differed; store, cache and subscribers were updated
    Updated,
    /// Upstream agreed the record changed but no stored record matched
    NotStored,
    /// Upstream or the store failed; logged and dropped
    Failed,
    /// Shut down before finishing
    Cancelled,
}

// == Reconciler ==
pub struct Reconciler {
    provider: SharedProvider,
    store: Arc<dyn CollegeStore>,
    cache: Arc<TtlCache>,
    registry: Arc<SubscriberRegistry>,
    upstream_timeout: Duration,
    /// Minimum gap between two jobs for the same subject
    cooldown: Duration,
    /// Normalized subject to the time its last job started
    recent: Mutex<HashMap<String, Instant>>,
    shutdown: CancellationToken,
}

impl Reconciler {
    pub fn new(
        provider: SharedProvider,
        store: Arc<dyn CollegeStore>,
        cache: Arc<TtlCache>,
        registry: Arc<SubscriberRegistry>,
        upstream_timeout: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            registry,
            upstream_timeout,
            cooldown,
            recent: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Claims the subject for a new job unless one started within the
    /// cooldown window.
    fn try_claim(&self, subject: &str) -> bool {
        if self.cooldown.is_zero() {
            return true;
        }

        let now = Instant::now();
        let mut recent = self.recent.lock();
        recent.retain(|_, started| now.duration_since(*started) < self.cooldown);

        if recent.contains_key(subject) {
            return false;
        }
        recent.insert(subject.to_string(), now);
        true
    }

    // == Spawn ==
    /// Schedules a revalidation of `cached` and returns immediately.
    ///
    /// Returns `None` when a job for the same subject ran recently or the
    /// engine is shutting down.
    pub fn spawn(
        self: &Arc<Self>,
        subject: &str,
        cached: College,
    ) -> Option<JoinHandle<ReconcileOutcome>> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let key = normalize_key(subject);
        if !self.try_claim(&key) {
            debug!(subject = %key, "Reconciliation skipped, ran recently");
            return None;
        }

        let engine = Arc::clone(self);
        let subject = subject.trim().to_string();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = engine.shutdown.cancelled() => {
                    debug!(subject = %subject, "Reconciliation cancelled");
                    ReconcileOutcome::Cancelled
                }
                outcome = engine.reconcile(&subject, &cached) => outcome,
            }
        }))
    }

    // == Reconcile ==
    /// Fetches a fresh record for `subject` and reconciles it against the
    /// record that was served.
    pub async fn reconcile(&self, subject: &str, cached: &College) -> ReconcileOutcome {
        let fresh =
            match fetch_with_deadline(self.provider.as_ref(), subject, self.upstream_timeout).await
            {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(subject = %subject, kind = %e.kind, "Reconciliation fetch failed");
                    return ReconcileOutcome::Failed;
                }
            };

        if !cached.statistics_changed(&fresh) {
            debug!(subject = %subject, "Served record is current");
            return ReconcileOutcome::Unchanged;
        }

        let matched = match self
            .store
            .update_one(&CollegeFilter::name(subject), fresh.clone())
            .await
        {
            Ok(matched) => matched,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Reconciliation write failed");
                return ReconcileOutcome::Failed;
            }
        };
        if !matched {
            warn!(subject = %subject, "No stored record to reconcile");
            return ReconcileOutcome::NotStored;
        }

        self.cache.insert(subject, fresh.clone()).await;

        let delivered = self
            .registry
            .broadcast_with(&Partition::country(&fresh.country), || {
                LiveEvent::college_updated(&fresh)
            })
            .await;

        info!(subject = %subject, delivered, "Reconciled stale record");
        ReconcileOutcome::Updated
    }

    /// Cancels every running job and refuses new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UpstreamError, UpstreamErrorKind};
    use crate::live::Subscriber;
    use crate::models::StatisticItem;
    use crate::store::MemoryStore;
    use crate::upstream::CollegeProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Provider answering with a fixed record after an optional delay.
    struct FixedProvider {
        answer: std::result::Result<College, UpstreamErrorKind>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn ok(college: College) -> Self {
            Self {
                answer: Ok(college),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(kind: UpstreamErrorKind) -> Self {
            Self {
                answer: Err(kind),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CollegeProvider for FixedProvider {
        async fn fetch(&self, _name: &str) -> Result<College, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer
                .clone()
                .map_err(|kind| UpstreamError::new(kind, "stub"))
        }
    }

    fn beta(total: i64) -> College {
        College::named("Beta U", "India")
            .with_statistics(vec![StatisticItem::new("Total", total)])
    }

    struct Fixture {
        engine: Arc<Reconciler>,
        provider: Arc<FixedProvider>,
        store: Arc<MemoryStore>,
        cache: Arc<TtlCache>,
        registry: Arc<SubscriberRegistry>,
    }

    fn fixture(provider: FixedProvider, cooldown: Duration) -> Fixture {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryStore::with_colleges(vec![beta(100)]));
        let cache = Arc::new(TtlCache::new(Duration::from_secs(3600)));
        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(Reconciler::new(
            provider.clone(),
            store.clone(),
            cache.clone(),
            registry.clone(),
            Duration::from_secs(30),
            cooldown,
        ));
        Fixture {
            engine,
            provider,
            store,
            cache,
            registry,
        }
    }

    async fn subscribe(registry: &SubscriberRegistry, country: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(8);
        registry
            .register(
                Partition::country(country),
                Subscriber::new(tx, CancellationToken::new()),
            )
            .await;
        rx
    }

    #[tokio::test]
    async fn test_changed_statistics_are_written_once() {
        let f = fixture(FixedProvider::ok(beta(150)), Duration::ZERO);
        let mut india = subscribe(&f.registry, "India").await;
        let writes_before = f.store.writes();

        let outcome = f.engine.reconcile("Beta U", &beta(100)).await;

        assert_eq!(outcome, ReconcileOutcome::Updated);
        assert_eq!(f.store.writes(), writes_before + 1);
        let stored = f
            .store
            .find_one(&CollegeFilter::name("beta u"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, beta(150));
        assert_eq!(f.cache.get("Beta U").await, Some(beta(150)));

        let frame = india.try_recv().unwrap();
        assert!(frame.contains("\"college_updated\""));
        assert!(india.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unchanged_statistics_write_nothing() {
        let f = fixture(FixedProvider::ok(beta(100)), Duration::ZERO);
        let mut india = subscribe(&f.registry, "India").await;
        let writes_before = f.store.writes();

        let outcome = f.engine.reconcile("Beta U", &beta(100)).await;

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(f.store.writes(), writes_before);
        assert!(f.cache.is_empty().await);
        assert!(india.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_float_spelling_of_same_total_writes_nothing() {
        let fresh = College::named("Beta U", "India")
            .with_statistics(vec![StatisticItem::new("Total", serde_json::json!(100.0))]);
        let f = fixture(FixedProvider::ok(fresh), Duration::ZERO);
        let writes_before = f.store.writes();

        let outcome = f.engine.reconcile("Beta U", &beta(100)).await;

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(f.store.writes(), writes_before);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_state_alone() {
        let f = fixture(
            FixedProvider::failing(UpstreamErrorKind::RateLimited),
            Duration::ZERO,
        );
        let writes_before = f.store.writes();

        let outcome = f.engine.reconcile("Beta U", &beta(100)).await;

        assert_eq!(outcome, ReconcileOutcome::Failed);
        assert_eq!(f.store.writes(), writes_before);
    }

    #[tokio::test]
    async fn test_update_without_stored_record() {
        let mut gamma = beta(10);
        gamma.college_name = "Gamma U".to_string();
        let f = fixture(FixedProvider::ok(gamma.clone()), Duration::ZERO);
        let writes_before = f.store.writes();

        let mut served = gamma.clone();
        served.student_statistics.clear();
        let outcome = f.engine.reconcile("Gamma U", &served).await;

        assert_eq!(outcome, ReconcileOutcome::NotStored);
        assert_eq!(f.store.writes(), writes_before);
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_deduplicates_subject() {
        let f = fixture(FixedProvider::ok(beta(100)), Duration::from_secs(60));

        let first = f.engine.spawn("Beta U", beta(100)).expect("first job runs");
        assert!(f.engine.spawn(" beta u ", beta(100)).is_none());
        assert_eq!(first.await.unwrap(), ReconcileOutcome::Unchanged);

        tokio::time::advance(Duration::from_secs(61)).await;
        let again = f.engine.spawn("Beta U", beta(100)).expect("cooldown elapsed");
        again.await.unwrap();

        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_running_job() {
        let mut provider = FixedProvider::ok(beta(150));
        provider.delay = Duration::from_secs(10);
        let f = fixture(provider, Duration::ZERO);

        let job = f.engine.spawn("Beta U", beta(100)).unwrap();
        tokio::task::yield_now().await;
        f.engine.shutdown();

        assert_eq!(job.await.unwrap(), ReconcileOutcome::Cancelled);
        assert!(f.engine.spawn("Beta U", beta(100)).is_none());
        assert_eq!(
            f.store
                .find_one(&CollegeFilter::name("Beta U"))
                .await
                .unwrap(),
            Some(beta(100))
        );
    }
}
