use crate::models::{CatalogEvent, Gender, ProductRecord, Snapshot, SnapshotStats};
use crate::services::cache::{CacheError, CacheKey, Clock, KeyValueStore, SystemClock};
use crate::services::catalog::{AttributeSource, CatalogError, GenderTermResolver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default lifetime of a snapshot
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Errors surfaced by the snapshot cache
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Attribute source unavailable: {0}")]
    SourceUnavailable(#[from] CatalogError),

    #[error("Snapshot store error: {0}")]
    Store(#[from] CacheError),
}

/// Owner of the catalog snapshot
///
/// The published snapshot is an immutable `Arc` swapped in one step, so
/// readers never see a partial rebuild. Rebuilds are serialized; callers that
/// waited on a rebuild in flight get its result instead of starting another.
/// A valid snapshot is looked up in process first, then in the store.
pub struct SnapshotCache {
    source: Arc<dyn AttributeSource>,
    resolver: Arc<dyn GenderTermResolver>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    rebuilds: AtomicU64,
}

impl SnapshotCache {
    pub fn new(
        source: Arc<dyn AttributeSource>,
        resolver: Arc<dyn GenderTermResolver>,
        store: Arc<dyn KeyValueStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            resolver,
            store,
            clock: Arc::new(SystemClock),
            ttl,
            current: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// Replace the clock used for snapshot expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Scrape the catalog into a new snapshot and publish it
    pub async fn rebuild(&self) -> Result<Arc<Snapshot>, SnapshotError> {
        let (snapshot, _) = self.rebuild_unless(|_| false).await?;
        Ok(snapshot)
    }

    /// Current records, in snapshot order, optionally purchasable only
    pub async fn read(&self, exclude_unpurchasable: bool) -> Result<Vec<ProductRecord>, SnapshotError> {
        let snapshot = self.ensure_fresh(None).await?;

        Ok(if exclude_unpurchasable {
            snapshot.purchasable().cloned().collect()
        } else {
            snapshot.records().to_vec()
        })
    }

    /// Return a valid snapshot, rebuilding when none exists or when
    /// `candidate_id` is given and missing from it.
    pub async fn ensure_fresh(&self, candidate_id: Option<i64>) -> Result<Arc<Snapshot>, SnapshotError> {
        let covers = |snapshot: &Snapshot| candidate_id.map_or(true, |id| snapshot.contains(id));

        if let Some(snapshot) = self.current() {
            if covers(&snapshot) {
                return Ok(snapshot);
            }
            tracing::info!(
                "Item {:?} not in snapshot, rebuilding",
                candidate_id
            );
        }

        let (snapshot, _) = self.rebuild_unless(covers).await?;
        Ok(snapshot)
    }

    /// Lazy reaction to a catalog mutation: rebuild only when there is no
    /// valid snapshot. Returns whether this call rebuilt.
    pub async fn invalidate_on_mutation(&self, item_id: i64) -> Result<bool, SnapshotError> {
        if self.current().is_some() {
            tracing::debug!("Item {} changed, snapshot still valid", item_id);
            return Ok(false);
        }

        let (_, rebuilt) = self.rebuild_unless(|_| true).await?;
        if rebuilt {
            tracing::info!("Item {} changed with no valid snapshot, rebuilt", item_id);
        }
        Ok(rebuilt)
    }

    /// Entry point for catalog mutation notifications
    pub async fn handle_event(&self, event: &CatalogEvent) -> Result<bool, SnapshotError> {
        tracing::debug!("Catalog event {:?} for item {}", event.kind, event.item_id);
        self.invalidate_on_mutation(event.item_id).await
    }

    /// Drop the snapshot everywhere so the next read rebuilds
    pub async fn invalidate(&self) -> Result<(), SnapshotError> {
        let _guard = self.rebuild_lock.lock().await;
        *self.current.write() = None;
        self.store.delete(CacheKey::snapshot()).await?;
        tracing::info!("Snapshot invalidated");
        Ok(())
    }

    /// Gender of a raw term id, unisex when absent or unresolvable
    pub async fn resolve_gender(&self, term_id: Option<i64>) -> Gender {
        let Some(term_id) = term_id else {
            return Gender::Unisex;
        };

        match self.resolver.resolve(term_id).await {
            Ok(Some(gender)) => gender,
            Ok(None) => Gender::Unisex,
            Err(e) => {
                tracing::debug!("Gender term {} unresolved ({}), using unisex", term_id, e);
                Gender::Unisex
            }
        }
    }

    /// Last snapshot published in this process, expired or not. It survives
    /// failed rebuilds, so callers can choose to serve stale data.
    pub fn last_published(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Diagnostics for the in-process snapshot
    pub fn stats(&self) -> SnapshotStats {
        let now = self.clock.now();
        let current = self.current.read().clone();

        SnapshotStats {
            items: current.as_ref().map_or(0, |s| s.len()),
            purchasable: current.as_ref().map_or(0, |s| s.purchasable().count()),
            fresh: current.as_ref().is_some_and(|s| s.is_valid_at(now)),
            built_at: current.as_ref().map(|s| s.built_at()),
            expires_at: current.as_ref().map(|s| s.expires_at()),
            rebuilds: self.rebuilds.load(Ordering::Acquire),
        }
    }

    /// The in-process snapshot if it has not expired
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        let now = self.clock.now();
        self.current
            .read()
            .as_ref()
            .filter(|snapshot| snapshot.is_valid_at(now))
            .cloned()
    }

    /// Valid snapshot from process memory or, failing that, the store
    async fn load_valid(&self) -> Option<Arc<Snapshot>> {
        if let Some(snapshot) = self.current() {
            return Some(snapshot);
        }

        let json = match self.store.get(CacheKey::snapshot()).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read snapshot from store, rebuilding: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Snapshot>(&json) {
            Ok(snapshot) if snapshot.is_valid_at(self.clock.now()) => {
                tracing::debug!("Loaded snapshot of {} items from store", snapshot.len());
                let snapshot = Arc::new(snapshot);
                *self.current.write() = Some(snapshot.clone());
                Some(snapshot)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Stored snapshot unreadable, rebuilding: {}", e);
                None
            }
        }
    }

    /// Rebuild under the lock unless a valid snapshot satisfies `accept`.
    ///
    /// The flag is true only when this call did the rebuild.
    async fn rebuild_unless<F>(&self, accept: F) -> Result<(Arc<Snapshot>, bool), SnapshotError>
    where
        F: Fn(&Snapshot) -> bool + Send,
    {
        let observed = self.rebuilds.load(Ordering::Acquire);
        let _guard = self.rebuild_lock.lock().await;

        if let Some(snapshot) = self.load_valid().await {
            if accept(&snapshot) || self.rebuilds.load(Ordering::Acquire) != observed {
                return Ok((snapshot, false));
            }
        }

        let snapshot = self.scrape().await?;
        Ok((snapshot, true))
    }

    /// Full rebuild; callers hold `rebuild_lock`
    async fn scrape(&self) -> Result<Arc<Snapshot>, SnapshotError> {
        let started = Instant::now();

        let raw = self.source.fetch_all().await.map_err(|e| {
            tracing::error!("Snapshot rebuild failed, keeping previous snapshot: {}", e);
            SnapshotError::SourceUnavailable(e)
        })?;

        let mut genders: HashMap<i64, Gender> = HashMap::new();
        let mut records = Vec::with_capacity(raw.len());

        for product in &raw {
            let gender = match product.attributes.gender_option() {
                Some(term_id) => match genders.get(&term_id) {
                    Some(&gender) => gender,
                    None => {
                        let gender = self.resolve_gender(Some(term_id)).await;
                        genders.insert(term_id, gender);
                        gender
                    }
                },
                None => Gender::Unisex,
            };
            records.push(ProductRecord::normalize(product, gender));
        }

        let snapshot = Arc::new(Snapshot::build(records, self.clock.now(), self.ttl));

        match serde_json::to_string(snapshot.as_ref()) {
            Ok(json) => {
                if let Err(e) = self.store.set(CacheKey::snapshot(), json, self.ttl).await {
                    tracing::warn!("Failed to store snapshot, keeping it in process only: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize snapshot: {}", e),
        }

        *self.current.write() = Some(snapshot.clone());
        self.rebuilds.fetch_add(1, Ordering::AcqRel);

        tracing::info!(
            "Snapshot rebuilt: {} items ({} purchasable) in {:?}",
            snapshot.len(),
            snapshot.purchasable().count(),
            started.elapsed()
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawAttributes, RawProduct};
    use crate::services::cache::{ManualClock, MemoryStore};
    use crate::services::catalog::InMemoryCatalog;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    fn product(id: i64, days_ago: i64, gender_term: Option<i64>) -> RawProduct {
        let mut attributes = RawAttributes::new().with(RawAttributes::FRAGRANCE_TYPE, json!(["floral"]));
        if let Some(term) = gender_term {
            attributes = attributes.with(RawAttributes::GENDER, json!({ "options": [term] }));
        }
        RawProduct {
            id,
            attributes,
            created_at: Utc::now() - ChronoDuration::days(days_ago),
            purchasable: Some(id % 2 == 1),
        }
    }

    fn setup() -> (Arc<InMemoryCatalog>, Arc<ManualClock>, SnapshotCache) {
        let catalog = Arc::new(InMemoryCatalog::new(
            vec![product(1, 3, Some(10)), product(2, 1, Some(99)), product(3, 2, None)],
            HashMap::from([(10, Gender::Men)]),
        ));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let cache = SnapshotCache::new(catalog.clone(), catalog.clone(), store, DEFAULT_SNAPSHOT_TTL)
            .with_clock(clock.clone());
        (catalog, clock, cache)
    }

    #[tokio::test]
    async fn test_rebuild_normalizes_and_orders() {
        let (_, _, cache) = setup();
        let snapshot = cache.rebuild().await.unwrap();

        let ids: Vec<i64> = snapshot.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(snapshot.get(1).unwrap().gender, Gender::Men);
        // Unknown term and missing term both fall back
        assert_eq!(snapshot.get(2).unwrap().gender, Gender::Unisex);
        assert_eq!(snapshot.get(3).unwrap().gender, Gender::Unisex);
    }

    #[tokio::test]
    async fn test_read_excludes_unpurchasable() {
        let (_, _, cache) = setup();

        let all = cache.read(false).await.unwrap();
        let purchasable = cache.read(true).await.unwrap();

        assert_eq!(all.len(), 3);
        let ids: Vec<i64> = purchasable.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_expiry_forces_rebuild() {
        let (catalog, clock, cache) = setup();

        cache.ensure_fresh(None).await.unwrap();
        cache.ensure_fresh(None).await.unwrap();
        assert_eq!(catalog.fetch_count(), 1);

        clock.advance(DEFAULT_SNAPSHOT_TTL);
        cache.ensure_fresh(None).await.unwrap();
        assert_eq!(catalog.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_, _, cache) = setup();
        assert!(!cache.stats().fresh);

        cache.rebuild().await.unwrap();
        let stats = cache.stats();
        assert!(stats.fresh);
        assert_eq!(stats.items, 3);
        assert_eq!(stats.purchasable, 2);
        assert_eq!(stats.rebuilds, 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_stays_reachable_after_failed_rebuild() {
        let (catalog, clock, cache) = setup();
        let built = cache.rebuild().await.unwrap();

        catalog.set_unavailable(true);
        clock.advance(DEFAULT_SNAPSHOT_TTL);

        assert!(cache.current().is_none());
        assert!(matches!(cache.read(false).await, Err(SnapshotError::SourceUnavailable(_))));

        let stale = cache.last_published().unwrap();
        assert_eq!(stale.records(), built.records());
        assert!(!stale.is_valid_at(clock.now()));
    }
}
