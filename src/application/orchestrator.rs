//! Fetch orchestrator
//!
//! Drives one polling cycle end to end: fan out every vendor's `fetch_many`
//! concurrently, assemble the new snapshot with stale retention for
//! failures, diff against the previous snapshot, hand change events to the
//! sink and swap the snapshot. The outer loop is crash-resistant: a cycle
//! failure is logged and the loop sleeps and retries, it never exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::notifier::{deliver_chunked, ChangeSink};
use crate::domain::diff::diff_snapshots;
use crate::domain::item::ItemRecord;
use crate::domain::snapshot::{AddUrlError, Snapshot, MAX_URLS_PER_VENDOR};
use crate::domain::vendor::{VendorAdapter, VendorRegistry};
use crate::infrastructure::url_store::UrlStore;

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub items: usize,
    pub events: usize,
}

/// Result of trying to track a new URL.
#[derive(Debug)]
pub enum TrackOutcome {
    Added {
        vendor: &'static str,
        url: String,
        record: ItemRecord,
    },
    /// No registered vendor recognizes the input.
    Unsupported,
    Duplicate {
        vendor: &'static str,
        url: String,
    },
    CapacityReached {
        vendor: &'static str,
    },
    FetchFailed {
        vendor: &'static str,
        url: String,
        reason: String,
    },
}

pub struct Orchestrator {
    registry: VendorRegistry,
    store: RwLock<UrlStore>,
    sink: Arc<dyn ChangeSink>,
    snapshot: RwLock<Snapshot>,
    interval: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: VendorRegistry,
        store: UrlStore,
        sink: Arc<dyn ChangeSink>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            store: RwLock::new(store),
            sink,
            snapshot: RwLock::new(Snapshot::new()),
            interval,
        }
    }

    /// The last-completed snapshot. Concurrent readers always see a fully
    /// assembled snapshot, never in-progress fetch results.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Run polling cycles until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            tracked = self.store.read().await.tracked().total(),
            "polling loop starting"
        );

        loop {
            match self.run_cycle().await {
                Ok(stats) => {
                    debug!(items = stats.items, events = stats.events, "cycle complete");
                }
                Err(error) => {
                    error!(error = ?error, "polling cycle failed");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("polling loop stopping");
                    break;
                }
                _ = sleep(self.interval) => {}
            }
        }
    }

    /// Execute one polling cycle: fetch, assemble, diff, deliver, swap.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let tracked = self.store.read().await.tracked().clone();
        let old = self.snapshot.read().await.clone();

        // Vendor-level fan-out; each adapter handles URL-level concurrency
        // itself under its own session.
        let tracked_ref = &tracked;
        let results = join_all(self.registry.iter().map(|adapter| async move {
            let meta = adapter.meta();
            let urls = tracked_ref.urls(meta.id);
            if urls.is_empty() {
                return (meta.id, Ok(HashMap::new()));
            }
            (meta.id, adapter.fetch_many(urls).await)
        }))
        .await;

        let mut new = Snapshot::new();
        for (vendor, result) in results {
            let mut items = match result {
                Ok(items) => items,
                Err(error) => {
                    // Stale retention: a vendor outage must not blank out
                    // its sub-mapping and fake "item removed" diffs.
                    warn!(vendor, %error, "vendor fetch failed; retaining last known data");
                    old.vendor(vendor).cloned().unwrap_or_default()
                }
            };

            // A URL that failed individually keeps its last known record
            // so a transient miss does not read as removal-then-adoption.
            for url in tracked.urls(vendor) {
                if !items.contains_key(url) {
                    if let Some(previous) = old.get(vendor, url) {
                        items.insert(url.clone(), previous.clone());
                    }
                }
            }

            new.insert_vendor(vendor, items);
        }

        let events = diff_snapshots(
            &old,
            &new,
            &tracked,
            self.registry.iter().map(|adapter| adapter.meta()),
        );

        if !events.is_empty() {
            info!(count = events.len(), "item changes detected");
            deliver_chunked(self.sink.as_ref(), &events).await?;
        }

        let stats = CycleStats {
            items: new.len(),
            events: events.len(),
        };
        *self.snapshot.write().await = new;
        Ok(stats)
    }

    /// Track a new product from pasted URL/share text.
    ///
    /// On success the fetched record is adopted into the current snapshot
    /// so the next cycle diffs against it instead of treating the URL as
    /// newly added again.
    pub async fn track(&self, input: &str) -> Result<TrackOutcome> {
        let Some((adapter, url)) = self.match_adapter(input).await else {
            return Ok(TrackOutcome::Unsupported);
        };
        let vendor = adapter.meta().id;

        {
            let store = self.store.read().await;
            if store.tracked().contains(vendor, &url) {
                return Ok(TrackOutcome::Duplicate { vendor, url });
            }
            if store.tracked().count(vendor) >= MAX_URLS_PER_VENDOR {
                return Ok(TrackOutcome::CapacityReached { vendor });
            }
        }

        // Validate the URL actually parses before persisting it.
        let record = match adapter.fetch_one(&url).await {
            Ok(record) => record,
            Err(error) => {
                warn!(vendor, url = %url, %error, "fetch for newly tracked URL failed");
                return Ok(TrackOutcome::FetchFailed {
                    vendor,
                    url,
                    reason: error.to_string(),
                });
            }
        };

        match self.store.write().await.add(vendor, url.clone()).await? {
            Ok(()) => {}
            Err(AddUrlError::Duplicate) => {
                return Ok(TrackOutcome::Duplicate { vendor, url });
            }
            Err(AddUrlError::CapacityReached) => {
                return Ok(TrackOutcome::CapacityReached { vendor });
            }
        }

        self.snapshot
            .write()
            .await
            .insert(vendor, url.clone(), record.clone());

        info!(vendor, url = %url, "tracking new URL");
        Ok(TrackOutcome::Added {
            vendor,
            url,
            record,
        })
    }

    /// Stop tracking a URL. Returns whether it was tracked.
    pub async fn untrack(&self, vendor: &str, url: &str) -> Result<bool> {
        let removed = self.store.write().await.remove(vendor, url).await?;
        if removed {
            self.snapshot.write().await.remove(vendor, url);
            info!(vendor, url, "stopped tracking URL");
        }
        Ok(removed)
    }

    async fn match_adapter(&self, input: &str) -> Option<(&Arc<dyn VendorAdapter>, String)> {
        for adapter in &self.registry {
            if let Some(url) = adapter.standardize(input).await {
                return Some((adapter, url));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff::ChangeEvent;
    use crate::domain::item::{AttrKind, AttrSpec, AttrValue};
    use crate::domain::vendor::{ScrapeError, VendorMeta};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    static SCHEMA: &[AttrSpec] = &[
        AttrSpec::new("name", "상품명", AttrKind::Text),
        AttrSpec::with_unit("price", "가격", AttrKind::Int, "원"),
    ];

    static MOCK_META: VendorMeta = VendorMeta {
        id: "mockshop",
        label: "모의상점",
        schema: SCHEMA,
    };

    fn record(price: i64) -> ItemRecord {
        let mut r = ItemRecord::new(SCHEMA);
        r.set("name", "물건").unwrap();
        r.set("price", price).unwrap();
        r
    }

    type BatchResult = Result<HashMap<String, ItemRecord>, ScrapeError>;

    struct MockVendor {
        batches: Mutex<VecDeque<BatchResult>>,
        single: Option<ItemRecord>,
    }

    impl MockVendor {
        fn with_batches(batches: Vec<BatchResult>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                single: None,
            }
        }
    }

    #[async_trait]
    impl VendorAdapter for MockVendor {
        fn meta(&self) -> &VendorMeta {
            &MOCK_META
        }

        async fn standardize(&self, input: &str) -> Option<String> {
            input
                .starts_with("https://mockshop.example/")
                .then(|| input.split('?').next().unwrap_or(input).to_string())
        }

        async fn fetch_one(&self, url: &str) -> Result<ItemRecord, ScrapeError> {
            self.single
                .clone()
                .ok_or_else(|| ScrapeError::parse(url, "name"))
        }

        async fn fetch_many(&self, _urls: &[String]) -> BatchResult {
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HashMap::new()))
        }
    }

    struct RecordingSink {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChangeSink for RecordingSink {
        async fn deliver(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
            self.events.lock().unwrap().extend_from_slice(events);
            Ok(())
        }
    }

    fn batch(pairs: &[(&str, i64)]) -> BatchResult {
        Ok(pairs
            .iter()
            .map(|(url, price)| (url.to_string(), record(*price)))
            .collect())
    }

    async fn orchestrator_with(
        dir: &tempfile::TempDir,
        vendor: MockVendor,
        sink: Arc<RecordingSink>,
        urls: &[&str],
    ) -> Orchestrator {
        let mut store = UrlStore::load(&dir.path().join("url.json")).await.unwrap();
        store.ensure_vendor(MOCK_META.id);
        for url in urls {
            store
                .add(MOCK_META.id, url.to_string())
                .await
                .unwrap()
                .unwrap();
        }

        Orchestrator::new(
            vec![Arc::new(vendor)],
            store,
            sink,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn price_change_is_detected_across_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let vendor = MockVendor::with_batches(vec![
            batch(&[("u1", 10000)]),
            batch(&[("u1", 9000)]),
        ]);
        let orchestrator = orchestrator_with(&dir, vendor, sink.clone(), &["u1"]).await;

        // First cycle populates the snapshot; nothing to diff against.
        orchestrator.run_cycle().await.unwrap();
        assert!(sink.events.lock().unwrap().is_empty());

        let stats = orchestrator.run_cycle().await.unwrap();
        assert_eq!(stats.events, 1);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, "u1");
        let price = events[0].fields.iter().find(|f| f.key == "price").unwrap();
        assert!(price.changed);
        assert_eq!(price.before, Some(AttrValue::Int(10000)));
        assert_eq!(price.after, Some(AttrValue::Int(9000)));
    }

    #[tokio::test]
    async fn vendor_outage_retains_stale_data() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let vendor = MockVendor::with_batches(vec![
            batch(&[("u1", 10000)]),
            Err(ScrapeError::Status {
                status: 503,
                url: "u1".to_string(),
            }),
        ]);
        let orchestrator = orchestrator_with(&dir, vendor, sink.clone(), &["u1"]).await;

        orchestrator.run_cycle().await.unwrap();
        let stats = orchestrator.run_cycle().await.unwrap();

        // No removal event, and the record survives for the next diff.
        assert_eq!(stats.events, 0);
        let snapshot = orchestrator.snapshot().await;
        assert_eq!(
            snapshot.get(MOCK_META.id, "u1").unwrap().get("price").unwrap(),
            &AttrValue::Int(10000)
        );
    }

    #[tokio::test]
    async fn single_url_failure_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let vendor = MockVendor::with_batches(vec![
            batch(&[("u1", 100), ("u2", 200)]),
            // u2 failed to fetch this cycle and is absent from the batch.
            batch(&[("u1", 150)]),
        ]);
        let orchestrator = orchestrator_with(&dir, vendor, sink.clone(), &["u1", "u2"]).await;

        orchestrator.run_cycle().await.unwrap();
        let stats = orchestrator.run_cycle().await.unwrap();

        // Only u1 changed; u2 kept its last known record silently.
        assert_eq!(stats.events, 1);
        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].url, "u1");

        let snapshot = orchestrator.snapshot().await;
        assert_eq!(
            snapshot.get(MOCK_META.id, "u2").unwrap().get("price").unwrap(),
            &AttrValue::Int(200)
        );
    }

    #[tokio::test]
    async fn mid_cycle_addition_is_silently_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let vendor = MockVendor::with_batches(vec![
            batch(&[("u1", 100)]),
            batch(&[("u1", 100), ("u2", 200)]),
        ]);
        let orchestrator = orchestrator_with(&dir, vendor, sink.clone(), &["u1"]).await;

        orchestrator.run_cycle().await.unwrap();

        // u2 added between cycles by the add flow.
        orchestrator
            .store
            .write()
            .await
            .add(MOCK_META.id, "u2".to_string())
            .await
            .unwrap()
            .unwrap();

        let stats = orchestrator.run_cycle().await.unwrap();
        assert_eq!(stats.events, 0);
        assert!(orchestrator.snapshot().await.get(MOCK_META.id, "u2").is_some());
    }

    #[tokio::test]
    async fn track_rejects_unsupported_and_duplicate_input() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let mut vendor = MockVendor::with_batches(Vec::new());
        vendor.single = Some(record(100));
        let orchestrator = orchestrator_with(&dir, vendor, sink, &[]).await;

        assert!(matches!(
            orchestrator.track("https://other.example/item").await.unwrap(),
            TrackOutcome::Unsupported
        ));

        let outcome = orchestrator
            .track("https://mockshop.example/item/1?ref=share")
            .await
            .unwrap();
        match outcome {
            TrackOutcome::Added { url, .. } => {
                assert_eq!(url, "https://mockshop.example/item/1");
            }
            other => panic!("expected Added, got {other:?}"),
        }

        // Adopted into the snapshot right away.
        assert!(orchestrator
            .snapshot()
            .await
            .get(MOCK_META.id, "https://mockshop.example/item/1")
            .is_some());

        assert!(matches!(
            orchestrator
                .track("https://mockshop.example/item/1")
                .await
                .unwrap(),
            TrackOutcome::Duplicate { .. }
        ));
    }

    #[tokio::test]
    async fn untrack_removes_from_store_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let vendor = MockVendor::with_batches(vec![batch(&[("u1", 100)])]);
        let orchestrator = orchestrator_with(&dir, vendor, sink, &["u1"]).await;

        orchestrator.run_cycle().await.unwrap();
        assert!(orchestrator.untrack(MOCK_META.id, "u1").await.unwrap());
        assert!(!orchestrator.untrack(MOCK_META.id, "u1").await.unwrap());
        assert!(orchestrator.snapshot().await.get(MOCK_META.id, "u1").is_none());
    }
}
