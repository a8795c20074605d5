// Per-battery dataset cache; a fetch replaces the whole entry
use crate::domain::aggregates::DatasetAggregates;
use crate::domain::telemetry::TelemetryDataset;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A fetched dataset with its trends, computed once per fetch.
#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub dataset: TelemetryDataset,
    pub aggregates: Arc<DatasetAggregates>,
}

pub struct DatasetCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedDataset>>,
}

impl DatasetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached entry for `imei`, unless it is older than the TTL at `now`.
    pub async fn get_fresh(&self, imei: &str, now: DateTime<Utc>) -> Option<CachedDataset> {
        let entries = self.entries.read().await;
        entries
            .get(imei)
            .filter(|entry| now - entry.dataset.fetched_at < self.ttl)
            .cloned()
    }

    pub async fn store(&self, entry: CachedDataset) {
        let mut entries = self.entries.write().await;
        entries.insert(entry.dataset.imei.clone(), entry);
    }
}
