// Analytics service - Loads a battery's telemetry and computes cycle analytics
use crate::application::battery_service::BatteryService;
use crate::application::dataset_cache::{CachedDataset, DatasetCache};
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::aggregates::{DatasetAggregates, compute_dataset_aggregates};
use crate::domain::metrics::{CycleMetrics, compute_cycle_metrics};
use crate::domain::options::AnalyticsOptions;
use crate::domain::telemetry::{CycleId, TelemetryDataset};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("battery {0} is not authorized")]
    UnknownBattery(String),
    #[error("no telemetry available for battery {0}")]
    NoData(String),
    #[error("failed to load telemetry for battery {imei}: {cause:#}")]
    Fetch { imei: String, cause: anyhow::Error },
}

/// Metrics for the selected cycle together with the whole-dataset trends.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub imei: String,
    pub metrics: CycleMetrics,
    pub aggregates: Arc<DatasetAggregates>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    repository: Arc<dyn TelemetryRepository>,
    batteries: BatteryService,
    cache: Arc<DatasetCache>,
    defaults: AnalyticsOptions,
}

impl AnalyticsService {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        batteries: BatteryService,
        cache: Arc<DatasetCache>,
        defaults: AnalyticsOptions,
    ) -> Self {
        Self {
            repository,
            batteries,
            cache,
            defaults,
        }
    }

    pub fn defaults(&self) -> AnalyticsOptions {
        self.defaults
    }

    /// The session dataset for a battery, fetched when absent or stale.
    pub async fn dataset(&self, imei: &str) -> Result<CachedDataset, AnalyticsError> {
        self.ensure_authorized(imei)?;

        if let Some(cached) = self.cache.get_fresh(imei, Utc::now()).await {
            tracing::debug!(
                "Using cached telemetry for {} ({} samples)",
                imei,
                cached.dataset.samples.len()
            );
            return Ok(cached);
        }

        self.fetch(imei).await
    }

    /// Fetch again; the cached dataset is only replaced once the fetch succeeds.
    pub async fn refresh(&self, imei: &str) -> Result<TelemetryDataset, AnalyticsError> {
        self.ensure_authorized(imei)?;
        Ok(self.fetch(imei).await?.dataset)
    }

    pub async fn list_cycles(&self, imei: &str) -> Result<Vec<CycleId>, AnalyticsError> {
        let cached = self.non_empty_dataset(imei).await?;
        Ok(cached.dataset.cycle_ids())
    }

    pub async fn cycle_report(
        &self,
        imei: &str,
        cycle_id: CycleId,
        options: &AnalyticsOptions,
    ) -> Result<CycleReport, AnalyticsError> {
        let cached = self.non_empty_dataset(imei).await?;
        Ok(self.build_report(&cached, cycle_id, options))
    }

    /// Report for the highest cycle number, the dashboard's initial selection.
    pub async fn latest_cycle_report(
        &self,
        imei: &str,
        options: &AnalyticsOptions,
    ) -> Result<CycleReport, AnalyticsError> {
        let cached = self.non_empty_dataset(imei).await?;
        let cycle_id = cached
            .dataset
            .latest_cycle_id()
            .ok_or_else(|| AnalyticsError::NoData(imei.to_string()))?;
        Ok(self.build_report(&cached, cycle_id, options))
    }

    pub async fn trends(
        &self,
        imei: &str,
        options: &AnalyticsOptions,
    ) -> Result<Arc<DatasetAggregates>, AnalyticsError> {
        let cached = self.non_empty_dataset(imei).await?;
        Ok(self.aggregates(&cached, options))
    }

    fn build_report(
        &self,
        cached: &CachedDataset,
        cycle_id: CycleId,
        options: &AnalyticsOptions,
    ) -> CycleReport {
        let dataset = &cached.dataset;
        let metrics = compute_cycle_metrics(dataset.cycle_samples(cycle_id), cycle_id, options);
        if !metrics.has_data {
            tracing::debug!("Cycle {} has no samples for {}", cycle_id, dataset.imei);
        }
        CycleReport {
            imei: dataset.imei.clone(),
            metrics,
            aggregates: self.aggregates(cached, options),
        }
    }

    /// Trends for the configured defaults are computed once per fetch.
    fn aggregates(
        &self,
        cached: &CachedDataset,
        options: &AnalyticsOptions,
    ) -> Arc<DatasetAggregates> {
        if *options == self.defaults {
            cached.aggregates.clone()
        } else {
            Arc::new(compute_dataset_aggregates(&cached.dataset.samples, options))
        }
    }

    fn ensure_authorized(&self, imei: &str) -> Result<(), AnalyticsError> {
        if self.batteries.is_authorized(imei) {
            Ok(())
        } else {
            Err(AnalyticsError::UnknownBattery(imei.to_string()))
        }
    }

    async fn non_empty_dataset(&self, imei: &str) -> Result<CachedDataset, AnalyticsError> {
        let cached = self.dataset(imei).await?;
        if cached.dataset.is_empty() {
            return Err(AnalyticsError::NoData(imei.to_string()));
        }
        Ok(cached)
    }

    async fn fetch(&self, imei: &str) -> Result<CachedDataset, AnalyticsError> {
        let samples = self
            .repository
            .fetch_samples(imei)
            .await
            .map_err(|cause| {
                tracing::error!("Error fetching telemetry for {}: {:#}", imei, cause);
                AnalyticsError::Fetch {
                    imei: imei.to_string(),
                    cause,
                }
            })?;

        tracing::info!("Loaded {} samples for battery {}", samples.len(), imei);
        let dataset = TelemetryDataset::new(imei.to_string(), samples, Utc::now());
        let aggregates = compute_dataset_aggregates(&dataset.samples, &self.defaults);
        let cached = CachedDataset {
            dataset,
            aggregates: Arc::new(aggregates),
        };
        self.cache.store(cached.clone()).await;
        Ok(cached)
    }
}
