// Repository trait for telemetry data access
use crate::domain::telemetry::TelemetrySample;
use async_trait::async_trait;

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Fetch every telemetry sample recorded for a battery, in API order
    async fn fetch_samples(&self, imei: &str) -> anyhow::Result<Vec<TelemetrySample>>;
}
