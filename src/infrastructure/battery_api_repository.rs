// Battery API repository implementation
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::telemetry::TelemetrySample;
use crate::infrastructure::record_mapper::value_to_sample;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BatteryApiRepository {
    client: reqwest::Client,
    base_url: String,
    batch_size: usize,
    /// Upper bound on pages per fetch, in case the API ignores `offset`.
    max_pages: usize,
}

/// Rows stay untyped here; each one is validated on its own.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotPage {
    Rows(Vec<Value>),
    Wrapped {
        #[serde(alias = "data")]
        snapshots: Vec<Value>,
    },
}

impl SnapshotPage {
    fn into_records(self) -> Vec<Value> {
        match self {
            SnapshotPage::Rows(rows) => rows,
            SnapshotPage::Wrapped { snapshots } => snapshots,
        }
    }
}

impl BatteryApiRepository {
    pub fn new(
        base_url: String,
        batch_size: usize,
        max_pages: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            batch_size,
            max_pages,
        })
    }

    fn build_snapshots_url(&self, imei: &str, offset: usize) -> String {
        format!(
            "{}/api/snapshots?imei={}&limit={}&offset={}",
            self.base_url,
            urlencoding::encode(imei),
            self.batch_size,
            offset
        )
    }

    async fn fetch_page(&self, imei: &str, offset: usize) -> Result<Vec<Value>> {
        let url = self.build_snapshots_url(imei, offset);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to battery API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Battery API request failed with status {}: {}", status, body);
        }

        let page = response
            .json::<SnapshotPage>()
            .await
            .context("Failed to parse battery API response")?;

        Ok(page.into_records())
    }
}

#[async_trait]
impl TelemetryRepository for BatteryApiRepository {
    async fn fetch_samples(&self, imei: &str) -> Result<Vec<TelemetrySample>> {
        let mut samples = Vec::new();
        let mut skipped = 0usize;
        let mut offset = 0usize;
        let mut complete = false;

        for _ in 0..self.max_pages {
            let records = self.fetch_page(imei, offset).await?;
            let page_len = records.len();

            for record in records {
                match value_to_sample(record) {
                    Ok(sample) => samples.push(sample),
                    Err(reason) => {
                        skipped += 1;
                        tracing::debug!("Skipping record for {}: {}", imei, reason);
                    }
                }
            }

            // A short page is the last one
            if page_len < self.batch_size {
                complete = true;
                break;
            }
            offset += self.batch_size;
            tracing::debug!("Fetched {} records so far for {}", offset, imei);
        }

        if !complete {
            tracing::warn!(
                "Stopped after {} pages for battery {}; dataset may be truncated",
                self.max_pages,
                imei
            );
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} malformed records for battery {}", skipped, imei);
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IMEI: &str = "865044073967657";

    fn row(cycle: u32, minute: u32, soc: f64) -> Value {
        json!({
            "timestamp": format!("2024-03-01T08:{:02}:00Z", minute),
            "cycle_number": cycle,
            "speed": 20.0,
            "temperature": 27.5,
            "soc": soc,
            "voltage": 52.0,
            "current": 3.0
        })
    }

    fn repository(server: &MockServer, batch_size: usize) -> BatteryApiRepository {
        BatteryApiRepository::new(
            format!("{}/", server.uri()),
            batch_size,
            100,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_paginates_until_short_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .and(query_param("imei", IMEI))
            .and(query_param("offset", "0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([row(1, 0, 90.0), row(1, 5, 88.0)])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(2, 10, 70.0)])))
            .expect(1)
            .mount(&server)
            .await;

        let samples = repository(&server, 2).fetch_samples(IMEI).await.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].cycle_id, 2);
    }

    #[tokio::test]
    async fn test_fetch_accepts_wrapped_body_and_skips_bad_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [row(1, 0, 90.0), row(1, 5, 180.0), {"cycle_number": 1}]
            })))
            .mount(&server)
            .await;

        let samples = repository(&server, 100).fetch_samples(IMEI).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].soc, 90.0);
    }

    #[tokio::test]
    async fn test_fetch_skips_mistyped_rows_without_failing_page() {
        let server = MockServer::start().await;
        let mut stringly = row(1, 5, 88.0);
        stringly["cycle_number"] = json!("1");
        let mut mistyped = row(1, 10, 86.0);
        mistyped["cycle_number"] = json!({"id": 1});
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                row(1, 0, 90.0),
                stringly,
                mistyped,
                "garbage"
            ])))
            .mount(&server)
            .await;

        let samples = repository(&server, 100).fetch_samples(IMEI).await.unwrap();
        let socs: Vec<f64> = samples.iter().map(|s| s.soc).collect();
        assert_eq!(socs, vec![90.0, 88.0]);
    }

    #[tokio::test]
    async fn test_fetch_stops_at_page_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(1, 0, 90.0)])))
            .expect(3)
            .mount(&server)
            .await;

        let repository =
            BatteryApiRepository::new(server.uri(), 1, 3, Duration::from_secs(5)).unwrap();
        let samples = repository.fetch_samples(IMEI).await.unwrap();
        assert_eq!(samples.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_stops_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"snapshots": []})))
            .expect(1)
            .mount(&server)
            .await;

        let samples = repository(&server, 100).fetch_samples(IMEI).await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshots"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = repository(&server, 100).fetch_samples(IMEI).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("503"));
        assert!(message.contains("maintenance"));
    }
}
