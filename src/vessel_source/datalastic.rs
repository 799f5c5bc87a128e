use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{FetchedPositions, PositionSource, extract_records, normalize_records};
use crate::config::ProviderConfig;

/// Client for the Datalastic vessel API
#[derive(Clone)]
pub struct DatalasticClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    country_iso: String,
}

impl DatalasticClient {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, country_iso: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            country_iso,
        }
    }

    /// Build a client from provider config and the `DATALASTIC_API_KEY` environment variable
    pub fn from_config(config: &ProviderConfig, request_timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("DATALASTIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("DATALASTIC_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("seawatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(
            client,
            config.base_url.clone(),
            api_key,
            config.country_iso.clone(),
        ))
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query: Vec<(&str, &str)> = vec![("api-key", self.api_key.as_str())];
        query.extend_from_slice(params);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", endpoint))?;

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to decode {} response", endpoint))
    }
}

#[async_trait]
impl PositionSource for DatalasticClient {
    async fn fetch_positions(&self) -> Result<FetchedPositions> {
        let start = Instant::now();
        let response = self
            .get("vessel_list", &[("country_iso", self.country_iso.as_str())])
            .await?;
        let records = extract_records(response)?;
        let fetched = normalize_records(&records, Utc::now());

        info!(
            "Fetched {} {} vessels in {:.2}ms ({} malformed)",
            fetched.reports.len(),
            self.country_iso,
            start.elapsed().as_secs_f64() * 1000.0,
            fetched.rejected
        );
        Ok(fetched)
    }

    async fn fetch_entities(&self, entity_ids: &[String]) -> Result<FetchedPositions> {
        let mut fetched = FetchedPositions::default();
        for mmsi in entity_ids {
            debug!("Fetching tracked vessel {}", mmsi);
            let response = self.get("vessel_pro", &[("mmsi", mmsi.as_str())]).await?;
            let records = extract_records(response)
                .with_context(|| format!("No data for tracked vessel {}", mmsi))?;
            let batch = normalize_records(&records, Utc::now());
            fetched.reports.extend(batch.reports);
            fetched.rejected += batch.rejected;
        }
        Ok(fetched)
    }
}
