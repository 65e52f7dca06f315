use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{AppError, Result};

use super::types::{
    Area, AreasResponse, Brand, BrandsResponse, BreweriesResponse, BreweryRecord, FlavorChart,
    FlavorChartsResponse,
};

/// Read-only client for the Sakenowa data API.
pub struct SakenowaClient {
    client: Client,
    base_url: Url,
}

impl SakenowaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends with '/'
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| AppError::Config(format!("invalid API base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("sake-log/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn areas(&self) -> Result<Vec<Area>> {
        let body: AreasResponse = self.fetch("areas").await?;
        Ok(body.areas)
    }

    pub async fn breweries(&self) -> Result<Vec<BreweryRecord>> {
        let body: BreweriesResponse = self.fetch("breweries").await?;
        Ok(body.breweries)
    }

    pub async fn brands(&self) -> Result<Vec<Brand>> {
        let body: BrandsResponse = self.fetch("brands").await?;
        Ok(body.brands)
    }

    pub async fn flavor_charts(&self) -> Result<Vec<FlavorChart>> {
        let body: FlavorChartsResponse = self.fetch("flavor-charts").await?;
        Ok(body.flavor_charts)
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| AppError::Upstream(format!("bad endpoint {}: {}", endpoint, e)))?;
        tracing::info!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "GET {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}
