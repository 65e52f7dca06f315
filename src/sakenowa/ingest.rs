use serde::Serialize;

use crate::db::upsert::{BreweryRow, PrefectureRow, SakeRow};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::FlavorProfile;

use super::client::SakenowaClient;
use super::types::FlavorChart;

/// Rows written by each phase of a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub prefectures: usize,
    pub breweries: usize,
    pub sakes: usize,
    pub flavor_charts: usize,
}

/// Mirrors the Sakenowa reference data into the local store.
///
/// The four phases run strictly in order because each one's foreign keys point at rows
/// the previous phase wrote. Each phase commits on its own: if a later phase fails, the
/// earlier ones stay written, and re-running the whole sync is the way to recover.
/// Do not run two syncs against the same database at once.
pub struct Ingestor<'a> {
    client: &'a SakenowaClient,
    repository: &'a Repository,
}

impl<'a> Ingestor<'a> {
    pub fn new(client: &'a SakenowaClient, repository: &'a Repository) -> Self {
        Self { client, repository }
    }

    pub async fn run(&self) -> Result<SyncReport> {
        tracing::info!("Starting Sakenowa sync from {}", self.client.base_url());
        let mut report = SyncReport::default();

        tracing::info!("[1/4] Prefectures");
        let rows = self
            .client
            .areas()
            .await?
            .into_iter()
            .map(|area| PrefectureRow {
                id: area.id,
                name: area.name,
            })
            .collect();
        report.prefectures = self.repository.upsert_prefectures(rows).await?;
        tracing::info!("Saved {} prefectures", report.prefectures);

        tracing::info!("[2/4] Breweries");
        let rows = self
            .client
            .breweries()
            .await?
            .into_iter()
            .map(|brewery| BreweryRow {
                id: brewery.id,
                name: brewery.name,
                prefecture_id: brewery.area_id,
            })
            .collect();
        report.breweries = self.repository.upsert_breweries(rows).await?;
        tracing::info!("Saved {} breweries", report.breweries);

        tracing::info!("[3/4] Brands");
        let rows = self
            .client
            .brands()
            .await?
            .into_iter()
            .map(|brand| SakeRow {
                id: brand.id,
                brewery_id: brand.brewery(),
                name: brand.name,
            })
            .collect();
        report.sakes = self.repository.upsert_sakes(rows).await?;
        tracing::info!("Saved {} sakes", report.sakes);

        tracing::info!("[4/4] Flavor charts");
        let charts = self
            .client
            .flavor_charts()
            .await?
            .iter()
            .map(checked_profile)
            .collect::<Result<Vec<_>>>()?;
        report.flavor_charts = self.repository.update_flavors(charts).await?;
        tracing::info!("Updated {} flavor charts", report.flavor_charts);

        tracing::info!("Sakenowa sync finished");
        Ok(report)
    }
}

fn checked_profile(chart: &FlavorChart) -> Result<(i64, FlavorProfile)> {
    let profile = chart.profile();
    if let Some(value) = profile
        .values()
        .into_iter()
        .flatten()
        .find(|v| !(0.0..=1.0).contains(v))
    {
        return Err(AppError::InvalidFlavor {
            sake_id: chart.brand_id,
            value,
        });
    }
    Ok((chart.brand_id, profile))
}
