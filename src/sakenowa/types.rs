use serde::Deserialize;

use crate::models::FlavorProfile;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Area {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreweryRecord {
    pub id: i64,
    pub name: String,
    pub area_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub brewery_id: Option<i64>,
}

impl Brand {
    /// The API uses `0` as well as a missing field for "no brewery".
    pub fn brewery(&self) -> Option<i64> {
        self.brewery_id.filter(|&id| id != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlavorChart {
    pub brand_id: i64,
    #[serde(default)]
    pub f1: Option<f64>,
    #[serde(default)]
    pub f2: Option<f64>,
    #[serde(default)]
    pub f3: Option<f64>,
    #[serde(default)]
    pub f4: Option<f64>,
    #[serde(default)]
    pub f5: Option<f64>,
    #[serde(default)]
    pub f6: Option<f64>,
}

impl FlavorChart {
    pub fn profile(&self) -> FlavorProfile {
        FlavorProfile::from_values([self.f1, self.f2, self.f3, self.f4, self.f5, self.f6])
    }
}

// Each endpoint wraps its array in a single named key. A missing key reads as empty.

#[derive(Debug, Deserialize)]
pub(crate) struct AreasResponse {
    #[serde(default)]
    pub areas: Vec<Area>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BreweriesResponse {
    #[serde(default)]
    pub breweries: Vec<BreweryRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BrandsResponse {
    #[serde(default)]
    pub brands: Vec<Brand>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FlavorChartsResponse {
    #[serde(default)]
    pub flavor_charts: Vec<FlavorChart>,
}
