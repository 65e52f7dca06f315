use serde::{Deserialize, Serialize};

use super::{Brewery, Prefecture};

/// Six taste scalars in [0, 1], as published by the flavor-chart endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavorProfile {
    pub f1_hanayaka: Option<f64>,
    pub f2_houjun: Option<f64>,
    pub f3_juukou: Option<f64>,
    pub f4_odayaka: Option<f64>,
    pub f5_dry: Option<f64>,
    pub f6_keikai: Option<f64>,
}

/// One flavor axis prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlavorAxis {
    pub key: &'static str,
    pub label: &'static str,
    pub value: Option<f64>,
    pub percent: Option<f64>,
}

impl FlavorProfile {
    pub const KEYS: [&'static str; 6] = [
        "f1_hanayaka",
        "f2_houjun",
        "f3_juukou",
        "f4_odayaka",
        "f5_dry",
        "f6_keikai",
    ];

    pub const LABELS: [&'static str; 6] = ["華やか", "芳醇", "重厚", "穏やか", "ドライ", "軽快"];

    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.f1_hanayaka,
            self.f2_houjun,
            self.f3_juukou,
            self.f4_odayaka,
            self.f5_dry,
            self.f6_keikai,
        ]
    }

    pub fn from_values(values: [Option<f64>; 6]) -> Self {
        let [f1, f2, f3, f4, f5, f6] = values;
        Self {
            f1_hanayaka: f1,
            f2_houjun: f2,
            f3_juukou: f3,
            f4_odayaka: f4,
            f5_dry: f5,
            f6_keikai: f6,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }

    /// Scales every present value to a percentage. Storage stays in [0, 1].
    pub fn axes(&self) -> Vec<FlavorAxis> {
        Self::KEYS
            .into_iter()
            .zip(Self::LABELS)
            .zip(self.values())
            .map(|((key, label), value)| FlavorAxis {
                key,
                label,
                value,
                percent: value.map(|v| v * 100.0),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sake {
    pub id: i64,
    pub name: String,
    pub brewery: Option<Brewery>,
    pub flavor: FlavorProfile,
}

impl Sake {
    /// The prefecture of the sake's brewery, if it still has one.
    pub fn prefecture(&self) -> Option<&Prefecture> {
        self.brewery.as_ref().map(|b| &b.prefecture)
    }
}
