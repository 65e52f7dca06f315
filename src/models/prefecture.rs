use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefecture {
    pub id: i64,
    pub name: String,
}

/// A prefecture annotated with the number of sakes reachable through its breweries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefectureSakeCount {
    pub id: i64,
    pub name: String,
    pub sake_count: i64,
}
