use serde::{Deserialize, Serialize};

use super::Prefecture;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brewery {
    pub id: i64,
    pub name: String,
    pub prefecture: Prefecture,
}
