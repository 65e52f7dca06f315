use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;
use crate::models::PrefectureSakeCount;

/// Per-prefecture totals for the map view.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MapEntry {
    pub name: String,
    pub sake_count: i64,
    pub drunk_count: i64,
    pub ratio: f64,
}

/// Map payload keyed by prefecture id (as a string), in prefecture order.
///
/// Serializes as a single JSON object. Names are written as UTF-8, never as `\u` escapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData(Vec<(String, MapEntry)>);

impl MapData {
    /// `drunk_counts` is `None` for an anonymous viewer; every drunk count is then zero.
    pub fn build(
        prefectures: &[PrefectureSakeCount],
        drunk_counts: Option<&HashMap<i64, i64>>,
    ) -> Self {
        let entries = prefectures
            .iter()
            .map(|p| {
                let drunk_count = drunk_counts
                    .and_then(|counts| counts.get(&p.id).copied())
                    .unwrap_or(0);
                let entry = MapEntry {
                    name: p.name.clone(),
                    sake_count: p.sake_count,
                    drunk_count,
                    ratio: ratio(drunk_count, p.sake_count),
                };
                (p.id.to_string(), entry)
            })
            .collect();
        Self(entries)
    }

    pub fn get(&self, prefecture_id: i64) -> Option<&MapEntry> {
        let key = prefecture_id.to_string();
        self.0.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MapEntry)> {
        self.0.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for MapData {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, entry) in &self.0 {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

/// `drunk / total` rounded half-to-even to three decimals; zero when there is nothing to drink.
pub fn ratio(drunk: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let raw = drunk as f64 / total as f64;
    (raw * 1000.0).round_ties_even() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefecture(id: i64, name: &str, sake_count: i64) -> PrefectureSakeCount {
        PrefectureSakeCount {
            id,
            name: name.to_string(),
            sake_count,
        }
    }

    #[test]
    fn ratio_rounds_to_three_places() {
        assert_eq!(ratio(1, 3), 0.333);
        assert_eq!(ratio(2, 3), 0.667);
        assert_eq!(ratio(1, 8), 0.125);
        assert_eq!(ratio(5, 5), 1.0);
        assert_eq!(ratio(0, 7), 0.0);
    }

    #[test]
    fn ratio_ties_round_to_even() {
        assert_eq!(ratio(1, 16), 0.062);
        assert_eq!(ratio(5, 16), 0.312);
        assert_eq!(ratio(9, 16), 0.562);
        assert_eq!(ratio(3, 16), 0.188);
    }

    #[test]
    fn ratio_is_zero_without_sakes() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(3, 0), 0.0);
        assert!(!ratio(3, 0).is_nan());
    }

    #[test]
    fn anonymous_viewer_has_no_drunk_counts() {
        let data = MapData::build(&[prefecture(13, "東京都", 4)], None);
        let tokyo = data.get(13).unwrap();
        assert_eq!(tokyo.sake_count, 4);
        assert_eq!(tokyo.drunk_count, 0);
        assert_eq!(tokyo.ratio, 0.0);
    }

    #[test]
    fn ratio_matches_counts_for_every_prefecture() {
        let prefectures = vec![
            prefecture(1, "北海道", 3),
            prefecture(2, "青森県", 0),
            prefecture(13, "東京都", 7),
        ];
        let drunk = HashMap::from([(1, 1), (13, 7)]);

        let data = MapData::build(&prefectures, Some(&drunk));

        for p in &prefectures {
            let entry = data.get(p.id).unwrap();
            assert_eq!(entry.ratio, ratio(entry.drunk_count, p.sake_count));
        }
        assert_eq!(data.get(1).unwrap().ratio, 0.333);
        assert_eq!(data.get(2).unwrap().ratio, 0.0);
        assert_eq!(data.get(13).unwrap().ratio, 1.0);
        assert!(data.get(99).is_none());
    }

    #[test]
    fn serializes_in_prefecture_order_without_escaping() {
        let data = MapData::build(
            &[
                prefecture(2, "青森県", 2),
                prefecture(10, "群馬県", 0),
                prefecture(13, "東京都", 1),
            ],
            Some(&HashMap::from([(2, 1)])),
        );

        let json = data.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"2":{"name":"青森県","sake_count":2,"drunk_count":1,"ratio":0.5},"10":{"name":"群馬県","sake_count":0,"drunk_count":0,"ratio":0.0},"13":{"name":"東京都","sake_count":1,"drunk_count":0,"ratio":0.0}}"#
        );
        assert!(!json.contains("\\u"));
    }

    #[test]
    fn round_trips_through_serde_json_value() {
        let data = MapData::build(&[prefecture(26, "京都府", 4)], Some(&HashMap::from([(26, 3)])));
        let value: serde_json::Value = serde_json::from_str(&data.to_json().unwrap()).unwrap();
        assert_eq!(value["26"]["ratio"], serde_json::json!(0.75));
        assert_eq!(value["26"]["name"], "京都府");
    }
}
