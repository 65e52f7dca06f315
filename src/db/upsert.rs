//! Insert-or-update keyed by the identifier the upstream API assigned.
//!
//! Reference tables never allocate their own ids. Each row type names its table and the
//! columns it owns, and [`upsert`] writes it: a missing id is inserted, an existing id has
//! exactly those columns overwritten. Columns a row type does not list (the flavor chart
//! on `sakes`, for instance) are left alone on update.

use rusqlite::types::ToSql;
use rusqlite::Connection;

pub trait ExternalRow {
    const TABLE: &'static str;
    /// Columns written besides `id`, in the order of [`ExternalRow::values`].
    const COLUMNS: &'static [&'static str];

    fn external_id(&self) -> i64;
    fn values(&self) -> Vec<&dyn ToSql>;
}

pub fn upsert<R: ExternalRow>(conn: &Connection, row: &R) -> rusqlite::Result<usize> {
    let sql = upsert_sql(R::TABLE, R::COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;

    let id = row.external_id();
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(R::COLUMNS.len() + 1);
    values.push(&id);
    values.extend(row.values());

    stmt.execute(values.as_slice())
}

fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = (1..=columns.len() + 1)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} (id, {}) VALUES ({placeholders}) ON CONFLICT(id) DO UPDATE SET {updates}",
        columns.join(", ")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefectureRow {
    pub id: i64,
    pub name: String,
}

impl ExternalRow for PrefectureRow {
    const TABLE: &'static str = "prefectures";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn external_id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreweryRow {
    pub id: i64,
    pub name: String,
    pub prefecture_id: i64,
}

impl ExternalRow for BreweryRow {
    const TABLE: &'static str = "breweries";
    const COLUMNS: &'static [&'static str] = &["name", "prefecture_id"];

    fn external_id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name, &self.prefecture_id]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SakeRow {
    pub id: i64,
    pub name: String,
    pub brewery_id: Option<i64>,
}

impl ExternalRow for SakeRow {
    const TABLE: &'static str = "sakes";
    const COLUMNS: &'static [&'static str] = &["name", "brewery_id"];

    fn external_id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name, &self.brewery_id]
    }
}
