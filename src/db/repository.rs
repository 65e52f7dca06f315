use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    Brewery, FlavorProfile, LogFilter, LogFields, LogPatch, LoggedSake, Prefecture,
    PrefectureSakeCount, Rating, Sake, SakeLog, User, UserId,
};

use super::schema::SCHEMA;
use super::upsert::{upsert, BreweryRow, PrefectureRow, SakeRow};

const SAKE_COLUMNS: &str = "s.id, s.name, s.f1_hanayaka, s.f2_houjun, s.f3_juukou, \
     s.f4_odayaka, s.f5_dry, s.f6_keikai, b.id, b.name, p.id, p.name";

const SAKE_JOINS: &str = "LEFT JOIN breweries b ON b.id = s.brewery_id \
     LEFT JOIN prefectures p ON p.id = b.prefecture_id";

const LOG_COLUMNS: &str = "l.id, l.user_id, l.sake_id, l.is_liked, l.is_drunk, l.rating, \
     l.memo, l.drunk_at, l.created_at, l.updated_at";

/// Number of log columns preceding the sake columns in a joined log query.
const LOG_COLUMN_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub prefectures: i64,
    pub breweries: i64,
    pub sakes: i64,
    pub sake_logs: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Reference data ingestion

    pub async fn upsert_prefectures(&self, rows: Vec<PrefectureRow>) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for row in &rows {
                    upsert(&tx, row)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(count)
    }

    /// Fails without writing anything if a row names an unknown prefecture.
    pub async fn upsert_breweries(&self, rows: Vec<BreweryRow>) -> Result<usize> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut prefecture_exists =
                        tx.prepare_cached("SELECT 1 FROM prefectures WHERE id = ?1")?;
                    for row in &rows {
                        if !prefecture_exists.exists([row.prefecture_id])? {
                            return Ok(Err(AppError::MissingReference {
                                entity: "prefecture",
                                id: row.prefecture_id,
                            }));
                        }
                        upsert(&tx, row)?;
                    }
                }
                tx.commit()?;
                Ok(Ok(rows.len()))
            })
            .await?
    }

    /// Fails without writing anything if a row names an unknown brewery.
    pub async fn upsert_sakes(&self, rows: Vec<SakeRow>) -> Result<usize> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut brewery_exists =
                        tx.prepare_cached("SELECT 1 FROM breweries WHERE id = ?1")?;
                    for row in &rows {
                        if let Some(brewery_id) = row.brewery_id {
                            if !brewery_exists.exists([brewery_id])? {
                                return Ok(Err(AppError::MissingReference {
                                    entity: "brewery",
                                    id: brewery_id,
                                }));
                            }
                        }
                        upsert(&tx, row)?;
                    }
                }
                tx.commit()?;
                Ok(Ok(rows.len()))
            })
            .await?
    }

    /// Overwrites the flavor columns of existing sakes. Never inserts.
    pub async fn update_flavors(&self, charts: Vec<(i64, FlavorProfile)>) -> Result<usize> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut update = tx.prepare_cached(
                        r#"UPDATE sakes SET
                               f1_hanayaka = ?2, f2_houjun = ?3, f3_juukou = ?4,
                               f4_odayaka = ?5, f5_dry = ?6, f6_keikai = ?7
                           WHERE id = ?1"#,
                    )?;
                    for (sake_id, flavor) in &charts {
                        let [f1, f2, f3, f4, f5, f6] = flavor.values();
                        let changed = update.execute(params![sake_id, f1, f2, f3, f4, f5, f6])?;
                        if changed == 0 {
                            return Ok(Err(AppError::MissingReference {
                                entity: "sake",
                                id: *sake_id,
                            }));
                        }
                    }
                }
                tx.commit()?;
                Ok(Ok(charts.len()))
            })
            .await?
    }

    pub async fn delete_prefecture(&self, id: i64) -> Result<bool> {
        self.delete_by_id("prefectures", id).await
    }

    pub async fn delete_brewery(&self, id: i64) -> Result<bool> {
        self.delete_by_id("breweries", id).await
    }

    pub async fn delete_sake(&self, id: i64) -> Result<bool> {
        self.delete_by_id("sakes", id).await
    }

    async fn delete_by_id(&self, table: &'static str, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let changed =
                    conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        let counts = self
            .conn
            .call(|conn| {
                let counts = conn.query_row(
                    r#"SELECT (SELECT COUNT(*) FROM prefectures),
                              (SELECT COUNT(*) FROM breweries),
                              (SELECT COUNT(*) FROM sakes),
                              (SELECT COUNT(*) FROM sake_logs)"#,
                    [],
                    |row| {
                        Ok(TableCounts {
                            prefectures: row.get(0)?,
                            breweries: row.get(1)?,
                            sakes: row.get(2)?,
                            sake_logs: row.get(3)?,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    // Prefecture queries

    pub async fn get_prefecture(&self, id: i64) -> Result<Option<Prefecture>> {
        let prefecture = self
            .conn
            .call(move |conn| {
                let prefecture = conn
                    .query_row(
                        "SELECT id, name FROM prefectures WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(Prefecture {
                                id: row.get(0)?,
                                name: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(prefecture)
            })
            .await?;
        Ok(prefecture)
    }

    /// Every prefecture with the number of sakes brewed there, ordered by id.
    pub async fn prefecture_sake_counts(&self) -> Result<Vec<PrefectureSakeCount>> {
        let counts = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT p.id, p.name, COUNT(s.id)
                       FROM prefectures p
                       LEFT JOIN breweries b ON b.prefecture_id = p.id
                       LEFT JOIN sakes s ON s.brewery_id = b.id
                       GROUP BY p.id, p.name
                       ORDER BY p.id"#,
                )?;
                let counts = stmt
                    .query_map([], |row| {
                        Ok(PrefectureSakeCount {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            sake_count: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    /// Number of sakes the user marked as drunk, keyed by prefecture id.
    pub async fn drunk_counts_by_prefecture(&self, user: UserId) -> Result<HashMap<i64, i64>> {
        let counts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT b.prefecture_id, COUNT(l.id)
                       FROM sake_logs l
                       JOIN sakes s ON s.id = l.sake_id
                       JOIN breweries b ON b.id = s.brewery_id
                       WHERE l.user_id = ?1 AND l.is_drunk = 1
                       GROUP BY b.prefecture_id"#,
                )?;
                let counts = stmt
                    .query_map(params![user.0], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    // Sake queries

    pub async fn get_sake(&self, id: i64) -> Result<Option<Sake>> {
        let sake = self
            .conn
            .call(move |conn| {
                let sake = conn
                    .query_row(
                        &format!("SELECT {SAKE_COLUMNS} FROM sakes s {SAKE_JOINS} WHERE s.id = ?1"),
                        params![id],
                        |row| sake_from_row(row, 0),
                    )
                    .optional()?;
                Ok(sake)
            })
            .await?;
        Ok(sake)
    }

    pub async fn sakes_in_prefecture(&self, prefecture_id: i64) -> Result<Vec<Sake>> {
        let sakes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SAKE_COLUMNS} FROM sakes s {SAKE_JOINS} WHERE p.id = ?1 ORDER BY s.id"
                ))?;
                let sakes = stmt
                    .query_map(params![prefecture_id], |row| sake_from_row(row, 0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sakes)
            })
            .await?;
        Ok(sakes)
    }

    /// Case-insensitive substring match on the sake name or its brewery's name.
    /// An empty query lists every sake.
    pub async fn search_sakes(&self, query: &str) -> Result<Vec<Sake>> {
        let query = query.trim().to_string();
        let sakes = self
            .conn
            .call(move |conn| {
                let sakes = if query.is_empty() {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SAKE_COLUMNS} FROM sakes s {SAKE_JOINS} ORDER BY s.id"
                    ))?;
                    let rows = stmt
                        .query_map([], |row| sake_from_row(row, 0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                } else {
                    let pattern = format!("%{}%", escape_like(&query));
                    let mut stmt = conn.prepare(&format!(
                        r#"SELECT {SAKE_COLUMNS} FROM sakes s {SAKE_JOINS}
                           WHERE s.name LIKE ?1 ESCAPE '\' OR b.name LIKE ?1 ESCAPE '\'
                           ORDER BY s.id"#
                    ))?;
                    let rows = stmt
                        .query_map(params![pattern], |row| sake_from_row(row, 0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                };
                Ok(sakes)
            })
            .await?;
        Ok(sakes)
    }

    // User operations

    pub async fn ensure_user(&self, username: &str) -> Result<User> {
        let username = username.to_string();
        let user = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (username) VALUES (?1) ON CONFLICT(username) DO NOTHING",
                    params![username],
                )?;
                let id: i64 = conn.query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )?;
                Ok(User {
                    id: UserId(id),
                    username,
                })
            })
            .await?;
        Ok(user)
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT id FROM users WHERE username = ?1",
                        params![username],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?;
                Ok(id.map(|id| User {
                    id: UserId(id),
                    username,
                }))
            })
            .await?;
        Ok(user)
    }

    pub async fn delete_user(&self, user: UserId) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user.0])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    // Log operations

    pub async fn find_log(&self, user: UserId, sake_id: i64) -> Result<Option<SakeLog>> {
        let log = self
            .conn
            .call(move |conn| {
                let log = conn
                    .query_row(
                        &format!(
                            "SELECT {LOG_COLUMNS} FROM sake_logs l WHERE l.user_id = ?1 AND l.sake_id = ?2"
                        ),
                        params![user.0, sake_id],
                        log_from_row,
                    )
                    .optional()?;
                Ok(log)
            })
            .await?;
        Ok(log)
    }

    /// A log by its own id, only if `user` owns it.
    pub async fn get_log(&self, user: UserId, log_id: i64) -> Result<Option<LoggedSake>> {
        let log = self
            .conn
            .call(move |conn| {
                let log = conn
                    .query_row(
                        &format!(
                            r#"SELECT {LOG_COLUMNS}, {SAKE_COLUMNS}
                               FROM sake_logs l
                               JOIN sakes s ON s.id = l.sake_id
                               {SAKE_JOINS}
                               WHERE l.id = ?1 AND l.user_id = ?2"#
                        ),
                        params![log_id, user.0],
                        logged_sake_from_row,
                    )
                    .optional()?;
                Ok(log)
            })
            .await?;
        Ok(log)
    }

    /// Creates or updates the single log for `(user, sake_id)`.
    ///
    /// The existing fields are read, patched and written back inside one immediate
    /// transaction; the `UNIQUE(user_id, sake_id)` conflict clause turns a racing
    /// second insert into an update.
    pub async fn save_log(&self, user: UserId, sake_id: i64, patch: LogPatch) -> Result<SakeLog> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                if !tx
                    .prepare_cached("SELECT 1 FROM users WHERE id = ?1")?
                    .exists(params![user.0])?
                {
                    return Ok(Err(AppError::not_found(format!("user {}", user))));
                }
                if !tx
                    .prepare_cached("SELECT 1 FROM sakes WHERE id = ?1")?
                    .exists(params![sake_id])?
                {
                    return Ok(Err(AppError::not_found(format!("sake {}", sake_id))));
                }

                let select = format!(
                    "SELECT {LOG_COLUMNS} FROM sake_logs l WHERE l.user_id = ?1 AND l.sake_id = ?2"
                );
                let existing = tx
                    .query_row(&select, params![user.0, sake_id], log_from_row)
                    .optional()?;

                let mut fields = existing.map(|log| log.fields).unwrap_or_default();
                patch.apply(&mut fields);
                let now = format_timestamp(&Utc::now());

                tx.execute(
                    r#"INSERT INTO sake_logs
                           (user_id, sake_id, is_liked, is_drunk, rating, memo, drunk_at, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                       ON CONFLICT(user_id, sake_id) DO UPDATE SET
                           is_liked = excluded.is_liked,
                           is_drunk = excluded.is_drunk,
                           rating = excluded.rating,
                           memo = excluded.memo,
                           drunk_at = excluded.drunk_at,
                           updated_at = excluded.updated_at"#,
                    params![
                        user.0,
                        sake_id,
                        fields.is_liked,
                        fields.is_drunk,
                        fields.rating.map(Rating::value),
                        fields.memo,
                        fields.drunk_at.map(|d| d.format("%Y-%m-%d").to_string()),
                        now,
                    ],
                )?;

                let log = tx.query_row(&select, params![user.0, sake_id], log_from_row)?;
                tx.commit()?;
                Ok(Ok(log))
            })
            .await?
    }

    /// The user's logs matching `filter`, most recently updated first.
    pub async fn logs_for_user(&self, user: UserId, filter: LogFilter) -> Result<Vec<LoggedSake>> {
        let column = filter.column();
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {LOG_COLUMNS}, {SAKE_COLUMNS}
                       FROM sake_logs l
                       JOIN sakes s ON s.id = l.sake_id
                       {SAKE_JOINS}
                       WHERE l.user_id = ?1 AND l.{column} = 1
                       ORDER BY l.updated_at DESC, l.id DESC"#
                ))?;
                let logs = stmt
                    .query_map(params![user.0], logged_sake_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp {:?}: {}", raw, e)))
}

fn sake_from_row(row: &Row, offset: usize) -> rusqlite::Result<Sake> {
    let brewery = match row.get::<_, Option<i64>>(offset + 8)? {
        Some(id) => Some(Brewery {
            id,
            name: row.get(offset + 9)?,
            prefecture: Prefecture {
                id: row.get(offset + 10)?,
                name: row.get(offset + 11)?,
            },
        }),
        None => None,
    };

    Ok(Sake {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        brewery,
        flavor: FlavorProfile::from_values([
            row.get(offset + 2)?,
            row.get(offset + 3)?,
            row.get(offset + 4)?,
            row.get(offset + 5)?,
            row.get(offset + 6)?,
            row.get(offset + 7)?,
        ]),
    })
}

fn log_from_row(row: &Row) -> rusqlite::Result<SakeLog> {
    let rating = match row.get::<_, Option<i64>>(5)? {
        Some(value) => Some(
            Rating::new(value)
                .ok_or_else(|| conversion_error(5, format!("rating {} out of range", value)))?,
        ),
        None => None,
    };
    let drunk_at = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| conversion_error(7, format!("bad date {:?}: {}", raw, e)))?,
        ),
        None => None,
    };

    Ok(SakeLog {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        sake_id: row.get(2)?,
        fields: LogFields {
            is_liked: row.get(3)?,
            is_drunk: row.get(4)?,
            rating,
            memo: row.get(6)?,
            drunk_at,
        },
        created_at: timestamp_column(row, 8)?,
        updated_at: timestamp_column(row, 9)?,
    })
}

fn logged_sake_from_row(row: &Row) -> rusqlite::Result<LoggedSake> {
    Ok(LoggedSake {
        log: log_from_row(row)?,
        sake: sake_from_row(row, LOG_COLUMN_COUNT)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::LogForm;
    use tempfile::TempDir;

    async fn seeded() -> Repository {
        let repo = Repository::in_memory().await.unwrap();
        repo.upsert_prefectures(vec![
            PrefectureRow { id: 1, name: "北海道".to_string() },
            PrefectureRow { id: 13, name: "東京都".to_string() },
            PrefectureRow { id: 26, name: "京都府".to_string() },
        ])
        .await
        .unwrap();
        repo.upsert_breweries(vec![
            BreweryRow { id: 10, name: "小山酒造".to_string(), prefecture_id: 13 },
            BreweryRow { id: 11, name: "Ishikawa Brewery".to_string(), prefecture_id: 13 },
            BreweryRow { id: 20, name: "男山".to_string(), prefecture_id: 1 },
        ])
        .await
        .unwrap();
        repo.upsert_sakes(vec![
            SakeRow { id: 100, name: "丸眞正宗".to_string(), brewery_id: Some(10) },
            SakeRow { id: 101, name: "Tamajiman".to_string(), brewery_id: Some(11) },
            SakeRow { id: 102, name: "男山 生酛".to_string(), brewery_id: Some(20) },
            SakeRow { id: 103, name: "100%_Rice".to_string(), brewery_id: None },
        ])
        .await
        .unwrap();
        repo
    }

    fn patch(form: LogForm) -> LogPatch {
        form.validate().unwrap()
    }

    #[tokio::test]
    async fn opens_database_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sake.db");
        {
            let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
            repo.upsert_prefectures(vec![PrefectureRow { id: 1, name: "北海道".to_string() }])
                .await
                .unwrap();
        }
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        assert_eq!(repo.table_counts().await.unwrap().prefectures, 1);
    }

    #[tokio::test]
    async fn brewery_with_unknown_prefecture_is_rejected() {
        let repo = seeded().await;
        let err = repo
            .upsert_breweries(vec![
                BreweryRow { id: 30, name: "new".to_string(), prefecture_id: 13 },
                BreweryRow { id: 31, name: "orphan".to_string(), prefecture_id: 99 },
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::MissingReference { entity: "prefecture", id: 99 }
        ));
        // the whole phase is rolled back
        assert_eq!(repo.table_counts().await.unwrap().breweries, 3);
    }

    #[tokio::test]
    async fn sake_with_unknown_brewery_is_rejected() {
        let repo = seeded().await;
        let err = repo
            .upsert_sakes(vec![SakeRow { id: 200, name: "x".to_string(), brewery_id: Some(999) }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingReference { entity: "brewery", id: 999 }));
    }

    #[tokio::test]
    async fn flavor_update_requires_existing_sake() {
        let repo = seeded().await;
        let flavor = FlavorProfile::from_values([Some(0.1); 6]);

        assert_eq!(repo.update_flavors(vec![(100, flavor)]).await.unwrap(), 1);
        let err = repo.update_flavors(vec![(404, flavor)]).await.unwrap_err();
        assert!(matches!(err, AppError::MissingReference { entity: "sake", id: 404 }));
        assert_eq!(repo.table_counts().await.unwrap().sakes, 4);

        let sake = repo.get_sake(100).await.unwrap().unwrap();
        assert_eq!(sake.flavor.f6_keikai, Some(0.1));
    }

    #[tokio::test]
    async fn out_of_range_flavor_violates_check() {
        let repo = seeded().await;
        let flavor = FlavorProfile {
            f2_houjun: Some(1.5),
            ..Default::default()
        };
        assert!(repo.update_flavors(vec![(100, flavor)]).await.is_err());
    }

    #[tokio::test]
    async fn counts_sakes_per_prefecture() {
        let repo = seeded().await;
        let counts = repo.prefecture_sake_counts().await.unwrap();

        let summary: Vec<_> = counts.iter().map(|p| (p.id, p.sake_count)).collect();
        assert_eq!(summary, vec![(1, 1), (13, 2), (26, 0)]);
        assert_eq!(counts[2].name, "京都府");
    }

    #[tokio::test]
    async fn search_matches_sake_or_brewery_name() {
        let repo = seeded().await;

        let by_sake: Vec<_> = repo.search_sakes("tamaji").await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(by_sake, vec![101]);

        let by_brewery: Vec<_> = repo.search_sakes("ISHIKAWA").await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(by_brewery, vec![101]);

        let japanese: Vec<_> = repo.search_sakes("男山").await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(japanese, vec![102]);

        assert_eq!(repo.search_sakes("  ").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let repo = seeded().await;
        let hits: Vec<_> = repo.search_sakes("0%_R").await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(hits, vec![103]);
        assert!(repo.search_sakes("_x_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sake_carries_brewery_and_prefecture() {
        let repo = seeded().await;
        let sake = repo.get_sake(100).await.unwrap().unwrap();
        assert_eq!(sake.brewery.as_ref().map(|b| b.name.as_str()), Some("小山酒造"));
        assert_eq!(sake.prefecture().map(|p| p.name.as_str()), Some("東京都"));

        let orphan = repo.get_sake(103).await.unwrap().unwrap();
        assert!(orphan.brewery.is_none());
        assert!(orphan.prefecture().is_none());

        assert!(repo.get_sake(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_brewery_keeps_sake_without_prefecture() {
        let repo = seeded().await;
        assert!(repo.delete_brewery(10).await.unwrap());

        let sake = repo.get_sake(100).await.unwrap().unwrap();
        assert!(sake.brewery.is_none());
        assert!(sake.prefecture().is_none());

        let tokyo: Vec<_> = repo.sakes_in_prefecture(13).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(tokyo, vec![101]);
        let counts = repo.prefecture_sake_counts().await.unwrap();
        assert_eq!(counts.iter().find(|p| p.id == 13).map(|p| p.sake_count), Some(1));
    }

    #[tokio::test]
    async fn deleting_prefecture_cascades_to_breweries() {
        let repo = seeded().await;
        assert!(repo.delete_prefecture(13).await.unwrap());

        let counts = repo.table_counts().await.unwrap();
        assert_eq!(counts.prefectures, 2);
        assert_eq!(counts.breweries, 1);
        assert_eq!(counts.sakes, 4);
        assert!(repo.get_sake(101).await.unwrap().unwrap().brewery.is_none());
        assert!(!repo.delete_prefecture(13).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_user_is_stable() {
        let repo = seeded().await;
        let first = repo.ensure_user("hanako").await.unwrap();
        let again = repo.ensure_user("hanako").await.unwrap();
        let other = repo.ensure_user("taro").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_eq!(repo.find_user("hanako").await.unwrap(), Some(first));
        assert!(repo.find_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_save_updates_the_same_log() {
        let repo = seeded().await;
        let user = repo.ensure_user("hanako").await.unwrap().id;

        let created = repo
            .save_log(
                user,
                100,
                patch(LogForm {
                    is_drunk: Some(true),
                    rating: Some("4".to_string()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        let updated = repo
            .save_log(
                user,
                100,
                patch(LogForm {
                    is_liked: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(created.created_at, updated.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert!(updated.fields.is_drunk);
        assert!(updated.fields.is_liked);
        assert_eq!(updated.fields.rating, Rating::new(4));
        assert_eq!(repo.table_counts().await.unwrap().sake_logs, 1);
        assert_eq!(repo.find_log(user, 100).await.unwrap(), Some(updated));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_saves_share_one_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("race.db");
        let path = path.to_str().unwrap();

        let first = Arc::new(Repository::new(path).await.unwrap());
        first
            .upsert_prefectures(vec![PrefectureRow { id: 13, name: "東京都".to_string() }])
            .await
            .unwrap();
        first
            .upsert_breweries(vec![BreweryRow { id: 10, name: "小山酒造".to_string(), prefecture_id: 13 }])
            .await
            .unwrap();
        first
            .upsert_sakes(vec![SakeRow { id: 100, name: "丸眞正宗".to_string(), brewery_id: Some(10) }])
            .await
            .unwrap();
        let user = first.ensure_user("hanako").await.unwrap().id;
        let second = Arc::new(Repository::new(path).await.unwrap());

        let saves: Vec<_> = (0..20)
            .map(|i| {
                let repo = if i % 2 == 0 { Arc::clone(&first) } else { Arc::clone(&second) };
                tokio::spawn(async move {
                    let patch = LogPatch {
                        is_drunk: Some(true),
                        ..Default::default()
                    };
                    repo.save_log(user, 100, patch).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for save in saves {
            ids.push(save.await.unwrap().unwrap().id);
        }

        assert!(ids.iter().all(|&id| id == ids[0]));
        assert_eq!(first.table_counts().await.unwrap().sake_logs, 1);
        assert_eq!(second.table_counts().await.unwrap().sake_logs, 1);
        assert!(first.find_log(user, 100).await.unwrap().unwrap().fields.is_drunk);
    }

    #[tokio::test]
    async fn save_log_for_unknown_sake_is_not_found() {
        let repo = seeded().await;
        let user = repo.ensure_user("hanako").await.unwrap().id;

        let err = repo.save_log(user, 999, LogPatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
        let err = repo.save_log(UserId(4242), 100, LogPatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.table_counts().await.unwrap().sake_logs, 0);
    }

    #[tokio::test]
    async fn log_is_scoped_to_its_owner() {
        let repo = seeded().await;
        let hanako = repo.ensure_user("hanako").await.unwrap().id;
        let taro = repo.ensure_user("taro").await.unwrap().id;

        let log = repo.save_log(hanako, 102, LogPatch::default()).await.unwrap();

        let own = repo.get_log(hanako, log.id).await.unwrap().unwrap();
        assert_eq!(own.sake.id, 102);
        assert_eq!(own.sake.prefecture().map(|p| p.id), Some(1));
        assert!(repo.get_log(taro, log.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn drunk_counts_group_by_prefecture() {
        let repo = seeded().await;
        let hanako = repo.ensure_user("hanako").await.unwrap().id;
        let taro = repo.ensure_user("taro").await.unwrap().id;
        let drunk = || {
            patch(LogForm {
                is_drunk: Some(true),
                ..Default::default()
            })
        };

        repo.save_log(hanako, 100, drunk()).await.unwrap();
        repo.save_log(hanako, 101, drunk()).await.unwrap();
        repo.save_log(hanako, 103, drunk()).await.unwrap();
        repo.save_log(hanako, 102, LogPatch::default()).await.unwrap();
        repo.save_log(taro, 102, drunk()).await.unwrap();

        let counts = repo.drunk_counts_by_prefecture(hanako).await.unwrap();
        assert_eq!(counts.get(&13), Some(&2));
        assert_eq!(counts.get(&1), None);
        assert_eq!(counts.len(), 1);
    }

    #[tokio::test]
    async fn listings_filter_and_order_by_update() {
        let repo = seeded().await;
        let user = repo.ensure_user("hanako").await.unwrap().id;

        repo.save_log(user, 100, patch(LogForm { is_drunk: Some(true), ..Default::default() }))
            .await
            .unwrap();
        repo.save_log(user, 101, patch(LogForm { is_drunk: Some(true), is_liked: Some(true), ..Default::default() }))
            .await
            .unwrap();
        repo.save_log(user, 102, patch(LogForm { is_liked: Some(true), ..Default::default() }))
            .await
            .unwrap();
        repo.save_log(user, 100, patch(LogForm { memo: Some("また飲みたい".to_string()), ..Default::default() }))
            .await
            .unwrap();

        let drunk: Vec<_> = repo
            .logs_for_user(user, LogFilter::Drunk)
            .await
            .unwrap()
            .iter()
            .map(|l| l.sake.id)
            .collect();
        assert_eq!(drunk, vec![100, 101]);

        let liked: Vec<_> = repo
            .logs_for_user(user, LogFilter::Liked)
            .await
            .unwrap()
            .iter()
            .map(|l| l.sake.id)
            .collect();
        assert_eq!(liked, vec![102, 101]);
    }

    #[tokio::test]
    async fn deleting_user_or_sake_removes_logs() {
        let repo = seeded().await;
        let hanako = repo.ensure_user("hanako").await.unwrap().id;
        let taro = repo.ensure_user("taro").await.unwrap().id;
        repo.save_log(hanako, 100, LogPatch::default()).await.unwrap();
        repo.save_log(taro, 101, LogPatch::default()).await.unwrap();

        assert!(repo.delete_user(hanako).await.unwrap());
        assert_eq!(repo.table_counts().await.unwrap().sake_logs, 1);

        assert!(repo.delete_sake(101).await.unwrap());
        assert_eq!(repo.table_counts().await.unwrap().sake_logs, 0);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("獺祭"), "獺祭");
    }

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = DateTime::parse_from_rfc3339("2026-01-11T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2026-01-11T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(format_timestamp(&earlier), "2026-01-11T09:00:00.500000Z");
        assert_eq!(format_timestamp(&later), "2026-01-11T10:00:00.000000Z");
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }
}
