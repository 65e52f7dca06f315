use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, FieldErrors, Result};
use crate::models::{
    FlavorAxis, LogFilter, LogForm, LoggedSake, Prefecture, PrefectureSakeCount, Sake, SakeLog,
    User, UserId,
};
use crate::sakenowa::{Ingestor, SakenowaClient, SyncReport};
use crate::services::MapData;

#[derive(Debug, Clone, Serialize)]
pub struct PrefectureOverview {
    pub prefectures: Vec<PrefectureSakeCount>,
    pub map_data: MapData,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefectureDetail {
    pub prefecture: Prefecture,
    pub sakes: Vec<Sake>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SakeDetail {
    /// Carries the brewery and, through it, the prefecture.
    pub sake: Sake,
    pub flavor: Vec<FlavorAxis>,
    /// The viewer's log for this sake, if any.
    pub log: Option<SakeLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrunkLogOverview {
    pub logs: Vec<LoggedSake>,
    pub map_data: MapData,
}

/// The query surface a presentation layer talks to.
pub struct App {
    repository: Repository,
    client: SakenowaClient,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let client = SakenowaClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::from_parts(repository, client))
    }

    pub fn from_parts(repository: Repository, client: SakenowaClient) -> Self {
        Self { repository, client }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Pulls all reference data from Sakenowa. Must not run concurrently with itself.
    pub async fn sync(&self) -> Result<SyncReport> {
        Ingestor::new(&self.client, &self.repository).run().await
    }

    /// Resolves a username to its identity, registering it on first use.
    pub async fn user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("username", "must not be empty");
            return Err(AppError::Validation(errors));
        }
        self.repository.ensure_user(username).await
    }

    // Prefectures

    pub async fn prefecture_overview(&self, viewer: Option<UserId>) -> Result<PrefectureOverview> {
        let prefectures = self.repository.prefecture_sake_counts().await?;
        let map_data = self.map_data(&prefectures, viewer).await?;
        Ok(PrefectureOverview {
            prefectures,
            map_data,
        })
    }

    pub async fn prefecture_detail(&self, id: i64) -> Result<PrefectureDetail> {
        let prefecture = self
            .repository
            .get_prefecture(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("prefecture {}", id)))?;
        let sakes = self.repository.sakes_in_prefecture(id).await?;
        Ok(PrefectureDetail { prefecture, sakes })
    }

    // Sakes

    pub async fn search_sakes(&self, query: &str) -> Result<Vec<Sake>> {
        self.repository.search_sakes(query).await
    }

    pub async fn sake_detail(&self, id: i64, viewer: Option<UserId>) -> Result<SakeDetail> {
        let sake = self
            .repository
            .get_sake(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("sake {}", id)))?;

        let log = match viewer {
            Some(user) => self.repository.find_log(user, id).await?,
            None => None,
        };

        Ok(SakeDetail {
            flavor: sake.flavor.axes(),
            sake,
            log,
        })
    }

    // Logs

    /// Creates or updates the viewer's log for a sake. Invalid input changes nothing.
    pub async fn save_sake_log(&self, user: UserId, sake_id: i64, form: &LogForm) -> Result<SakeLog> {
        let patch = form.validate().map_err(AppError::Validation)?;
        let log = self.repository.save_log(user, sake_id, patch).await?;
        tracing::debug!("Saved log {} for user {} and sake {}", log.id, user, sake_id);
        Ok(log)
    }

    pub async fn log_detail(&self, user: UserId, log_id: i64) -> Result<LoggedSake> {
        self.repository
            .get_log(user, log_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("log {}", log_id)))
    }

    /// Updates a log by its own id. Another user's log reads as not found.
    pub async fn update_log(&self, user: UserId, log_id: i64, form: &LogForm) -> Result<SakeLog> {
        let existing = self.log_detail(user, log_id).await?;
        self.save_sake_log(user, existing.log.sake_id, form).await
    }

    pub async fn drunk_logs(&self, user: UserId) -> Result<DrunkLogOverview> {
        let logs = self.repository.logs_for_user(user, LogFilter::Drunk).await?;
        let prefectures = self.repository.prefecture_sake_counts().await?;
        let map_data = self.map_data(&prefectures, Some(user)).await?;
        Ok(DrunkLogOverview { logs, map_data })
    }

    pub async fn liked_logs(&self, user: UserId) -> Result<Vec<LoggedSake>> {
        self.repository.logs_for_user(user, LogFilter::Liked).await
    }

    async fn map_data(
        &self,
        prefectures: &[PrefectureSakeCount],
        viewer: Option<UserId>,
    ) -> Result<MapData> {
        let drunk_counts = match viewer {
            Some(user) => Some(self.repository.drunk_counts_by_prefecture(user).await?),
            None => None,
        };
        Ok(MapData::build(prefectures, drunk_counts.as_ref()))
    }
}
