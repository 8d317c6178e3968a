//! `PostgREST`-style HTTP adapter.
//!
//! Tables mirror the `SQLite` schema: `sessions`, `series`, `arrows` and
//! `self_assessments`, with cascading deletes handled by the server.

use std::env;
use std::time::Duration;

use arco_core::model::{Arrow, ArrowId, OwnerId, SelfAssessment, SeriesId, Session, SessionId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::repository::{
    ArrowRepository, AssessmentRepository, SeriesRepository, SessionRepository, Storage,
    StorageError, assemble_session,
};

mod rows;

use rows::{ArrowBody, AssessmentRow, IdRow, SeriesBody, SessionBody, SessionRow};

const SESSION_SELECT: &str = "*,series(*,arrows(*)),self_assessments(*)";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    /// Bearer token of the signed-in user. Falls back to the api key.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    /// Read `ARCO_API_URL`, `ARCO_API_KEY` and `ARCO_ACCESS_TOKEN`.
    ///
    /// Returns `None` unless both the URL and the key are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = non_empty(env::var("ARCO_API_URL").ok())?;
        let api_key = non_empty(env::var("ARCO_API_KEY").ok())?;
        Some(Self {
            base_url,
            api_key,
            access_token: non_empty(env::var("ARCO_ACCESS_TOKEN").ok()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.base_url.trim_end_matches('/'))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct RestRepository {
    client: Client,
    config: RestConfig,
}

impl RestRepository {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(http)?;
        Ok(Self { client, config })
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        self.client
            .request(method, self.config.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }

    async fn rows<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Vec<T>, StorageError> {
        let response = builder.send().await.map_err(http)?;
        check(&response)?;
        response.json().await.map_err(http)
    }

    async fn insert<B: serde::Serialize + Sync>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<u64, StorageError> {
        let builder = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        Self::rows::<IdRow>(builder)
            .await?
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| StorageError::Serialization(format!("empty insert into {table}")))
    }

    /// PATCH or DELETE a single row by id; an empty representation means it
    /// did not exist.
    async fn touch<B: serde::Serialize + Sync>(
        &self,
        method: reqwest::Method,
        table: &str,
        id: u64,
        body: Option<&B>,
    ) -> Result<(), StorageError> {
        let mut builder = self
            .request(method, table)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let affected = Self::rows::<IdRow>(builder).await?;
        if affected.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn fetch_sessions(&self, filter: (&str, String)) -> Result<Vec<Session>, StorageError> {
        let builder = self.request(reqwest::Method::GET, "sessions").query(&[
            ("select", SESSION_SELECT.to_owned()),
            (filter.0, filter.1),
            (
                "order",
                "session_date.desc,created_at.desc,id.desc".to_owned(),
            ),
        ]);
        Self::rows::<SessionRow>(builder)
            .await?
            .into_iter()
            .map(|row| {
                let parts = row.into_parts()?;
                assemble_session(parts.header, parts.series, parts.arrows, parts.assessment)
            })
            .collect()
    }
}

fn http(e: reqwest::Error) -> StorageError {
    if e.is_decode() {
        return StorageError::Serialization(e.to_string());
    }
    if let Some(status) = e.status() {
        return status_error(status);
    }
    StorageError::Connection(e.to_string())
}

fn check(response: &Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(status_error(status))
    }
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized,
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("request failed with status {other}")),
    }
}

#[async_trait]
impl SessionRepository for RestRepository {
    async fn create_session(&self, session: &Session) -> Result<SessionId, StorageError> {
        let id = self
            .insert("sessions", &SessionBody::from_session(session))
            .await?;
        Ok(SessionId::new(id))
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        self.fetch_sessions(("id", format!("eq.{id}")))
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError> {
        self.fetch_sessions(("owner", format!("eq.{owner}"))).await
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let id = session.id().ok_or(StorageError::NotFound)?;
        self.touch(
            reqwest::Method::PATCH,
            "sessions",
            id.value(),
            Some(&SessionBody::from_session(session)),
        )
        .await
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        self.touch::<()>(reqwest::Method::DELETE, "sessions", id.value(), None)
            .await
    }
}

#[async_trait]
impl SeriesRepository for RestRepository {
    async fn create_series(
        &self,
        session_id: SessionId,
        number: u32,
        score: u32,
    ) -> Result<SeriesId, StorageError> {
        let body = SeriesBody {
            session_id: session_id.value(),
            number,
            score,
        };
        Ok(SeriesId::new(self.insert("series", &body).await?))
    }

    async fn update_series_score(&self, id: SeriesId, score: u32) -> Result<(), StorageError> {
        let body = serde_json::json!({ "score": score });
        self.touch(reqwest::Method::PATCH, "series", id.value(), Some(&body))
            .await
    }
}

#[async_trait]
impl ArrowRepository for RestRepository {
    async fn create_arrow(
        &self,
        series_id: SeriesId,
        order: u32,
        arrow: &Arrow,
    ) -> Result<ArrowId, StorageError> {
        let body = arrow_body(Some((series_id, order)), arrow);
        Ok(ArrowId::new(self.insert("arrows", &body).await?))
    }

    async fn update_arrow(&self, id: ArrowId, arrow: &Arrow) -> Result<(), StorageError> {
        let body = arrow_body(None, arrow);
        self.touch(reqwest::Method::PATCH, "arrows", id.value(), Some(&body))
            .await
    }

    async fn delete_arrow(&self, id: ArrowId) -> Result<(), StorageError> {
        self.touch::<()>(reqwest::Method::DELETE, "arrows", id.value(), None)
            .await
    }
}

fn arrow_body(parent: Option<(SeriesId, u32)>, arrow: &Arrow) -> ArrowBody {
    ArrowBody {
        series_id: parent.map(|(series, _)| series.value()),
        ord: parent.map(|(_, order)| order),
        score: arrow.score.value(),
        x: arrow.position.map(|p| p.x),
        y: arrow.position.map(|p| p.y),
    }
}

#[async_trait]
impl AssessmentRepository for RestRepository {
    async fn save_assessment(
        &self,
        session_id: SessionId,
        assessment: &SelfAssessment,
    ) -> Result<(), StorageError> {
        let builder = self
            .request(reqwest::Method::POST, "self_assessments")
            .query(&[("on_conflict", "session_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&AssessmentRow::from_assessment(session_id, assessment));
        let response = builder.send().await.map_err(http)?;
        check(&response)
    }
}

impl Storage {
    /// Build a `Storage` backed by a remote HTTP API.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn rest(config: RestConfig) -> Result<Self, StorageError> {
        Ok(Self::from_repository(RestRepository::new(config)?))
    }
}
