use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{PrereqVerdict, RegistrarApi, SaveVerdict, SessionContext};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{RawSection, Section, SectionRecord},
};

/// Registrar client speaking the backend's JSON-over-POST protocol.
#[derive(Debug, Clone)]
pub struct HttpRegistrar {
    client: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct IdBody<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct PrereqBody<'a> {
    id: &'a str,
    prereq: &'a str,
}

#[derive(Serialize)]
struct SaveBody<'a> {
    id: &'a str,
    classes: Vec<SectionRecord>,
}

#[derive(Deserialize)]
struct ConflictBody {
    error: String,
}

impl HttpRegistrar {
    /// Build a client from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build a client against `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("invalid registrar url '{base_url}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client, base })
    }

    /// Base url every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base
            .join(path)
            .map_err(|err| ApiError::Network(format!("invalid endpoint {path}: {err}")))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<reqwest::Response> {
        let url = self.endpoint(path)?;
        debug!(%url, "registrar request");
        let response = self.client.post(url).json(body).send().await?;
        debug!(path, status = response.status().as_u16(), "registrar response");
        Ok(response)
    }

    async fn expect_success(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %body, "registrar error");
        Err(ApiError::Server {
            status: status.as_u16(),
            body,
        })
    }

    /// Read the `{"error": ...}` payload that accompanies a 409.
    async fn conflict_message(response: reqwest::Response) -> String {
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ConflictBody>(&text) {
            Ok(body) => body.error,
            Err(_) => text.trim().to_string(),
        }
    }

    async fn fetch_sections(&self, path: &str, body: &impl Serialize) -> ApiResult<Option<Vec<Section>>> {
        let response = Self::expect_success(self.post(path, body).await?).await?;
        let records: Option<Vec<Value>> = response.json().await?;
        Ok(records.map(|records| normalize_records(records, path)))
    }

    async fn fetch_date(&self, path: &str, ctx: &SessionContext) -> ApiResult<Option<NaiveDateTime>> {
        let body = IdBody {
            id: &ctx.student_id,
        };
        let response = Self::expect_success(self.post(path, &body).await?).await?;
        let raw: Option<String> = response.json().await?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse_date_time(value)
                .map(Some)
                .ok_or_else(|| ApiError::Decode(format!("unreadable date '{value}' from {path}"))),
        }
    }
}

impl RegistrarApi for HttpRegistrar {
    async fn search(&self, query: &str) -> ApiResult<Vec<Section>> {
        let sections = self.fetch_sections("search", &QueryBody { query }).await?;
        Ok(sections.unwrap_or_default())
    }

    async fn check_prerequisite(
        &self,
        ctx: &SessionContext,
        expression: &str,
    ) -> ApiResult<PrereqVerdict> {
        let body = PrereqBody {
            id: &ctx.student_id,
            prereq: expression,
        };
        let response = self.post("checkPrereq", &body).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(PrereqVerdict::NotMet(Self::conflict_message(response).await));
        }
        Self::expect_success(response).await?;
        Ok(PrereqVerdict::Met)
    }

    async fn saved_cart(&self, ctx: &SessionContext) -> ApiResult<Option<Vec<Section>>> {
        let body = IdBody {
            id: &ctx.student_id,
        };
        self.fetch_sections("getCart", &body).await
    }

    async fn save_cart(&self, ctx: &SessionContext, sections: &[Section]) -> ApiResult<SaveVerdict> {
        let body = SaveBody {
            id: &ctx.student_id,
            classes: sections.iter().map(SectionRecord::from).collect(),
        };
        let response = self.post("saveCart", &body).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(SaveVerdict::Conflict(Self::conflict_message(response).await));
        }
        Self::expect_success(response).await?;
        Ok(SaveVerdict::Saved)
    }

    async fn enrollment_date(&self, ctx: &SessionContext) -> ApiResult<Option<NaiveDateTime>> {
        self.fetch_date("getEnrollmentDate", ctx).await
    }

    async fn housing_date(&self, ctx: &SessionContext) -> ApiResult<Option<NaiveDateTime>> {
        self.fetch_date("getHousingDate", ctx).await
    }
}

/// Normalize backend records, skipping the ones that cannot be read.
fn normalize_records(records: Vec<Value>, source: &str) -> Vec<Section> {
    let total = records.len();
    let sections = records
        .into_iter()
        .filter_map(|record| match decode_record(record) {
            Ok(section) => Some(section),
            Err(err) => {
                warn!(source, "Skipping section record: {err:#}");
                None
            }
        })
        .collect::<Vec<_>>();
    debug!(source, total, kept = sections.len(), "normalized section records");
    sections
}

fn decode_record(record: Value) -> Result<Section> {
    serde_json::from_value::<RawSection>(record)
        .context("unreadable section record")?
        .normalize()
}

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
