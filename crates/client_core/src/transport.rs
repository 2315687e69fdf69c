//! HTTP transport to the rendering service.
//!
//! One round trip per operation; retry policy belongs to the callers (the
//! poll scheduler retries by scheduling the next tick, the one-shot paths do
//! not retry at all).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

use shared::{
    domain::{JobId, RenderArtifact, RenderParameters},
    protocol::{JobStatusPayload, SubmitJobResponse},
};

const SUBMIT_PATH: &str = "lissajous";
const STATUS_PATH: &str = "status";
const RESULT_PATH: &str = "result";
const JSON_CONTENT_TYPE: &str = "application/json";
const FALLBACK_ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";

/// Failure of a single transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service responded with {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    /// A response arrived but did not match the expected shape.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Outbound operations against the rendering service.
///
/// The controllers only see this trait, so tests can script a backend without
/// a network in the way.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn submit_job(&self, params: &RenderParameters) -> Result<JobId, TransportError>;
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatusPayload, TransportError>;
    async fn fetch_artifact(&self, job_id: &JobId) -> Result<RenderArtifact, TransportError>;
    async fn render_sync(&self, params: &RenderParameters) -> Result<RenderArtifact, TransportError>;
}

#[derive(Debug, Error)]
pub enum HttpBackendError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("server url '{0}' cannot carry request paths")]
    NotABaseUrl(String),
    #[error("failed to build http client: {0}")]
    ClientBuild(reqwest::Error),
}

/// reqwest-backed implementation speaking the service's wire contract.
#[derive(Debug)]
pub struct HttpRenderBackend {
    http: Client,
    base: Url,
}

impl HttpRenderBackend {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self, HttpBackendError> {
        let base = Url::parse(server_url).map_err(|source| HttpBackendError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;
        if base.cannot_be_a_base() {
            return Err(HttpBackendError::NotABaseUrl(server_url.to_string()));
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(HttpBackendError::ClientBuild)?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn submit_job(&self, params: &RenderParameters) -> Result<JobId, TransportError> {
        let res = self
            .http
            .post(self.endpoint(&[SUBMIT_PATH]))
            .header(header::ACCEPT, JSON_CONTENT_TYPE)
            .form(params)
            .send()
            .await?;
        let res = check_success(res).await?;

        let payload: SubmitJobResponse = res.json().await.map_err(|err| {
            TransportError::Protocol(format!("undecodable submit response: {err}"))
        })?;
        let job_id = payload
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TransportError::Protocol("submit response carried no job id".into()))?;

        debug!(job_id = %job_id, "render job submitted");
        Ok(JobId(job_id))
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatusPayload, TransportError> {
        let res = self
            .http
            .get(self.endpoint(&[SUBMIT_PATH, STATUS_PATH, job_id.0.as_str()]))
            .send()
            .await?;
        let res = check_success(res).await?;

        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(JSON_CONTENT_TYPE) {
            return Err(TransportError::Protocol(format!(
                "unexpected status content type '{content_type}'"
            )));
        }

        res.json()
            .await
            .map_err(|err| TransportError::Protocol(format!("undecodable status payload: {err}")))
    }

    async fn fetch_artifact(&self, job_id: &JobId) -> Result<RenderArtifact, TransportError> {
        let mut url = self.endpoint(&[SUBMIT_PATH, RESULT_PATH]);
        url.query_pairs_mut().append_pair("id", &job_id.0);
        let res = self.http.get(url).send().await?;
        let res = check_success(res).await?;

        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_ARTIFACT_CONTENT_TYPE)
            .to_string();
        let bytes = res.bytes().await?.to_vec();

        debug!(job_id = %job_id, bytes = bytes.len(), %content_type, "fetched render artifact");
        Ok(RenderArtifact {
            bytes,
            content_type,
        })
    }

    async fn render_sync(&self, params: &RenderParameters) -> Result<RenderArtifact, TransportError> {
        let res = self
            .http
            .get(self.endpoint(&[SUBMIT_PATH]))
            .query(params)
            .send()
            .await?;
        let res = check_success(res).await?;

        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_ARTIFACT_CONTENT_TYPE)
            .to_string();
        let bytes = res.bytes().await?.to_vec();
        Ok(RenderArtifact {
            bytes,
            content_type,
        })
    }
}

async fn check_success(res: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let detail = res.text().await.unwrap_or_default().trim().to_string();
    Err(TransportError::Status { status, detail })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
