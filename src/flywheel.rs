use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::{Acquisition, AcquisitionHit, Project, Session, Subject};
use crate::error::ScantabError;

/// Result-count cap passed to the data-explorer endpoint on the incremental
/// path. The server will not return more hits than this.
pub const SEARCH_LIMIT: usize = 10_000;

pub trait FlywheelClient: Send + Sync {
    fn lookup_project(&self, label: &str) -> Result<Project, ScantabError>;
    fn subjects(&self, project_id: &str) -> Result<Vec<Subject>, ScantabError>;
    fn sessions(&self, subject_id: &str) -> Result<Vec<Session>, ScantabError>;
    /// Refresh a session from the server before iterating its acquisitions.
    fn reload_session(&self, session_id: &str) -> Result<Session, ScantabError>;
    fn acquisitions(&self, session_id: &str) -> Result<Vec<Acquisition>, ScantabError>;
    /// Refresh an acquisition from the server; the reloaded document carries
    /// the full file list with per-file info mappings.
    fn reload_acquisition(&self, acquisition_id: &str) -> Result<Acquisition, ScantabError>;
    fn search_acquisitions(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AcquisitionHit>, ScantabError>;
}

#[derive(Clone)]
pub struct FlywheelHttpClient {
    client: Client,
    base_url: String,
}

impl FlywheelHttpClient {
    /// Build a client from the ambient `FLYWHEEL_API_KEY` (`host[:port]:key`)
    /// and validate the session with one call to `/users/self`. Missing or
    /// rejected credentials fail here, before any extraction starts.
    pub fn new() -> Result<Self, ScantabError> {
        let api_key = std::env::var("FLYWHEEL_API_KEY").map_err(|_| {
            ScantabError::Authentication("FLYWHEEL_API_KEY is not set".to_string())
        })?;
        let (host, key) = api_key.trim().rsplit_once(':').ok_or_else(|| {
            ScantabError::Authentication("API key must look like host[:port]:key".to_string())
        })?;
        if host.is_empty() || key.is_empty() {
            return Err(ScantabError::Authentication(
                "API key must look like host[:port]:key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("scantab/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ScantabError::Http(err.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("scitran-user {key}"))
                .map_err(|err| ScantabError::Authentication(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ScantabError::Http(err.to_string()))?;

        let built = Self {
            client,
            base_url: format!("https://{host}/api"),
        };
        built.validate_session()?;
        Ok(built)
    }

    fn validate_session(&self) -> Result<(), ScantabError> {
        let url = format!("{}/users/self", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ScantabError::Authentication(format!(
                "Flywheel rejected the API key (status {})",
                status.as_u16()
            )));
        }
        Self::handle_status(response).map(|_| ())
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ScantabError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Flywheel request failed".to_string());
        Err(ScantabError::Status { status, message })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ScantabError> {
        debug!(url, "flywheel GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| ScantabError::Http(err.to_string()))
    }
}

impl FlywheelClient for FlywheelHttpClient {
    fn lookup_project(&self, label: &str) -> Result<Project, ScantabError> {
        let url = format!("{}/projects", self.base_url);
        debug!(%url, label, "flywheel project lookup");
        let response = self
            .client
            .get(&url)
            .query(&[("filter", format!("label={label}")), ("limit", "1".into())])
            .send()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let mut projects: Vec<Project> = response
            .json()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        if projects.is_empty() {
            return Err(ScantabError::ProjectNotFound(label.to_string()));
        }
        Ok(projects.remove(0))
    }

    fn subjects(&self, project_id: &str) -> Result<Vec<Subject>, ScantabError> {
        self.get_json(&format!("{}/projects/{project_id}/subjects", self.base_url))
    }

    fn sessions(&self, subject_id: &str) -> Result<Vec<Session>, ScantabError> {
        self.get_json(&format!("{}/subjects/{subject_id}/sessions", self.base_url))
    }

    fn reload_session(&self, session_id: &str) -> Result<Session, ScantabError> {
        self.get_json(&format!("{}/sessions/{session_id}", self.base_url))
    }

    fn acquisitions(&self, session_id: &str) -> Result<Vec<Acquisition>, ScantabError> {
        self.get_json(&format!(
            "{}/sessions/{session_id}/acquisitions",
            self.base_url
        ))
    }

    fn reload_acquisition(&self, acquisition_id: &str) -> Result<Acquisition, ScantabError> {
        self.get_json(&format!(
            "{}/acquisitions/{acquisition_id}",
            self.base_url
        ))
    }

    fn search_acquisitions(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AcquisitionHit>, ScantabError> {
        let url = format!("{}/dataexplorer/search", self.base_url);
        debug!(%url, query, limit, "flywheel structured query");
        let response = self
            .client
            .post(&url)
            .query(&[("size", limit.to_string()), ("simple", "false".into())])
            .json(&json!({
                "return_type": "acquisition",
                "structured_query": query,
            }))
            .send()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: SearchResponse = response
            .json()
            .map_err(|err| ScantabError::Http(err.to_string()))?;
        Ok(body
            .results
            .into_iter()
            .map(|hit| AcquisitionHit {
                acquisition_id: hit.source.acquisition.id,
                subject_code: hit.source.subject.code,
                session_label: hit.source.session.label,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: SearchSource,
}

#[derive(Debug, Deserialize)]
struct SearchSource {
    acquisition: SearchAcquisition,
    subject: SearchSubject,
    session: SearchSession,
}

#[derive(Debug, Deserialize)]
struct SearchAcquisition {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchSubject {
    code: String,
}

#[derive(Debug, Deserialize)]
struct SearchSession {
    label: String,
}
