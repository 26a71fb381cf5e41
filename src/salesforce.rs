//! Salesforce REST client - OAuth login, SOQL queries, log body download
//!
//! The pipeline itself only sees the `RecordSource` trait; this module owns
//! authentication, query construction, and transient-failure backoff.

use crate::backoff::{ExponentialBackoff, MaxRetriesExceeded};
use crate::bookmark;
use crate::config::Config;
use crate::records::{AuditRecord, EventLogRecord, QueryResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const API_VERSION: &str = "32.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub enum SourceError {
    Auth(String),
    Http(reqwest::Error),
    Api(String),
    MaxRetries,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err)
    }
}

impl From<MaxRetriesExceeded> for SourceError {
    fn from(_: MaxRetriesExceeded) -> Self {
        SourceError::MaxRetries
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            SourceError::Http(e) => write!(f, "HTTP error: {}", e),
            SourceError::Api(msg) => write!(f, "API error: {}", msg),
            SourceError::MaxRetries => write!(f, "Maximum retry attempts exceeded"),
        }
    }
}

impl std::error::Error for SourceError {}

/// External record source consumed by the sync pipeline.
#[async_trait]
pub trait RecordSource {
    /// All candidate event log records for one category (untimed).
    async fn list_event_logs(&self, event_type: &str) -> Result<Vec<EventLogRecord>, SourceError>;

    /// Audit records created at or after `since` (timed).
    async fn list_audit_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditRecord>, SourceError>;

    /// Raw CSV body for one event log record.
    async fn fetch_log_body(&self, record: &EventLogRecord) -> Result<String, SourceError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct SalesforceClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: String,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
}

impl SalesforceClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let host = config.instance_url.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            token: config.token.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            access_token: None,
        })
    }

    /// OAuth password-grant login. The security token is appended to the
    /// password as Salesforce requires for API users.
    pub async fn login(&mut self) -> Result<(), SourceError> {
        let auth_url = format!("{}/services/oauth2/token", self.base_url);
        let password = format!("{}{}", self.password, self.token);

        let mut params = HashMap::new();
        params.insert("grant_type", "password");
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("username", self.username.as_str());
        params.insert("password", password.as_str());

        let response = self.http.post(&auth_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SourceError::Auth(format!("{}: {}", status, body)));
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Auth(e.to_string()))?;
        match parsed.access_token {
            Some(token) => {
                self.access_token = Some(token);
                log::info!("Authenticated against {}", self.base_url);
                Ok(())
            }
            None => Err(SourceError::Auth(body)),
        }
    }

    fn bearer(&self) -> Result<&str, SourceError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| SourceError::Auth("not logged in".to_string()))
    }

    /// GET with bearer auth and exponential backoff on transient failures
    /// (connection errors and 5xx responses). Client errors surface
    /// immediately.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let token = self.bearer()?.to_string();
        let mut backoff = ExponentialBackoff::new(2, 30, 3);

        loop {
            let result = self
                .http
                .get(url)
                .bearer_auth(&token)
                .header("Accept-Encoding", "gzip")
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_server_error() => {
                    log::warn!("Server error {} from {}", response.status(), url);
                    backoff.sleep().await?;
                }
                Ok(response) if !response.status().is_success() => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(SourceError::Api(format!("{}: {}", status, body)));
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    log::warn!("Transient error fetching {}: {}", url, e);
                    backoff.sleep().await?;
                }
                Err(e) => return Err(SourceError::Http(e)),
            }
        }
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        soql: &str,
    ) -> Result<QueryResponse<T>, SourceError> {
        let url = format!(
            "{}/services/data/v{}/query?q={}",
            self.base_url,
            API_VERSION,
            soql.replace(' ', "+")
        );
        let response = self.get_with_retry(&url).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RecordSource for SalesforceClient {
    async fn list_event_logs(&self, event_type: &str) -> Result<Vec<EventLogRecord>, SourceError> {
        let soql = format!(
            "SELECT Id , EventType , LogFile , LogDate , LogFileLength \
             FROM EventLogFile WHERE EventType = '{}'",
            event_type
        );
        let response: QueryResponse<EventLogRecord> = self.query(&soql).await?;
        Ok(response.records)
    }

    async fn list_audit_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditRecord>, SourceError> {
        let soql = format!(
            "SELECT CreatedBy.Username , CreatedBy.Name , Id , Action , CreatedDate , \
             Display , Section FROM SetupAuditTrail WHERE CreatedDate >= {}",
            bookmark::format_ts(since)
        );
        let response: QueryResponse<AuditRecord> = self.query(&soql).await?;
        Ok(response.records)
    }

    async fn fetch_log_body(&self, record: &EventLogRecord) -> Result<String, SourceError> {
        // LogFile is a URI relative to the instance root
        let url = format!("{}{}", self.base_url, record.log_file);
        let response = self.get_with_retry(&url).await?;
        Ok(response.text().await?)
    }
}
