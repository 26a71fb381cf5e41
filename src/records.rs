//! Record types returned by the Salesforce query API

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope shared by all SOQL query responses.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse<T> {
    #[serde(rename = "totalSize")]
    pub total_size: Option<i64>,
    pub done: Option<bool>,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// One EventLogFile row. The body itself (CSV) is fetched separately via
/// the `log_file` URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "EventType")]
    pub event_type: String,
    #[serde(rename = "LogFile")]
    pub log_file: String,
    #[serde(rename = "LogDate")]
    pub log_date: String,
    #[serde(rename = "LogFileLength")]
    pub log_file_length: Option<f64>,
}

impl EventLogRecord {
    /// Date portion of `log_date`, used in artifact filenames.
    pub fn date_part(&self) -> &str {
        match self.log_date.split_once('T') {
            Some((date, _)) => date,
            None => &self.log_date,
        }
    }
}

/// One SetupAuditTrail row. Fields beyond the ones the pipeline interprets
/// are carried in `extra` and emitted downstream untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Action")]
    pub action: Option<String>,
    #[serde(rename = "Section")]
    pub section: Option<String>,
    #[serde(rename = "CreatedDate")]
    pub created_date: String,
    #[serde(rename = "Display")]
    pub display: Option<String>,
    #[serde(rename = "CreatedBy")]
    pub created_by: Option<CreatedBy>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBy {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Username")]
    pub username: Option<String>,
}

impl AuditRecord {
    /// Creation time at second precision.
    ///
    /// Salesforce emits `2024-03-01T12:34:56.000+0000`; the fractional part
    /// and offset are accepted but truncated to the bookmark's precision.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_date.trim();
        if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(ts.with_timezone(&Utc));
        }
        // Bare second-precision form with a literal Z
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
