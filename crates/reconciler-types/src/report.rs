//! The JSONL deployment report (`spec.md` §6 "Report format") and the in-process
//! event shape the pub-sub bus (`spec.md` §4.I) carries to its subscribers. Both
//! are the same type: a subscriber that happens to be a file sink serializes the
//! event it received verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// Default report sink filename, overridden by the `DEPLOYMENT_REPORT_FILENAME`
/// environment variable (`spec.md` §6).
pub const DEPLOYMENT_REPORT_FILENAME_ENV: &str = "DEPLOYMENT_REPORT_FILENAME";
pub const DEFAULT_REPORT_FILENAME: &str = "deployment-report.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "DEPLOY")]
    Deploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeployState {
    Success,
    Error,
    Excluded,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetailLevel {
    Warn,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    #[serde(rename = "type")]
    pub level: DetailLevel,
    pub msg: String,
}

impl Detail {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            level: DetailLevel::Info,
            msg: msg.into(),
        }
    }

    pub fn warn(msg: impl Into<String>) -> Self {
        Self {
            level: DetailLevel::Warn,
            msg: msg.into(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            level: DetailLevel::Error,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRef {
    pub project: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "configId")]
    pub config_id: String,
}

impl From<&Coordinate> for ConfigRef {
    fn from(coordinate: &Coordinate) -> Self {
        Self {
            project: coordinate.project.clone(),
            kind: coordinate.kind.clone(),
            config_id: coordinate.config_id.clone(),
        }
    }
}

/// One JSONL record: `{"type":"DEPLOY","time":<epoch>,"config":{...},"state":...,"details":[...],"error":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    #[serde(rename = "type")]
    pub record_type: RecordKind,
    /// Epoch milliseconds.
    pub time: i64,
    pub config: ConfigRef,
    pub state: DeployState,
    #[serde(default)]
    pub details: Vec<Detail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportRecord {
    pub fn new(coordinate: &Coordinate, state: DeployState) -> Self {
        Self {
            record_type: RecordKind::Deploy,
            time: Utc::now().timestamp_millis(),
            config: ConfigRef::from(coordinate),
            state,
            details: Vec::new(),
            error: None,
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time.timestamp_millis();
        self
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.details.push(detail);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Subscriber interface for the pub-sub bus. Subscribers must not block the
/// deployment path beyond bounded buffering (`spec.md` §4.I) — implementations
/// that do file I/O should buffer and flush in their own background worker.
pub trait ReportSubscriber: Send + Sync {
    fn on_record(&self, record: &ReportRecord);
}
