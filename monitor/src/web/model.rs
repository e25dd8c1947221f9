use crate::source::SourceMode;
use jarcore::catalog::JarRecord;
use jarcore::telemetry::MetricsSnapshot;
use jarcore::{Event, MonitorError, MonitorResult, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    pub events: Vec<Event>,
    pub total: usize,
}

/// Checklist update sent from the row page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JarStatusUpdate {
    pub jar_id: Option<String>,
    pub status: Option<String>,
    pub row: Option<i64>,
}

impl JarStatusUpdate {
    pub fn validate(self) -> MonitorResult<(String, String, Row)> {
        let jar_id = required_text(self.jar_id, "jar_id")?;
        let status = required_text(self.status, "status")?;
        let row = Row::try_from(self.row.ok_or(MonitorError::MissingField("row"))?)?;
        Ok((jar_id, status, row))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MisplacedJarReport {
    pub jar: Option<String>,
    pub found_in: Option<i64>,
}

impl MisplacedJarReport {
    pub fn validate(self) -> MonitorResult<(String, Row)> {
        let jar = required_text(self.jar, "jar")?;
        let found_in = Row::try_from(self.found_in.ok_or(MonitorError::MissingField("found_in"))?)?;
        Ok((jar, found_in))
    }
}

fn required_text(value: Option<String>, field: &'static str) -> MonitorResult<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(MonitorError::MissingField(field))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowJars {
    pub success: bool,
    pub jars: BTreeMap<String, JarRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisplacedResponse {
    pub success: bool,
    pub message: String,
    pub correct_row: Option<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub mode: SourceMode,
    pub source: String,
    pub metrics: MetricsSnapshot,
}
