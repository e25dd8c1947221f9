use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored shelf row. Only rows 1 and 2 carry sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Row(u8);

impl Row {
    pub const ONE: Row = Row(1);
    pub const TWO: Row = Row(2);
    pub const ALL: [Row; 2] = [Row::ONE, Row::TWO];

    pub fn new(value: u8) -> MonitorResult<Self> {
        match value {
            1 | 2 => Ok(Row(value)),
            other => Err(MonitorError::InvalidRow(other.into())),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Row {
    type Error = MonitorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Row::new(value)
    }
}

impl TryFrom<i64> for Row {
    type Error = MonitorError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| MonitorError::InvalidRow(value))
            .and_then(Row::new)
    }
}

impl From<Row> for u8 {
    fn from(row: Row) -> Self {
        row.0
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced to callers of the monitor state API.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("invalid row {0}")]
    InvalidRow(i64),
    #[error("jar {jar} not found in row {row}")]
    UnknownJar { jar: String, row: Row },
    #[error("invalid status {0}")]
    InvalidStatus(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
