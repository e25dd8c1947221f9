use crate::prelude::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOWER_THRESHOLD: f64 = 30.0;
pub const DEFAULT_UPPER_THRESHOLD: f64 = 40.0;

const HEADER_PREFIX: &str = "Dist1";

/// Distance band reported by the sensor firmware, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_THRESHOLD,
            upper: DEFAULT_UPPER_THRESHOLD,
        }
    }
}

/// One sample from both ultrasonic sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub dist1: f64,
    pub state1: bool,
    pub dist2: f64,
    pub state2: bool,
    pub lower: f64,
    pub upper: f64,
    pub received_at: DateTime<Utc>,
}

/// Why a wire line was dropped instead of producing a reading.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("empty line")]
    Empty,
    #[error("header line")]
    Header,
    #[error("incomplete line with {0} fields")]
    Incomplete(usize),
    #[error("unparseable field {index}: {value:?}")]
    InvalidField { index: usize, value: String },
}

impl Reading {
    pub fn new(
        dist1: f64,
        state1: bool,
        dist2: f64,
        state2: bool,
        thresholds: Thresholds,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dist1,
            state1,
            dist2,
            state2,
            lower: thresholds.lower,
            upper: thresholds.upper,
            received_at,
        }
    }

    /// Parses `dist1,state1,dist2,state2[,lower,upper]`.
    ///
    /// Raw state values above zero count as "needs checking"; the firmware
    /// sends `50`/`0`. Threshold fields fall back to `defaults` when absent.
    pub fn parse_line(
        line: &str,
        defaults: Thresholds,
        received_at: DateTime<Utc>,
    ) -> Result<Self, LineError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(LineError::Empty);
        }
        if line.starts_with(HEADER_PREFIX) {
            return Err(LineError::Header);
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(LineError::Incomplete(fields.len()));
        }

        let dist1 = parse_float(&fields, 0)?;
        let state1 = parse_state(&fields, 1)?;
        let dist2 = parse_float(&fields, 2)?;
        let state2 = parse_state(&fields, 3)?;
        let lower = if fields.len() > 4 {
            parse_float(&fields, 4)?
        } else {
            defaults.lower
        };
        let upper = if fields.len() > 5 {
            parse_float(&fields, 5)?
        } else {
            defaults.upper
        };

        Ok(Self::new(
            dist1,
            state1,
            dist2,
            state2,
            Thresholds { lower, upper },
            received_at,
        ))
    }

    pub fn state(&self, row: Row) -> bool {
        if row == Row::ONE {
            self.state1
        } else {
            self.state2
        }
    }

    pub fn distance(&self, row: Row) -> f64 {
        if row == Row::ONE {
            self.dist1
        } else {
            self.dist2
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            lower: self.lower,
            upper: self.upper,
        }
    }

    /// Compares sensor values only, ignoring when the sample arrived.
    pub fn same_values(&self, other: &Reading) -> bool {
        self.dist1 == other.dist1
            && self.state1 == other.state1
            && self.dist2 == other.dist2
            && self.state2 == other.state2
            && self.lower == other.lower
            && self.upper == other.upper
    }
}

fn invalid(fields: &[&str], index: usize) -> LineError {
    LineError::InvalidField {
        index,
        value: fields[index].to_string(),
    }
}

fn parse_float(fields: &[&str], index: usize) -> Result<f64, LineError> {
    fields[index]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| invalid(fields, index))
}

fn parse_state(fields: &[&str], index: usize) -> Result<bool, LineError> {
    fields[index]
        .parse::<i64>()
        .map(|raw| raw > 0)
        .map_err(|_| invalid(fields, index))
}
