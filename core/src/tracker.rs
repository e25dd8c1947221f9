use crate::prelude::Row;
use crate::reading::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const NEEDS_CHECKING: &str = "Needs checking";

/// Default number of events kept in memory.
pub const DEFAULT_LOG_RETENTION: usize = 10_000;

/// Row-level event raised when a sensor enters the "needs checking" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub row: Row,
    pub event: String,
    pub distance: f64,
}

impl Event {
    pub fn needs_checking(row: Row, distance: f64, time: DateTime<Utc>) -> Self {
        Self {
            time,
            row,
            event: NEEDS_CHECKING.to_string(),
            distance: round_tenths(distance),
        }
    }
}

/// Rounds to one decimal the way the recorded distances always have: on the
/// exact binary value, with exact halves going to the even digit. `2.35` is
/// stored slightly above the half and rounds up; `24.25` is an exact half and
/// rounds down.
fn round_tenths(value: f64) -> f64 {
    let scaled = value * 10.0;
    if (scaled - scaled.trunc()).abs() != 0.5 {
        return scaled.round() / 10.0;
    }
    // `scaled` may itself be rounded; the fused residual recovers which side
    // of the half the exact product lies on.
    let residual = value.mul_add(10.0, -scaled);
    let rounded = if residual > 0.0 {
        scaled.ceil()
    } else if residual < 0.0 {
        scaled.floor()
    } else {
        let floor = scaled.floor();
        if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    };
    rounded / 10.0
}

/// Append-only event history.
///
/// `total` counts every event ever appended; only the newest `retention`
/// entries stay in memory, which is far beyond any tail the API exposes.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<Event>,
    retention: usize,
    total: usize,
}

impl EventLog {
    pub fn with_retention(retention: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            retention: retention.max(1),
            total: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.entries.len() == self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
        self.total += 1;
    }

    /// Most recent `limit` events, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<Event> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_LOG_RETENTION)
    }
}

/// Latching edge detector for the per-row "needs checking" state.
///
/// An alert is raised only on a clear -> needs-checking transition and stays
/// raised until [`AlertTracker::clear`] is called.
#[derive(Debug, Clone, Default)]
pub struct AlertTracker {
    previous: [Option<bool>; 2],
    alerts: [bool; 2],
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one row's state; returns the event when it fires.
    pub fn observe(
        &mut self,
        row: Row,
        state: bool,
        distance: f64,
        time: DateTime<Utc>,
    ) -> Option<Event> {
        let slot = row.index();
        let fired = self.previous[slot] == Some(false) && state;
        self.previous[slot] = Some(state);
        if !fired {
            return None;
        }
        self.alerts[slot] = true;
        Some(Event::needs_checking(row, distance, time))
    }

    /// Feeds both rows of a reading, in row order.
    pub fn observe_reading(&mut self, reading: &Reading) -> Vec<Event> {
        Row::ALL
            .iter()
            .filter_map(|&row| {
                self.observe(
                    row,
                    reading.state(row),
                    reading.distance(row),
                    reading.received_at,
                )
            })
            .collect()
    }

    pub fn clear(&mut self, row: Row) {
        self.alerts[row.index()] = false;
    }

    pub fn is_alerted(&self, row: Row) -> bool {
        self.alerts[row.index()]
    }

    pub fn previous_state(&self, row: Row) -> Option<bool> {
        self.previous[row.index()]
    }

    pub fn alerts(&self) -> Vec<(Row, bool)> {
        Row::ALL.iter().map(|&row| (row, self.is_alerted(row))).collect()
    }
}
