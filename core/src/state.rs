use crate::catalog::{JarBook, JarCatalog, JarRecord, JarStatus, JarSummary, MisplacedReport};
use crate::prelude::{MonitorResult, Row};
use crate::reading::Reading;
use crate::tracker::{AlertTracker, Event, EventLog};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Inner {
    latest: Option<Reading>,
    tracker: AlertTracker,
    log: EventLog,
    jars: JarBook,
}

/// Shared monitor state handed to the ingest task and the HTTP handlers.
///
/// A single lock covers everything, so a reader never sees a reading whose
/// alerts and events have not been applied yet.
pub struct MonitorState {
    inner: RwLock<Inner>,
}

impl MonitorState {
    pub fn new(catalog: JarCatalog, log_retention: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                latest: None,
                tracker: AlertTracker::new(),
                log: EventLog::with_retention(log_retention),
                jars: JarBook::new(catalog),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `reading` as the latest sample and runs it through the alert
    /// tracker. Returns the events that fired.
    pub fn apply_reading(&self, reading: Reading) -> Vec<Event> {
        let mut guard = self.write();
        let events = guard.tracker.observe_reading(&reading);
        for event in &events {
            info!(
                "Row {} needs checking (distance: {:.1} cm)",
                event.row, event.distance
            );
            guard.log.push(event.clone());
        }
        guard.latest = Some(reading);
        events
    }

    pub fn latest(&self) -> Option<Reading> {
        self.read().latest.clone()
    }

    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        self.read().log.tail(limit)
    }

    pub fn total_events(&self) -> usize {
        self.read().log.total()
    }

    pub fn alerts(&self) -> BTreeMap<Row, bool> {
        self.read().tracker.alerts().into_iter().collect()
    }

    pub fn clear_alert(&self, row: Row) {
        self.write().tracker.clear(row);
        info!("Alert cleared for row {}", row);
    }

    pub fn jar_statuses(&self, row: Row) -> MonitorResult<BTreeMap<String, JarRecord>> {
        self.read().jars.row_status(row)
    }

    pub fn set_jar_status(
        &self,
        jar: &str,
        status: JarStatus,
        row: Row,
        time: DateTime<Utc>,
    ) -> MonitorResult<()> {
        self.write().jars.set_status(jar, status, row, time)
    }

    pub fn report_misplaced(&self, jar: &str, found_in: Row, time: DateTime<Utc>) -> MisplacedReport {
        self.write().jars.report_misplaced(jar, found_in, time)
    }

    pub fn jar_summary(&self) -> JarSummary {
        self.read().jars.summary()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(JarCatalog::default(), crate::tracker::DEFAULT_LOG_RETENTION)
    }
}
