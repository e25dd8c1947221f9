//! Row alert tracking and jar checklist state for the ultrasonic jar monitor.
//!
//! Sensor lines are parsed into [`Reading`]s, run through a latching edge
//! detector per row, and kept together with the jar checklist in a single
//! [`MonitorState`] that the ingest loop and HTTP handlers share.

pub mod catalog;
pub mod prelude;
pub mod reading;
pub mod state;
pub mod telemetry;
pub mod tracker;

pub use prelude::{MonitorError, MonitorResult, Row};
pub use reading::{LineError, Reading, Thresholds};
pub use state::MonitorState;
pub use tracker::{AlertTracker, Event, EventLog};
