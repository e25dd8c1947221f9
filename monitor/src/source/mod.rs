//! Where sensor data comes from: the serial-attached microcontroller or a
//! synthetic generator used when no hardware is available.

pub mod mock;
pub mod serial;

use crate::config::MonitorConfig;
use jarcore::Reading;
use log::{info, warn};
use std::time::Duration;

pub use mock::MockSource;
pub use serial::SerialSource;

/// One unit of output from a [`ReadingSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Raw wire text, still to be parsed.
    Line(String),
    /// Reading produced directly by the source.
    Reading(Reading),
    /// Nothing arrived before the read timed out.
    Idle,
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Blocking producer of sensor frames.
pub trait ReadingSource: Send {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;

    /// Pause between consecutive readings.
    fn poll_interval(&self) -> Duration;

    fn mode(&self) -> SourceMode;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Serial,
    Mock,
}

/// Picks the live transport unless mock mode is configured or the device
/// cannot be opened, in which case the synthetic generator takes over.
pub fn select_source(config: &MonitorConfig) -> Box<dyn ReadingSource> {
    if config.mock {
        info!("Mock mode enabled; synthesizing sensor readings");
        return Box::new(MockSource::from_config(config));
    }

    let mut serial = SerialSource::new(&config.serial_port, config.baud_rate, config.live_poll());
    match serial.connect() {
        Ok(()) => {
            info!("Connected to sensor board on {}", config.serial_port);
            Box::new(serial)
        }
        Err(err) => {
            warn!(
                "Could not open {} ({}); running in mock mode",
                config.serial_port, err
            );
            Box::new(MockSource::from_config(config))
        }
    }
}
