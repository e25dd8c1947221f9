use super::{Frame, ReadingSource, SourceError, SourceMode};
use log::debug;
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Line-oriented reader over the microcontroller's serial port.
///
/// A failed read drops the port; the next call reopens it.
pub struct SerialSource {
    path: String,
    baud_rate: u32,
    poll_interval: Duration,
    port: Option<BufReader<Box<dyn SerialPort>>>,
    pending: Vec<u8>,
}

impl SerialSource {
    pub fn new(path: &str, baud_rate: u32, poll_interval: Duration) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            poll_interval,
            port: None,
            pending: Vec::new(),
        }
    }

    pub fn connect(&mut self) -> Result<(), SourceError> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        self.port = Some(BufReader::new(port));
        self.pending.clear();
        Ok(())
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl ReadingSource for SerialSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if self.port.is_none() {
            debug!("Reopening serial port {}", self.path);
            self.connect()?;
        }
        let Some(port) = self.port.as_mut() else {
            return Err(SourceError::Unavailable(self.path.clone()));
        };

        match port.read_until(b'\n', &mut self.pending) {
            Ok(0) => {
                self.port = None;
                Err(SourceError::Unavailable(format!("{} closed", self.path)))
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                Ok(Frame::Line(line))
            }
            // Partial bytes stay in `pending` until the newline arrives.
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(Frame::Idle),
            Err(err) => {
                self.port = None;
                self.pending.clear();
                Err(err.into())
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Serial
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}
