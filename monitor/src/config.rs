use anyhow::Context;
use jarcore::catalog::JarCatalog;
use jarcore::tracker::DEFAULT_LOG_RETENTION;
use jarcore::Thresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub bind: SocketAddr,
    /// Skip the serial device and synthesize readings.
    pub mock: bool,
    pub mock_seed: Option<u64>,
    pub live_poll_ms: u64,
    pub mock_poll_ms: u64,
    pub error_backoff_ms: u64,
    pub stream_poll_ms: u64,
    pub thresholds: Thresholds,
    pub log_default_limit: usize,
    pub log_max_limit: usize,
    pub log_retention: usize,
    pub catalog: JarCatalog,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".into(),
            baud_rate: 115_200,
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            mock: false,
            mock_seed: None,
            live_poll_ms: 100,
            mock_poll_ms: 1_000,
            error_backoff_ms: 1_000,
            stream_poll_ms: 200,
            thresholds: Thresholds::default(),
            log_default_limit: 50,
            log_max_limit: 100,
            log_retention: DEFAULT_LOG_RETENTION,
            catalog: JarCatalog::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading monitor config {}", path_ref.display()))?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing monitor config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn live_poll(&self) -> Duration {
        Duration::from_millis(self.live_poll_ms)
    }

    pub fn mock_poll(&self) -> Duration {
        Duration::from_millis(self.mock_poll_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stream_poll(&self) -> Duration {
        Duration::from_millis(self.stream_poll_ms.max(1))
    }

    /// Clamps a requested log tail length to the configured bounds.
    pub fn log_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.log_default_limit)
            .min(self.log_max_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarcore::Row;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_firmware_and_dashboard() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.live_poll(), Duration::from_millis(100));
        assert_eq!(cfg.mock_poll(), Duration::from_secs(1));
        assert_eq!(cfg.catalog.total_jars(), 9);
    }

    #[test]
    fn log_limit_is_clamped() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.log_limit(None), 50);
        assert_eq!(cfg.log_limit(Some(80)), 80);
        assert_eq!(cfg.log_limit(Some(5_000)), 100);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"serial_port: /dev/cu.usbmodem101\nmock: true\nmock_seed: 7\nthresholds:\n  lower: 25.0\n  upper: 45.0\ncatalog:\n  1: [A1, A2]\n  2: [B1]\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = MonitorConfig::load(&path).unwrap();
        assert_eq!(cfg.serial_port, "/dev/cu.usbmodem101");
        assert!(cfg.mock);
        assert_eq!(cfg.mock_seed, Some(7));
        assert_eq!(cfg.thresholds.lower, 25.0);
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.catalog.correct_row("B1"), Some(Row::TWO));
    }

    #[test]
    fn config_load_rejects_unknown_rows() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"catalog:\n  3: [C1]\n").unwrap();
        let path = temp.into_temp_path();
        assert!(MonitorConfig::load(&path).is_err());
    }
}
