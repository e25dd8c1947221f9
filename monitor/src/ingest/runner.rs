use crate::source::{Frame, ReadingSource, SourceError};
use chrono::Utc;
use jarcore::telemetry::IngestMetrics;
use jarcore::{LineError, MonitorState, Reading, Thresholds};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of pulling one frame from the source.
#[derive(Debug)]
pub enum StepOutcome {
    Applied,
    Discarded(LineError),
    Idle,
    Failed(SourceError),
}

/// Drives a [`ReadingSource`] into the shared [`MonitorState`].
pub struct IngestRunner {
    source: Box<dyn ReadingSource>,
    state: Arc<MonitorState>,
    metrics: Arc<IngestMetrics>,
    thresholds: Thresholds,
    backoff: Duration,
}

impl IngestRunner {
    pub fn new(
        source: Box<dyn ReadingSource>,
        state: Arc<MonitorState>,
        metrics: Arc<IngestMetrics>,
        thresholds: Thresholds,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            state,
            metrics,
            thresholds,
            backoff,
        }
    }

    /// Pulls and applies a single frame. Blocks for as long as the source does.
    pub fn step(&mut self) -> StepOutcome {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.metrics.record_error();
                return StepOutcome::Failed(err);
            }
        };

        let reading = match frame {
            Frame::Idle => return StepOutcome::Idle,
            Frame::Reading(reading) => reading,
            Frame::Line(line) => match Reading::parse_line(&line, self.thresholds, Utc::now()) {
                Ok(reading) => reading,
                Err(err) => {
                    match &err {
                        LineError::Empty | LineError::Header => {}
                        LineError::Incomplete(_) => warn!("Incomplete data received: {:?}", line),
                        LineError::InvalidField { .. } => {
                            debug!("Dropping line {:?}: {}", line, err)
                        }
                    }
                    self.metrics.record_discarded();
                    return StepOutcome::Discarded(err);
                }
            },
        };

        let events = self.state.apply_reading(reading);
        self.metrics.record_reading(events.len());
        StepOutcome::Applied
    }

    /// Runs until `cancel` fires. Transport errors are logged and retried
    /// after the backoff; nothing else stops the loop.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Ingest loop started on {}", self.source.describe());
        let mut runner = self;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let joined = tokio::task::spawn_blocking(move || {
                let outcome = runner.step();
                (runner, outcome)
            })
            .await;
            let outcome = match joined {
                Ok((returned, outcome)) => {
                    runner = returned;
                    outcome
                }
                Err(err) => {
                    error!("Ingest step panicked: {}", err);
                    return;
                }
            };

            let pause = match outcome {
                StepOutcome::Applied => runner.source.poll_interval(),
                StepOutcome::Failed(err) => {
                    error!("Sensor read error: {}", err);
                    runner.backoff
                }
                StepOutcome::Discarded(_) | StepOutcome::Idle => Duration::ZERO,
            };

            if pause.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("Ingest loop shutting down");
    }
}
