use super::{Frame, ReadingSource, SourceError, SourceMode};
use crate::config::MonitorConfig;
use chrono::Utc;
use jarcore::{Reading, Thresholds};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;

/// Ticks between chances of a state flip.
const TOGGLE_PERIOD: u64 = 20;
const TOGGLE_PROBABILITY: f64 = 0.3;

/// Synthetic sensor board: mostly steady rows with an occasional jar
/// placed or removed.
pub struct MockSource {
    rng: StdRng,
    thresholds: Thresholds,
    poll_interval: Duration,
    tick: u64,
    states: [bool; 2],
}

impl MockSource {
    pub fn new(seed: Option<u64>, thresholds: Thresholds, poll_interval: Duration) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            thresholds,
            poll_interval,
            tick: 0,
            states: [false, false],
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.mock_seed, config.thresholds, config.mock_poll())
    }

    fn distance_for(&mut self, state: bool) -> f64 {
        if state {
            self.thresholds.lower - self.rng.gen_range(1.0..8.0)
        } else {
            self.thresholds.upper + self.rng.gen_range(5.0..20.0)
        }
    }

    pub fn generate(&mut self) -> Reading {
        self.tick += 1;
        if self.tick % TOGGLE_PERIOD == 0 {
            for state in self.states.iter_mut() {
                if self.rng.gen_bool(TOGGLE_PROBABILITY) {
                    *state = !*state;
                }
            }
        }

        let [state1, state2] = self.states;
        let dist1 = self.distance_for(state1);
        let dist2 = self.distance_for(state2);
        Reading::new(dist1, state1, dist2, state2, self.thresholds, Utc::now())
    }
}

impl ReadingSource for MockSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        Ok(Frame::Reading(self.generate()))
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Mock
    }

    fn describe(&self) -> String {
        format!("mock generator ({}ms)", self.poll_interval.as_millis())
    }
}
