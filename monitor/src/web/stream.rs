use futures::{Stream, StreamExt};
use jarcore::{MonitorState, Reading};
use log::warn;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Polls the latest reading every `period` and yields it whenever its
/// sensor values differ from the last one yielded. Ends once `cancel` fires.
pub fn reading_changes(
    state: Arc<MonitorState>,
    period: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Reading> + Send + 'static {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures::stream::unfold(
        (ticker, None::<Reading>),
        move |(mut ticker, last): (Interval, Option<Reading>)| {
            let state = state.clone();
            let cancel = cancel.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = ticker.tick() => {}
                    }
                    let Some(current) = state.latest() else {
                        continue;
                    };
                    let changed = last
                        .as_ref()
                        .map_or(true, |previous| !previous.same_values(&current));
                    if changed {
                        return Some((current.clone(), (ticker, Some(current))));
                    }
                }
            }
        },
    )
}

/// Server-sent event stream of reading changes.
pub fn reading_events(
    state: Arc<MonitorState>,
    period: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<warp::sse::Event, Infallible>> + Send + 'static {
    reading_changes(state, period, cancel).filter_map(|reading| async move {
        match warp::sse::Event::default().json_data(&reading) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!("Could not encode reading for stream: {}", err);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jarcore::Thresholds;
    use tokio::time::timeout;

    fn reading(dist1: f64) -> Reading {
        Reading::new(dist1, false, 50.0, false, Thresholds::default(), Utc::now())
    }

    #[tokio::test]
    async fn yields_only_when_values_change() {
        let state = Arc::new(MonitorState::default());
        let stream = reading_changes(state.clone(), Duration::from_millis(5), CancellationToken::new());
        futures::pin_mut!(stream);

        state.apply_reading(reading(50.0));
        let first = timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap();
        assert_eq!(first.dist1, 50.0);

        // Same values with a newer timestamp are not pushed again.
        state.apply_reading(reading(50.0));
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());

        state.apply_reading(reading(42.5));
        let next = timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap();
        assert_eq!(next.dist1, 42.5);
    }

    #[tokio::test]
    async fn waits_for_first_reading() {
        let state = Arc::new(MonitorState::default());
        let stream = reading_changes(state, Duration::from_millis(5), CancellationToken::new());
        futures::pin_mut!(stream);
        assert!(timeout(Duration::from_millis(40), stream.next()).await.is_err());
    }

    #[tokio::test]
    async fn ends_when_cancelled() {
        let state = Arc::new(MonitorState::default());
        let cancel = CancellationToken::new();
        let stream = reading_changes(state.clone(), Duration::from_millis(5), cancel.clone());
        futures::pin_mut!(stream);

        state.apply_reading(reading(50.0));
        assert!(timeout(Duration::from_secs(1), stream.next()).await.unwrap().is_some());

        cancel.cancel();
        let ended = timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert!(ended.is_none());
    }
}
