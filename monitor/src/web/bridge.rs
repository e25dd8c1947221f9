use crate::config::MonitorConfig;
use crate::source::SourceMode;
use crate::web::model::{
    Ack, Failure, JarStatusUpdate, LogQuery, LogResponse, MisplacedJarReport, MisplacedResponse,
    MonitorStatus, RowJars,
};
use crate::web::stream::reading_events;
use anyhow::Context;
use chrono::Utc;
use jarcore::catalog::JarStatus;
use jarcore::telemetry::IngestMetrics;
use jarcore::{MonitorError, MonitorState, Row};
use log::info;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const DASHBOARD: &str = include_str!("../../assets/dashboard.html");

/// Largest request body accepted by the JSON endpoints.
const MAX_BODY_BYTES: u64 = 16 * 1024;

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn failure(err: &MonitorError, status: StatusCode) -> Response {
    json_reply(&Failure::new(err.to_string()), status)
}

/// Hosts the HTTP surface over the shared monitor state.
#[derive(Clone)]
pub struct WebBridge {
    state: Arc<MonitorState>,
    metrics: Arc<IngestMetrics>,
    config: Arc<MonitorConfig>,
    mode: SourceMode,
    source: String,
    shutdown: CancellationToken,
}

impl WebBridge {
    pub fn new(
        state: Arc<MonitorState>,
        metrics: Arc<IngestMetrics>,
        config: Arc<MonitorConfig>,
        mode: SourceMode,
        source: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            metrics,
            config,
            mode,
            source,
            shutdown,
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let state_for_filter = self.state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let config_for_filter = self.config.clone();
        let config_filter = warp::any().map(move || config_for_filter.clone());
        let shutdown_for_filter = self.shutdown.clone();
        let shutdown_filter = warp::any().map(move || shutdown_for_filter.clone());

        let dashboard = warp::path::end()
            .and(warp::get())
            .map(|| warp::reply::html(DASHBOARD));

        let reading = warp::path("reading")
            .and(warp::path::end())
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<MonitorState>| warp::reply::json(&state.latest()));

        let events = warp::path("events")
            .and(warp::path::end())
            .and(warp::get())
            .and(state_filter.clone())
            .and(config_filter.clone())
            .and(shutdown_filter)
            .map(
                |state: Arc<MonitorState>, config: Arc<MonitorConfig>, shutdown: CancellationToken| {
                    let stream = reading_events(state, config.stream_poll(), shutdown);
                    warp::sse::reply(warp::sse::keep_alive().stream(stream))
                },
            );

        let log = warp::path("log")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<LogQuery>())
            .and(state_filter.clone())
            .and(config_filter)
            .map(
                |query: LogQuery, state: Arc<MonitorState>, config: Arc<MonitorConfig>| {
                    let limit = config.log_limit(query.limit);
                    warp::reply::json(&LogResponse {
                        events: state.recent_events(limit),
                        total: state.total_events(),
                    })
                },
            );

        let alerts = warp::path("alerts")
            .and(warp::path::end())
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<MonitorState>| warp::reply::json(&state.alerts()));

        let clear_alert = warp::path!("alerts" / i64 / "clear")
            .and(warp::post())
            .and(state_filter.clone())
            .map(|row: i64, state: Arc<MonitorState>| match Row::try_from(row) {
                Ok(row) => {
                    state.clear_alert(row);
                    json_reply(&Ack::ok(), StatusCode::OK)
                }
                Err(err) => failure(&err, StatusCode::NOT_FOUND),
            });

        let jar_summary = warp::path!("jars" / "summary")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<MonitorState>| warp::reply::json(&state.jar_summary()));

        let row_jars = warp::path!("jars" / i64)
            .and(warp::get())
            .and(state_filter.clone())
            .map(|row: i64, state: Arc<MonitorState>| {
                match Row::try_from(row).and_then(|row| state.jar_statuses(row)) {
                    Ok(jars) => json_reply(&RowJars { success: true, jars }, StatusCode::OK),
                    Err(err) => failure(&err, StatusCode::NOT_FOUND),
                }
            });

        let set_status = warp::path!("jars" / "status")
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(state_filter.clone())
            .map(|update: JarStatusUpdate, state: Arc<MonitorState>| {
                let result = update.validate().and_then(|(jar, status, row)| {
                    let parsed = JarStatus::from_submission(&status)?;
                    state.set_jar_status(&jar, parsed, row, Utc::now())?;
                    Ok(format!("Jar {} marked as {}", jar, status))
                });
                match result {
                    Ok(message) => json_reply(&Ack::with_message(message), StatusCode::OK),
                    Err(err) => failure(&err, StatusCode::BAD_REQUEST),
                }
            });

        let misplaced = warp::path!("jars" / "misplaced")
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(state_filter)
            .map(|report: MisplacedJarReport, state: Arc<MonitorState>| {
                match report.validate() {
                    Ok((jar, found_in)) => {
                        let outcome = state.report_misplaced(&jar, found_in, Utc::now());
                        info!("Jar {} reported misplaced in row {}", jar, found_in);
                        json_reply(
                            &MisplacedResponse {
                                success: true,
                                message: outcome.message,
                                correct_row: outcome.correct_row,
                            },
                            StatusCode::OK,
                        )
                    }
                    Err(err) => failure(&err, StatusCode::BAD_REQUEST),
                }
            });

        let status_snapshot = MonitorStatusSource {
            metrics: self.metrics.clone(),
            mode: self.mode,
            source: self.source.clone(),
        };
        let status = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || warp::reply::json(&status_snapshot.snapshot()));

        dashboard
            .or(reading)
            .or(events)
            .or(log)
            .or(alerts)
            .or(clear_alert)
            .or(jar_summary)
            .or(row_jars)
            .or(set_status)
            .or(misplaced)
            .or(status)
            .recover(handle_rejection)
    }

    /// Binds the listener. The returned future serves until the shutdown
    /// token fires, then drains in-flight requests; open event streams end
    /// with the same token.
    pub fn bind(self) -> anyhow::Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
        let shutdown = self.shutdown.clone();
        let bind = self.config.bind;
        warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(bind, async move { shutdown.cancelled().await })
            .with_context(|| format!("binding HTTP server to {}", bind))
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let (addr, server) = self.bind()?;
        info!("Dashboard listening on http://{}", addr);
        server.await;
        info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Clone)]
struct MonitorStatusSource {
    metrics: Arc<IngestMetrics>,
    mode: SourceMode,
    source: String,
}

impl MonitorStatusSource {
    fn snapshot(&self) -> MonitorStatus {
        MonitorStatus {
            mode: self.mode,
            source: self.source.clone(),
            metrics: self.metrics.snapshot(),
        }
    }
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(err) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("invalid request body: {}", err))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::BAD_REQUEST, format!("{:?}", rejection))
    };
    Ok(json_reply(&Failure::new(message), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarcore::{Reading, Thresholds};
    use serde_json::{json, Value};

    fn bridge() -> (WebBridge, Arc<MonitorState>) {
        let state = Arc::new(MonitorState::default());
        let bridge = WebBridge::new(
            state.clone(),
            Arc::new(IngestMetrics::new()),
            Arc::new(MonitorConfig::default()),
            SourceMode::Mock,
            "mock generator (1000ms)".into(),
            CancellationToken::new(),
        );
        (bridge, state)
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn raise_row_one(state: &MonitorState) {
        let thresholds = Thresholds::default();
        state.apply_reading(Reading::new(50.0, false, 50.0, false, thresholds, Utc::now()));
        state.apply_reading(Reading::new(21.34, true, 50.0, false, thresholds, Utc::now()));
    }

    #[tokio::test]
    async fn reading_is_null_until_first_sample() {
        let (bridge, state) = bridge();
        let routes = bridge.routes();

        let response = warp::test::request().path("/reading").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), Value::Null);

        raise_row_one(&state);
        let response = warp::test::request().path("/reading").reply(&routes).await;
        assert_eq!(body(&response)["state1"], json!(true));
        assert_eq!(body(&response)["lower"], json!(30.0));
    }

    #[tokio::test]
    async fn alerts_can_be_listed_and_cleared() {
        let (bridge, state) = bridge();
        let routes = bridge.routes();
        raise_row_one(&state);

        let response = warp::test::request().path("/alerts").reply(&routes).await;
        assert_eq!(body(&response), json!({"1": true, "2": false}));

        let response = warp::test::request()
            .method("POST")
            .path("/alerts/1/clear")
            .reply(&routes)
            .await;
        assert_eq!(body(&response), json!({"success": true}));
        assert!(!state.alerts()[&Row::ONE]);

        let response = warp::test::request()
            .method("POST")
            .path("/alerts/3/clear")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["success"], json!(false));
    }

    #[tokio::test]
    async fn log_returns_capped_tail() {
        let (bridge, state) = bridge();
        let routes = bridge.routes();
        let thresholds = Thresholds::default();
        for i in 0..130 {
            let distance = i as f64;
            state.apply_reading(Reading::new(60.0, false, 60.0, false, thresholds, Utc::now()));
            state.apply_reading(Reading::new(distance, true, 60.0, false, thresholds, Utc::now()));
        }

        let response = warp::test::request().path("/log").reply(&routes).await;
        let payload = body(&response);
        assert_eq!(payload["total"], json!(130));
        let events = payload["events"].as_array().unwrap();
        assert_eq!(events.len(), 50);
        assert_eq!(events[0]["distance"], json!(80.0));
        assert_eq!(events[49]["distance"], json!(129.0));
        assert_eq!(events[0]["event"], json!("Needs checking"));

        let response = warp::test::request().path("/log?limit=500").reply(&routes).await;
        assert_eq!(body(&response)["events"].as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn jar_status_round_trip() {
        let (bridge, _) = bridge();
        let routes = bridge.routes();

        let response = warp::test::request()
            .method("POST")
            .path("/jars/status")
            .json(&json!({"jar_id": "R0246", "status": "missing", "row": 2}))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["message"], json!("Jar R0246 marked as missing"));

        let response = warp::test::request().path("/jars/2").reply(&routes).await;
        let payload = body(&response);
        assert_eq!(payload["jars"]["R0246"]["status"], json!("missing"));
        assert_eq!(payload["jars"]["R0244"]["status"], json!("unchecked"));
        assert_eq!(payload["jars"]["R0244"]["time"], Value::Null);

        let response = warp::test::request().path("/jars/9").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_status_updates_are_rejected() {
        let (bridge, _) = bridge();
        let routes = bridge.routes();

        for payload in [
            json!({"jar_id": "R0246", "status": "lost", "row": 2}),
            json!({"jar_id": "R0246", "status": "present", "row": 1}),
            json!({"jar_id": "R0246", "row": 2}),
        ] {
            let response = warp::test::request()
                .method("POST")
                .path("/jars/status")
                .json(&payload)
                .reply(&routes)
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body(&response)["success"], json!(false));
        }

        let response = warp::test::request()
            .method("POST")
            .path("/jars/status")
            .header("content-type", "application/json")
            .body("not json")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["success"], json!(false));
    }

    #[tokio::test]
    async fn misplaced_reports_resolve_catalog_row() {
        let (bridge, _) = bridge();
        let routes = bridge.routes();

        let response = warp::test::request()
            .method("POST")
            .path("/jars/misplaced")
            .json(&json!({"jar": "H004040", "found_in": 2}))
            .reply(&routes)
            .await;
        assert_eq!(
            body(&response),
            json!({"success": true, "message": "Jar H004040 belongs in Row 1", "correct_row": 1})
        );

        let response = warp::test::request()
            .method("POST")
            .path("/jars/misplaced")
            .json(&json!({"jar": "ZZZ", "found_in": 1}))
            .reply(&routes)
            .await;
        let payload = body(&response);
        assert_eq!(payload["correct_row"], Value::Null);
        assert_eq!(payload["message"], json!("Jar not found in database."));

        let response = warp::test::request()
            .method("POST")
            .path("/jars/misplaced")
            .json(&json!({"found_in": 1}))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = warp::test::request().path("/jars/summary").reply(&routes).await;
        let summary = body(&response);
        assert_eq!(summary["misplaced"], json!(2));
        assert_eq!(summary["unchecked"], json!(9));
    }

    #[tokio::test]
    async fn status_reports_source_and_dashboard_is_served() {
        let (bridge, _) = bridge();
        let routes = bridge.routes();

        let response = warp::test::request().path("/status").reply(&routes).await;
        let payload = body(&response);
        assert_eq!(payload["mode"], json!("mock"));
        assert_eq!(payload["metrics"]["readings"], json!(0));

        let response = warp::test::request().path("/").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(String::from_utf8_lossy(response.body()).contains("Jar Tracking"));

        let response = warp::test::request().path("/nowhere").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_closes_open_event_streams() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;
        use tokio::time::{timeout, Duration};

        let state = Arc::new(MonitorState::default());
        let shutdown = CancellationToken::new();
        let config = MonitorConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            stream_poll_ms: 5,
            ..Default::default()
        };
        let bridge = WebBridge::new(
            state.clone(),
            Arc::new(IngestMetrics::new()),
            Arc::new(config),
            SourceMode::Mock,
            "mock".into(),
            shutdown.clone(),
        );
        let (addr, server) = bridge.bind().unwrap();
        let server = tokio::spawn(server);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .unwrap();
        state.apply_reading(Reading::new(
            33.0,
            false,
            50.0,
            false,
            Thresholds::default(),
            Utc::now(),
        ));

        let mut received = Vec::new();
        let mut chunk = [0u8; 1024];
        while !String::from_utf8_lossy(&received).contains("data:") {
            let read = timeout(Duration::from_secs(2), client.read(&mut chunk))
                .await
                .unwrap()
                .unwrap();
            assert!(read > 0, "stream closed before the first reading");
            received.extend_from_slice(&chunk[..read]);
        }

        shutdown.cancel();
        timeout(Duration::from_secs(5), server)
            .await
            .expect("server kept running with an open event stream")
            .unwrap();
    }
}
