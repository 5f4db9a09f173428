//! Axum server setup and router configuration.

use std::net::SocketAddr;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    accepting_events: bool,
}

/// Liveness check. Reports `draining` once the pipeline stops accepting events.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let accepting_events = state.pipeline.is_accepting();
    Json(HealthResponse {
        status: if accepting_events {
            "healthy"
        } else {
            "draining"
        },
        version: env!("CARGO_PKG_VERSION"),
        accepting_events,
    })
}

/// Latest snapshot published by the metrics reporter.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pipeline.health())
}

/// Run the server with graceful shutdown support.
///
/// On SIGTERM/SIGINT the app shutdown flag is raised first so open WebSocket
/// streams close, then axum waits for in-flight requests to finish.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_tx.send_replace(true);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use fanpulse_core::{Pipeline, RunningPipeline};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn setup() -> (RunningPipeline, Router) {
        let pipeline = Pipeline::builder().start().await.unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = build_router(AppState::new(pipeline.handle(), shutdown_rx));
        (pipeline, router)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_events(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/events")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn score(id: &str, points: f64) -> Value {
        json!({
            "id": id,
            "type": "score",
            "gameId": "g1",
            "teamId": "t1",
            "playerId": "p1",
            "data": { "points": points }
        })
    }

    #[tokio::test]
    async fn test_health_reports_accepting() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["acceptingEvents"], true);

        pipeline.shutdown().await;
        let (_, body) = send(&router, get("/health")).await;
        assert_eq!(body["status"], "draining");
    }

    #[tokio::test]
    async fn test_metrics_snapshot_shape() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(&router, get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("eventsPerSec").is_some());
        assert!(body["totals"].get("overflowEvictions").is_some());

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_reports_rejected_by_index() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(
            &router,
            post_events(json!([score("e1", 6.0), { "id": "e2", "type": "dance" }])),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["critical"], 1);
        assert_eq!(body["rejected"][0]["index"], 1);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_undecodable_element_does_not_sink_batch() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(
            &router,
            post_events(json!([
                score("e1", 6.0),
                { "id": { "nested": true }, "type": "score" },
                { "id": 42, "type": "timeout", "gameId": "g1", "teamId": "t1", "data": null },
                { "id": "e4", "type": "play", "sequence": "seven" }
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], 2);
        assert_eq!(body["rejected"][0]["index"], 1);
        assert_eq!(body["rejected"][1]["index"], 3);
        assert_eq!(pipeline.handle().metrics().totals().malformed, 2);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_null_data_is_accepted() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(
            &router,
            post_events(json!({
                "id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1", "data": null
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], 1);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_non_json_body_is_unprocessable() {
        let (pipeline, router) = setup().await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/events")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["rejected"][0]["index"], 0);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_all_malformed_is_unprocessable() {
        let (pipeline, router) = setup().await;

        let (status, body) = send(&router, post_events(json!({ "type": "play" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["accepted"], 0);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_after_shutdown_is_unavailable() {
        let (pipeline, router) = setup().await;
        pipeline.shutdown().await;

        let (status, _) = send(&router, post_events(score("e1", 6.0))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_player_and_team_state_after_drain() {
        let (pipeline, router) = setup().await;

        let (status, _) = send(&router, get("/api/v1/players/p1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&router, post_events(json!([score("e1", 6.0), score("e2", 1.0)]))).await;
        pipeline.shutdown().await;

        let (status, body) = send(&router, get("/api/v1/players/p1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["playerId"], "p1");
        assert_eq!(body["fantasyPoints"], 7.0);

        let (status, body) = send(&router, get("/api/v1/teams/t1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"], 7.0);
        assert_eq!(body["events"], 2);

        let (status, _) = send(&router, get("/api/v1/teams/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
