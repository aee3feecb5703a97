use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State as AxumState;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tracing::{debug, error};

use crate::dispatch::dispatch;
use crate::state::State;
use crate::stats;

pub(crate) fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/healthz", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

/// Every event gets a 200 with a short plain-text reason, including bodies
/// that are not JSON. Dispatch runs on its own task so a client that hangs
/// up early does not cancel a command halfway.
async fn handle_event(AxumState(state): AxumState<Arc<State>>, body: Bytes) -> &'static str {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        debug!(len = body.len(), "Event body is not JSON: {e}");
        Value::Null
    });
    let task = tokio::spawn(async move {
        let outcome = dispatch(&state, &payload).await;
        debug!(outcome = %outcome, "Event processed");
        outcome
    });
    match task.await {
        Ok(outcome) => outcome.ack(),
        Err(e) => {
            error!("Dispatch task failed: {e}");
            "OK"
        }
    }
}

async fn handle_health(AxumState(state): AxumState<Arc<State>>) -> Json<Value> {
    Json(stats::build_health_json(&state))
}

async fn handle_stats(AxumState(state): AxumState<Arc<State>>) -> Json<Value> {
    Json(stats::build_stats_json(&state))
}

async fn handle_metrics(AxumState(state): AxumState<Arc<State>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        stats::build_prometheus_metrics(&state),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{test_state_with, MAIN_GROUP};
    use crate::traits::MockChatApi;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn group_text(group_id: i64, text: &str) -> Value {
        json!({
            "post_type": "message", "message_type": "group",
            "group_id": group_id, "user_id": 1,
            "message": [{"type": "text", "data": {"text": text}}]
        })
    }

    async fn post_body(app: Router, body: impl Into<Body>) -> (StatusCode, String) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_path(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn silent_state(dir: &std::path::Path) -> Arc<State> {
        let mut chat = MockChatApi::new();
        chat.expect_send_group_msg().never();
        Arc::new(test_state_with(chat, None, dir))
    }

    #[tokio::test]
    async fn test_malformed_json_is_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(silent_state(dir.path()));
        let (status, body) = post_body(app, "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Not a group message event");
    }

    #[tokio::test]
    async fn test_unmonitored_group_ack() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(silent_state(dir.path()));
        let event = json!({
            "post_type": "message", "message_type": "group",
            "group_id": 555, "user_id": 1,
            "message": [{"type": "text", "data": {"text": "#help"}}]
        });
        let (status, body) = post_body(app, event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Group not monitored");
    }

    #[tokio::test]
    async fn test_command_is_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_send_group_msg()
            .withf(|g, _| *g == MAIN_GROUP)
            .times(1)
            .returning(|_, _| Ok(()));
        let app = router(Arc::new(test_state_with(chat, None, dir.path())));
        let event = json!({
            "post_type": "message", "message_type": "group",
            "group_id": MAIN_GROUP, "user_id": 1,
            "message": [{"type": "text", "data": {"text": "#help"}}]
        });
        let (status, body) = post_body(app, event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_failed_handler_still_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let state = silent_state(dir.path());
        std::fs::create_dir_all(&state.config.db_path).unwrap();
        let event = group_text(MAIN_GROUP, "#faq rules");
        let (status, body) = post_body(router(state.clone()), event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
        assert_eq!(
            state
                .metrics
                .handler_failures
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_client_disconnect_does_not_cancel_command() {
        let images = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"jpeg".to_vec())
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&images)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_send_group_msg()
            .withf(|g, _| *g == MAIN_GROUP)
            .times(1)
            .returning(|_, _| Ok(()));
        let state = Arc::new(test_state_with(chat, None, dir.path()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let event = group_text(
            MAIN_GROUP,
            &format!("#faq edit rules see {}/a.jpg", images.uri()),
        );
        let sent = client
            .post(format!("http://{addr}/"))
            .json(&event)
            .send()
            .await;
        assert!(sent.is_err(), "client should have timed out first");

        let handled = || {
            state
                .metrics
                .commands_handled
                .load(std::sync::atomic::Ordering::Relaxed)
        };
        for _ in 0..50 {
            if handled() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(handled(), 1);
        let contents = state.stores.faq.get("rules").unwrap().unwrap().contents;
        assert!(contents.starts_with("see [CQ:image,file=file:///"), "got {contents}");
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_path(router(silent_state(dir.path())), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_stats_counts_events() {
        let dir = tempfile::tempdir().unwrap();
        let state = silent_state(dir.path());
        post_body(router(state.clone()), "[]").await;
        let (status, body) = get_path(router(state), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["events_received"], 1);
        assert_eq!(json["events_ignored"], 1);
    }

    #[tokio::test]
    async fn test_metrics_is_prometheus_text() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_path(router(silent_state(dir.path())), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("qqbot_events_total 0"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get_path(router(silent_state(dir.path())), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
