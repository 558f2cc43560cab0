//! Operator dashboard surface
//!
//! A websocket endpoint fans every [`DashboardEvent`] out to all connected
//! dashboards (best-effort: a consumer that lags loses events, it never
//! back-pressures the call) and accepts operator commands for the active
//! call. A REST surface serves the agent list, running tool tasks, the
//! access lists and historical call records.

mod error;
mod rest;
mod state;
mod ws;

pub use error::ApiError;
pub use state::{ConsoleState, StatusSnapshot};

use std::net::SocketAddr;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the dashboard router
pub fn router(state: ConsoleState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/agents", get(rest::list_agents))
        .route("/tasks", get(rest::list_tasks))
        .route("/tasks/:id/cancel", post(rest::cancel_task))
        .route("/blacklist", get(rest::list_blacklist).post(rest::add_blacklist))
        .route("/blacklist/:caller", delete(rest::remove_blacklist))
        .route("/whitelist", get(rest::list_whitelist).post(rest::add_whitelist))
        .route("/whitelist/:caller", delete(rest::remove_whitelist))
        .route("/calls", get(rest::list_calls))
        .route("/calls/:id", get(rest::get_call))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the dashboard until the process exits
pub async fn serve(addr: SocketAddr, state: ConsoleState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "dashboard listening");
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::{broadcast, RwLock};
    use tower::ServiceExt;
    use voxgate_access_store::AccessStore;
    use voxgate_agent_core::{builtin_registry, TaskRegistry};

    async fn test_state() -> ConsoleState {
        let (events, _) = broadcast::channel(64);
        ConsoleState {
            store: AccessStore::open_in_memory().await.unwrap(),
            registry: Arc::new(builtin_registry()),
            tasks: TaskRegistry::new(),
            events,
            active_call: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(Default::default())),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn agents_endpoint_lists_builtins() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let names: Vec<&str> = json["agents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"security_agent"));
        assert!(names.contains(&"main_agent"));
    }

    #[tokio::test]
    async fn blacklist_rest_round_trip() {
        let state = test_state().await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/blacklist")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"caller_id":"123","reason":"spam"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::get("/blacklist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["blacklist"][0]["caller_id"], "123");

        let response = app
            .clone()
            .oneshot(
                Request::delete("/blacklist/123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::delete("/blacklist/123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_call_is_404() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::get(format!("/calls/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
