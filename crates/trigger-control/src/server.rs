//! HTTP server implementation using axum.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use trigger_telemetry::Metrics;

use crate::auth::TokenCheck;
use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::render::render_ticker_page;
use crate::state::{ControlSnapshot, ControlState};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Create the axum router.
pub fn create_router(state: ControlState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/ticker", get(ticker))
        .route("/api/snapshot", get(snapshot))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<ControlState>) -> Redirect {
    state.monitor().ensure_running();
    Redirect::to("/ticker")
}

async fn start(State(state): State<ControlState>, Query(query): Query<TokenQuery>) -> Response {
    if let Err(rejection) = authorize(&state, "start", query.token.as_deref()) {
        return rejection;
    }

    state.latch().go_live("control /start");
    state.monitor().ensure_running();
    Redirect::to("/ticker").into_response()
}

async fn stop(State(state): State<ControlState>, Query(query): Query<TokenQuery>) -> Response {
    if let Err(rejection) = authorize(&state, "stop", query.token.as_deref()) {
        return rejection;
    }

    warn!("Shutdown requested via /stop");
    state.request_shutdown();
    (StatusCode::OK, "stopping").into_response()
}

async fn ticker(State(state): State<ControlState>) -> Html<String> {
    Html(render_ticker_page(&state.snapshot()))
}

async fn snapshot(State(state): State<ControlState>) -> Json<ControlSnapshot> {
    Json(state.snapshot())
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, encoder.format_type().to_string())], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Check the request token. The secret never appears in a response.
fn authorize(state: &ControlState, route: &str, token: Option<&str>) -> Result<(), Response> {
    let check = state.verifier().check(token);
    let outcome = match check {
        TokenCheck::Valid => "valid",
        TokenCheck::Invalid => "invalid",
        TokenCheck::Unavailable => "unavailable",
    };
    Metrics::control_auth(route, outcome);

    match check {
        TokenCheck::Valid => {
            info!(route, "Control request authorized");
            Ok(())
        }
        TokenCheck::Invalid => {
            warn!(route, "Control request with invalid token");
            Err((StatusCode::FORBIDDEN, "invalid token").into_response())
        }
        TokenCheck::Unavailable => {
            warn!(route, "Control request without token or secret");
            Err((StatusCode::BAD_REQUEST, "token unavailable").into_response())
        }
    }
}

/// Serve the control surface until shutdown is signalled.
pub async fn run_server(state: ControlState, config: ControlConfig) -> ControlResult<()> {
    let shutdown = state.subscribe_shutdown();
    let app = create_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Starting control server");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .map_err(|e| ControlError::Server(e.to_string()))?;

    info!("Control server stopped");
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
