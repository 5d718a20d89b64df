use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        middleware,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{api, auth, state::GatewayState, ws::ws_upgrade_handler};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/questions", get(api::list_questions))
        .route("/requesters", get(api::list_requesters))
        .route("/reply", post(api::reply))
        .route("/mute", post(api::mute))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_bearer,
        ));

    let live = Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_bearer_or_query,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .merge(live)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the observation surface until the state's shutdown token fires.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("ustoz gateway v{}", state.version),
        format!("listening on {addr}"),
        format!("responders: {}", state.router.responders().len()),
        format!(
            "auth: {}",
            if state.auth.token.is_some() {
                "bearer token"
            } else {
                "open"
            }
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("gateway stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "connections": state.client_count(),
    }))
}
