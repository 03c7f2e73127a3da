use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{Query, State, WebSocketUpgrade},
        response::{IntoResponse, Json},
        routing::get,
    },
    serde::Deserialize,
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use {
    parlor_broker::{Broker, Transport},
    parlor_channels::ChannelStore,
    parlor_protocol::ChannelSummary,
    parlor_sessions::SessionRegistry,
};

use crate::{config::GatewayConfig, hub::ClientHub, ws::handle_connection};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ClientHub>,
    pub broker: Arc<Broker>,
    pub channels: Arc<ChannelStore>,
}

/// Wire the stores, the broker, and the hub together from config.
pub fn build_state(config: &GatewayConfig) -> AppState {
    let channels = Arc::new(ChannelStore::new(
        &config.channels,
        config.retention_cap,
        config.visible_window,
    ));
    let sessions = Arc::new(SessionRegistry::new(config.default_channel.as_str()));
    let hub = Arc::new(ClientHub::default());
    let broker = Arc::new(Broker::new(
        Arc::clone(&channels),
        Arc::clone(&sessions),
        Arc::clone(&hub) as Arc<dyn Transport>,
    ));
    AppState {
        hub,
        broker,
        channels,
    }
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/api/channels", get(channels_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let state = build_state(&config);
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    username: Option<String>,
}

async fn ws_upgrade_handler(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, query.username))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Read-only channel listing: name and current message count per channel.
async fn channels_handler(State(state): State<AppState>) -> Json<Vec<ChannelSummary>> {
    Json(state.channels.summaries().await)
}
