use crate::config::HubConfig;
use crate::signaling::{SignalingService, ws_handler};
use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use walkie_core::net::local_ipv4;

/// Routes of a hub: the `/ws` signaling socket plus the probe endpoints.
pub fn router(service: SignalingService, config: &HubConfig) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/presence", get(presence))
        .layer(cors(config))
        .with_state(service)
}

/// Binds `config.socket_addr()` and serves until the process exits.
pub async fn serve(config: HubConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind hub to {addr}"))?;
    serve_listener(listener, config).await
}

/// Serves a hub on an already bound listener.
///
/// With both certificate paths configured the hub speaks HTTPS and `wss`.
/// A certificate or key that cannot be loaded is logged and the hub falls
/// back to plain HTTP.
pub async fn serve_listener(listener: TcpListener, config: HubConfig) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let tls = match config.tls_paths() {
        Some((cert, key)) => match crate::tls::server_config(cert, key) {
            Ok(tls) => Some(tls),
            Err(e) => {
                warn!("TLS disabled, serving plain HTTP: {:#}", e);
                None
            }
        },
        None => None,
    };

    let (http, ws) = if tls.is_some() { ("https", "wss") } else { ("http", "ws") };
    info!("Hub listening on {}://{}", http, addr);
    if addr.ip().is_unspecified() {
        match local_ipv4() {
            Some(ip) => info!("LAN address: {}://{}:{}/ws", ws, ip, addr.port()),
            None => warn!("Could not determine a LAN address"),
        }
    }

    let app = router(SignalingService::start(), &config);
    match tls {
        Some(tls) => {
            axum_server::from_tcp_rustls(listener.into_std()?, RustlsConfig::from_config(tls))
                .serve(app.into_make_service())
                .await?
        }
        None => axum::serve(listener, app).await?,
    }
    Ok(())
}

fn cors(config: &HubConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid origin {:?}", o);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn banner() -> &'static str {
    "walkie hub: connect a websocket to /ws\n"
}

async fn health(State(service): State<SignalingService>) -> impl IntoResponse {
    match service.relay().snapshot().await {
        Some(snapshot) => Json(snapshot.status).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn presence(State(service): State<SignalingService>) -> impl IntoResponse {
    match service.relay().snapshot().await {
        Some(snapshot) => Json(snapshot.presence).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
