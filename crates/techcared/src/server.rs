//! HTTP server for techcared

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;
use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the full router with middleware
pub fn router(state: Arc<AppState>) -> Router {
    let server = state.config.server.clone();

    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::auth_routes())
        .merge(routes::diagnostic_routes())
        .merge(routes::cleaner_routes())
        .merge(routes::repair_routes())
        .merge(routes::maintenance_routes())
        .merge(routes::chat_routes())
        .merge(routes::admin_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.effective_body_limit()))
        .layer(TimeoutLayer::new(server.effective_request_timeout()));

    let app = match cors_layer(&server) {
        Some(cors) => app.layer(cors),
        None => app,
    };
    app.layer(TraceLayer::new_for_http())
}

/// CORS for the configured origins; none configured means same-origin only
fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|o| match o.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("  Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run(state: Arc<AppState>, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = state.config.server.listen.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
