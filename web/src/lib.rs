//! HTTP surface of the messenger: the WebSocket upgrade, the message REST
//! endpoints and the health check.

use axum::http::{header, Method};
use log::*;
use realtime::Hub;
use sea_orm::DatabaseConnection;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod controller;
mod error;
mod extractors;
mod params;
mod router;

pub use error::{Error, Result};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub hub: Hub,
}

impl AppState {
    pub fn new(service_state: service::AppState, hub: Hub) -> Self {
        Self { service_state, hub }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn token_key(&self) -> &[u8] {
        self.service_state.token_key()
    }
}

/// Serves the API until `shutdown` resolves, then drains in-flight requests.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = &app_state.service_state.config;
    let server_url = format!(
        "{}:{}",
        config.interface.as_deref().unwrap_or("127.0.0.1"),
        config.port
    );

    // Bearer tokens travel in a header, never in cookies, so any origin may
    // call the API.
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    let app = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
