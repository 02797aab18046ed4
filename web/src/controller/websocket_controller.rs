use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::response::Response;

use crate::AppState;
use log::*;
use realtime::WebSocketTransport;

/// GET upgrade to a live chat connection
///
/// The credential is checked after the upgrade; a rejected one gets close
/// code 4001 rather than an HTTP error.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching to the WebSocket protocol"),
        (status = 400, description = "Not a WebSocket upgrade request")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn connect(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    trace!("Upgrading connection (credential present: {})", credential.is_some());

    let hub = app_state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        hub.accept(WebSocketTransport::new(socket), credential).await
    })
}
