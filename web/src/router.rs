use crate::controller::{health_check_controller, message_controller, websocket_controller};
use crate::{params, AppState};
use axum::{
    routing::{get, post},
    Router,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Messenger API"
        ),
        paths(
            health_check_controller::health_check,
            message_controller::create,
            message_controller::history,
            websocket_controller::connect,
        ),
        components(
            schemas(
                domain::messages::Model,
                params::message::CreateParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "messenger", description = "Direct messaging API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Every endpoint except the health check expects `Authorization: Bearer <jwt>`.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("HMAC-signed token carrying the user id in `id`"))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(message_routes(app_state.clone()))
        .merge(websocket_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(message_controller::create))
        .route("/v1/messages/{id}", get(message_controller::history))
        .with_state(app_state)
}

fn websocket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_controller::connect))
        .with_state(app_state)
}
