use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::message::CreateParams;
use crate::{AppState, Error};
use domain::{message as MessageApi, Id, Identity};
use log::*;

/// POST store a message from the authenticated user
///
/// The message is stored only; recipients with a live connection do not
/// receive it. Live delivery goes through `/ws`.
#[utoipa::path(
    post,
    path = "/v1/messages",
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully stored a new message", body = domain::messages::Model),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Internal Server Error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST message from {user} to {}", params.receiver_id);

    if params.content.is_empty() {
        return Err(Error::invalid("message content is empty"));
    }

    let message = MessageApi::create(
        app_state.db_conn_ref(),
        user,
        params.receiver_id,
        params.content,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), message)),
    ))
}

/// GET the conversation between the authenticated user and another user,
/// newest first.
#[utoipa::path(
    get,
    path = "/v1/messages/{id}",
    params(
        ("id" = i64, Path, description = "The other participant's user id")
    ),
    responses(
        (status = 200, description = "Up to 100 messages exchanged with the user", body = [domain::messages::Model]),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No messages exchanged with the user"),
        (status = 500, description = "Internal Server Error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn history(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(peer_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET message history between {user} and {peer_id}");

    let messages =
        MessageApi::find_history(app_state.db_conn_ref(), user, Identity::new(peer_id)).await?;

    if messages.is_empty() {
        return Err(Error::not_found());
    }

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}
