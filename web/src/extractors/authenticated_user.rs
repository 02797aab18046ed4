use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use domain::{jwt::extract_identity, Identity};
use log::*;

/// The identity asserted by the request's `Authorization: Bearer <jwt>` header.
pub(crate) struct AuthenticatedUser(pub Identity);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(unauthorized)?;

        match extract_identity(credential, state.token_key()) {
            Ok(identity) => Ok(AuthenticatedUser(identity)),
            Err(e) => {
                debug!("Rejecting request to {}: {e}", parts.uri.path());
                Err(unauthorized())
            }
        }
    }
}

fn unauthorized() -> RejectionType {
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
}
