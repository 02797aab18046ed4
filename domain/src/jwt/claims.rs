//! Reading the identity claim out of a verified token payload.
//!
//! Tokens are minted by more than one service and not all of them agree on
//! how to encode the user id: some write `{"id": 42}`, others `{"id": "42"}`.
//! Both are accepted here and normalized to an [`Identity`].

use crate::error::{auth_error, AuthErrorKind, Error};
use crate::identity::Identity;
use crate::Id;
use serde_json::{Map, Number, Value};

/// Name of the payload field carrying the user id.
pub(crate) const IDENTITY_CLAIM: &str = "id";

pub(crate) type Claims = Map<String, Value>;

pub(crate) fn identity_from_claims(claims: &Claims) -> Result<Identity, Error> {
    match claims.get(IDENTITY_CLAIM) {
        None | Some(Value::Null) => Err(auth_error(
            AuthErrorKind::MissingIdentityClaim,
            "user id not found in token",
        )),
        Some(Value::Number(number)) => number_to_id(number)
            .map(Identity::new)
            .ok_or_else(invalid_claim),
        Some(Value::String(text)) => Identity::parse(text).ok_or_else(invalid_claim),
        Some(_) => Err(invalid_claim()),
    }
}

// JSON producers that only have doubles write integral ids as e.g. `42.0`.
fn number_to_id(number: &Number) -> Option<Id> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= Id::MIN as f64 && *f < Id::MAX as f64)
            .map(|f| f as Id)
    })
}

fn invalid_claim() -> Error {
    auth_error(
        AuthErrorKind::InvalidIdentityClaim,
        "invalid user id format in token",
    )
}
