//! Bearer token verification for inbound connections and API requests.
//!
//! Clients present `Authorization: Bearer <jwt>`. The token must be signed
//! with the shared secret using an HMAC algorithm; the header's `alg` is
//! checked before any verification happens so a token claiming `none` or an
//! asymmetric algorithm is rejected outright rather than handed to a key of the
//! wrong family.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain::jwt::extract_identity;
//!
//! let identity = extract_identity(header_value, config.token_key().unwrap_or_default().as_bytes())?;
//! ```

use crate::error::{auth_error, AuthErrorKind, DomainErrorKind, Error};
use crate::identity::Identity;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use claims::{identity_from_claims, Claims};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::Deserialize;

pub(crate) mod claims;

/// Scheme prefix expected on the credential.
pub const BEARER_PREFIX: &str = "Bearer ";

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Decodes a bearer credential into the identity it asserts.
///
/// `exp` is enforced when the token carries one but is not required.
pub fn extract_identity(credential: &str, key: &[u8]) -> Result<Identity, Error> {
    let token = credential
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            auth_error(
                AuthErrorKind::MalformedCredential,
                "invalid authorization header format",
            )
        })?;

    // No configured key means nothing verifies.
    if key.is_empty() {
        return Err(auth_error(
            AuthErrorKind::InvalidToken,
            "no token key configured",
        ));
    }

    let algorithm = signing_algorithm(token)?;

    let mut validation = Validation::new(algorithm);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(key), &validation)
        .inspect_err(|e| debug!("Token verification failed: {e}"))?;

    identity_from_claims(&token_data.claims)
}

/// Reads `alg` from the unverified header and admits only the HMAC family.
fn signing_algorithm(token: &str) -> Result<Algorithm, Error> {
    let encoded_header = token.split('.').next().unwrap_or_default();

    let header_bytes = URL_SAFE_NO_PAD.decode(encoded_header).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: DomainErrorKind::Auth(AuthErrorKind::InvalidToken),
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: DomainErrorKind::Auth(AuthErrorKind::InvalidToken),
    })?;

    match header.alg.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => {
            warn!("Rejected token signed with unexpected method {other}");
            Err(auth_error(
                AuthErrorKind::UnsupportedSigningMethod,
                &format!("unexpected signing method: {other}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const KEY: &[u8] = b"test-signing-key";

    fn sign(algorithm: Algorithm, claims: Value, key: &[u8]) -> String {
        encode(
            &Header::new(algorithm),
            &claims,
            &EncodingKey::from_secret(key),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("{BEARER_PREFIX}{token}")
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn forged_token(alg: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#));
        let payload = URL_SAFE_NO_PAD.encode(r#"{"id":42}"#);
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn numeric_and_textual_identity_claims_normalize_to_the_same_identity() {
        let numeric = sign(Algorithm::HS256, json!({ "id": 42, "exp": future_exp() }), KEY);
        let textual = sign(Algorithm::HS256, json!({ "id": "42", "exp": future_exp() }), KEY);

        assert_eq!(extract_identity(&bearer(&numeric), KEY).unwrap(), Identity::new(42));
        assert_eq!(extract_identity(&bearer(&textual), KEY).unwrap(), Identity::new(42));
    }

    #[test]
    fn every_hmac_variant_is_accepted() {
        for algorithm in HMAC_ALGORITHMS {
            let token = sign(algorithm, json!({ "id": 7 }), KEY);

            assert_eq!(
                extract_identity(&bearer(&token), KEY).unwrap(),
                Identity::new(7),
                "{algorithm:?} should verify"
            );
        }
    }

    #[test]
    fn credential_without_bearer_prefix_is_malformed() {
        let token = sign(Algorithm::HS256, json!({ "id": 42 }), KEY);

        for credential in [token.clone(), format!("Basic {token}"), "Bearer ".to_string(), String::new()] {
            let err = extract_identity(&credential, KEY).unwrap_err();
            assert_eq!(err.auth_kind(), Some(AuthErrorKind::MalformedCredential));
        }
    }

    #[test]
    fn disallowed_algorithms_are_unsupported() {
        for alg in ["RS256", "ES256", "none", "PS512"] {
            let err = extract_identity(&bearer(&forged_token(alg)), KEY).unwrap_err();
            assert_eq!(
                err.auth_kind(),
                Some(AuthErrorKind::UnsupportedSigningMethod),
                "{alg} must be refused"
            );
        }
    }

    #[test]
    fn wrong_key_fails_verification() {
        let token = sign(Algorithm::HS256, json!({ "id": 42 }), b"another-key");

        let err = extract_identity(&bearer(&token), KEY).unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidToken));
    }

    #[test]
    fn an_empty_key_verifies_nothing() {
        let token = sign(Algorithm::HS256, json!({ "id": 42 }), b"");

        let err = extract_identity(&bearer(&token), b"").unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidToken));
    }

    #[test]
    fn expired_tokens_fail_verification() {
        let expired = chrono::Utc::now().timestamp() - 3600;
        let token = sign(Algorithm::HS256, json!({ "id": 42, "exp": expired }), KEY);

        let err = extract_identity(&bearer(&token), KEY).unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidToken));
    }

    #[test]
    fn garbage_tokens_fail_verification() {
        let err = extract_identity("Bearer not-a-token", KEY).unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidToken));
    }

    #[test]
    fn token_without_identity_claim_is_missing() {
        let token = sign(Algorithm::HS256, json!({ "sub": "someone" }), KEY);

        let err = extract_identity(&bearer(&token), KEY).unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::MissingIdentityClaim));
    }

    #[test]
    fn unparsable_identity_claim_is_invalid() {
        let token = sign(Algorithm::HS256, json!({ "id": "forty-two" }), KEY);

        let err = extract_identity(&bearer(&token), KEY).unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidIdentityClaim));
    }

    #[test]
    fn extraction_is_repeatable() {
        let credential = bearer(&sign(Algorithm::HS384, json!({ "id": 5 }), KEY));

        assert_eq!(
            extract_identity(&credential, KEY).unwrap(),
            extract_identity(&credential, KEY).unwrap()
        );
    }
}
