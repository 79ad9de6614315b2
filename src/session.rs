//! Session extraction from the Authorization header.
//!
//! The gateway decodes the bearer token's claims without verifying the
//! signature; the users service verifies tokens on every forwarded call.
//! Anything malformed yields an unauthenticated request, never an error.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

/// The authenticated caller, as far as the gateway can tell locally.
#[derive(Debug, Clone)]
pub struct Session {
    /// Subject id from the token's `userId` claim
    pub user_id: String,
    /// The raw bearer token, forwarded to the upstream on every call
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl Session {
    /// Resolve the session from request headers, if any.
    pub fn from_headers(headers: &HeaderMap) -> Option<Session> {
        let auth = headers.get("authorization")?.to_str().ok()?;
        let token = auth.strip_prefix("Bearer ")?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        let decoded = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| {
                debug!(error = %e, "Discarding undecodable bearer token");
                e
            })
            .ok()?;

        let user_id = decoded.claims.user_id?;
        Some(Session {
            user_id,
            token: token.to_string(),
        })
    }
}
