//! Client identity derivation.
//!
//! Every operation is attributed to exactly one identity. Authenticated
//! sessions win over network origin so a user keeps one quota across
//! addresses; proxied requests fall back to the forwarded client address.

use axum::http::HeaderMap;

use crate::session::Session;

/// Sentinel identity for requests with no usable signal.
const UNKNOWN: &str = "unknown";

/// A stable, opaque identity string for an inbound operation.
///
/// Keys the windowed counter store, so equality and hashing follow the
/// underlying string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Derive the identity for a request.
    ///
    /// Precedence is fixed and total: authenticated user id, first entry of
    /// `X-Forwarded-For`, `X-Real-IP`, then the `unknown` sentinel. Pure
    /// function of its inputs; never fails.
    pub fn derive(session: Option<&Session>, headers: &HeaderMap) -> Self {
        if let Some(session) = session {
            return Self(format!("user:{}", session.user_id));
        }

        // HeaderMap lookup is case-insensitive by construction.
        if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Self(format!("ip:{first}"));
                }
            }
        }

        if let Some(real_ip) = header_str(headers, "x-real-ip") {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return Self(format!("ip:{real_ip}"));
            }
        }

        Self(UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
