//! Shared-password site perimeter.
//!
//! A low-security gate in front of the whole API: one password known to every
//! visitor, exchanged for a token sent back in the `X-Site-Access` header. It
//! says nothing about who the visitor is. Quotation access is decided solely
//! by `auth::Caller`, and passing the gate grants no identity or role.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const SITE_ACCESS_HEADER: &str = "x-site-access";

#[derive(Debug, Clone, Default)]
pub struct SiteGate {
    token: Option<String>,
}

fn digest_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time string comparison
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

impl SiteGate {
    /// A gate for `password`; `None` leaves the site open.
    pub fn new(password: Option<&str>) -> Self {
        Self {
            token: password.map(digest_hex),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Returns the access token when `candidate` is the site password.
    pub fn unlock(&self, candidate: &str) -> Option<String> {
        let expected = self.token.as_ref()?;
        let presented = digest_hex(candidate);
        constant_time_compare(&presented, expected).then(|| expected.clone())
    }

    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.token, presented) {
            (None, _) => true,
            (Some(expected), Some(token)) => constant_time_compare(token.trim(), expected),
            (Some(_), None) => false,
        }
    }
}

/// Middleware rejecting requests that have not passed the site gate.
pub async fn require_site_access(
    State(gate): State<Arc<SiteGate>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(SITE_ACCESS_HEADER)
        .and_then(|v| v.to_str().ok());

    if gate.accepts(presented) {
        return next.run(request).await;
    }

    tracing::debug!("Request blocked by site access gate");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Site access password required" })),
    )
        .into_response()
}
