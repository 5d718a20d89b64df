use std::sync::Arc;

use {
    axum::{
        extract::{Query, Request, State},
        http::{StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::{ExposeSecret, SecretString},
    serde::Deserialize,
    subtle::ConstantTimeEq,
};

use crate::state::GatewayState;

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved dashboard auth. No token means the surface is open.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAuth {
    pub token: Option<SecretString>,
}

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<&'static str>,
}

impl AuthResult {
    fn allowed() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn denied(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison.
fn safe_equal(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// `Authorization: Bearer <token>`, if present and well-formed.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

// ── Auth logic ───────────────────────────────────────────────────────────────

pub fn resolve_auth(token: Option<SecretString>) -> ResolvedAuth {
    let token = token.filter(|t| !t.expose_secret().trim().is_empty());
    if token.is_none() {
        tracing::warn!("dashboard token not set; observation surface is unauthenticated");
    }
    ResolvedAuth { token }
}

pub fn authorize(auth: &ResolvedAuth, provided: Option<&str>) -> AuthResult {
    let Some(expected) = auth.token.as_ref() else {
        return AuthResult::allowed();
    };
    let Some(given) = provided else {
        return AuthResult::denied("token_missing");
    };
    if !safe_equal(given, expected.expose_secret()) {
        return AuthResult::denied("token_mismatch");
    }
    AuthResult::allowed()
}

fn reject(result: &AuthResult, path: &str) -> Response {
    tracing::debug!(path, reason = ?result.reason, "dashboard request rejected");
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Guard for the JSON API: bearer header only.
pub async fn require_bearer(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let result = authorize(&state.auth, bearer_token(&request));
    if !result.ok {
        return reject(&result, request.uri().path());
    }
    next.run(request).await
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Guard for the WebSocket: browsers cannot set headers on upgrade requests,
/// so `?token=` is accepted as well.
pub async fn require_bearer_or_query(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    let provided = bearer_token(&request).or(query.token.as_deref());
    let result = authorize(&state.auth, provided);
    if !result.ok {
        return reject(&result, request.uri().path());
    }
    next.run(request).await
}
