//! Session gate for operator-facing routes.
//!
//! The gate runs as route middleware, so a protected handler never starts
//! fetching leads for a visitor without a live session.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::handlers::AppState;

/// Cookie carrying the auth provider's access token.
pub const SESSION_COOKIE: &str = "lead_session";

/// Where anonymous page visitors are sent.
pub const SIGN_IN_PATH: &str = "/login";

/// Access token from `Authorization: Bearer`, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_value(headers, SESSION_COOKIE))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn cache_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Resolves the operator behind the request, if any.
///
/// Validated tokens are cached briefly so that a page load does not cost an
/// auth provider round trip per request.
pub async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };

    let key = cache_key(token);
    if let Some(user) = state.sessions.get(&key).await {
        return Ok(Some(user));
    }

    let user = state.auth.get_user(token).await?;
    if let Some(ref user) = user {
        tracing::debug!("Session resolved for user {}", user.id);
        state.sessions.insert(key, user.clone()).await;
    }
    Ok(user)
}

/// Drops a token from the session cache so sign-out takes effect immediately.
pub async fn forget_session(state: &AppState, token: &str) {
    state.sessions.invalidate(&cache_key(token)).await;
}

/// Gate for HTML pages: anonymous visitors are redirected to sign-in.
///
/// Auth provider failures also redirect; a page is never rendered without a
/// confirmed session.
pub async fn require_page_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let resolved = current_user(&state, req.headers()).await;
    match resolved {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => Redirect::to(SIGN_IN_PATH).into_response(),
        Err(e) => {
            tracing::error!("Session check failed for {}: {}", req.uri().path(), e);
            Redirect::to(SIGN_IN_PATH).into_response()
        }
    }
}

/// Gate for the internal JSON API: anonymous callers get 401.
pub async fn require_api_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let resolved = current_user(&state, req.headers()).await?;
    let user = resolved
        .ok_or_else(|| AppError::Unauthorized(format!("No session for {}", req.uri().path())))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// `Set-Cookie` value storing a fresh session.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn cleared_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
