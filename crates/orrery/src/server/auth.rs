//! # Admin Guard & OAuth Login
//!
//! The callback never answers with JSON: every outcome is a 303 to either
//! `client_url?login=success` or `error_url?error=<code>`.
//!
//! | Code             | Cause                                 |
//! |------------------|---------------------------------------|
//! | `oauth_denied`   | provider sent `error=...`             |
//! | `auth_error`     | state missing, expired or mismatched  |
//! | `oauth_error`    | no code, or the exchange failed       |
//! | `database_error` | player could not be resolved          |

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use orrery_security::{constant_time_eq, exchange_within, SessionRegistry, EXCHANGE_TIMEOUT};
use orrery_shared::{Error, PlayerId, ProviderIdentity, Result};
use serde::Deserialize;

use super::error::ApiResult;
use super::AppState;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "orrery_session";

// =============================================================================
// ADMIN GUARD
// =============================================================================

/// Rejects requests whose `X-Admin-Token` differs from the configured token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let expected = state.config.auth.admin_token.as_str();
    if expected.is_empty() {
        return Err(Error::unauthorized("admin access is not configured").into());
    }

    let provided = request.headers().get(ADMIN_TOKEN_HEADER).map(HeaderValue::as_bytes);

    let verdict = match provided {
        Some(token) if constant_time_eq(token, expected.as_bytes()) => Ok(()),
        Some(_) => {
            tracing::warn!("invalid admin token");
            Err(Error::unauthorized("invalid admin token"))
        }
        None => Err(Error::unauthorized("missing admin token")),
    };
    verdict?;
    Ok(next.run(request).await)
}

// =============================================================================
// OAUTH
// =============================================================================

/// Query of the provider callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// State token we issued.
    pub state: Option<String>,
    /// Set by the provider when the user declined.
    pub error: Option<String>,
}

fn fingerprint(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn with_query(base: &str, key: &str, value: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{key}={value}")
}

/// `Set-Cookie` value for a fresh session.
#[must_use]
pub fn session_cookie(token: &str, production: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SessionRegistry::max_age_seconds()
    );
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `GET /auth/{provider}`
pub async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Redirect> {
    let config = state
        .config
        .provider(&provider)
        .ok_or_else(|| Error::not_found(format!("unknown provider '{provider}'")))?;

    let token = state.states.issue(&provider, &fingerprint(&headers))?;
    let url = config.authorize_redirect(&token)?;
    tracing::debug!(provider = %provider, "OAuth login started");
    Ok(Redirect::to(&url))
}

async fn resolve_player(state: &AppState, identity: &ProviderIdentity) -> Result<PlayerId> {
    let mut tx = state.pipeline.store().begin().await?;
    match tx.resolve_player(identity).await {
        Ok(player) => {
            tx.commit().await?;
            Ok(player)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

/// `GET /auth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    params: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let config = state
        .config
        .provider(&provider)
        .ok_or_else(|| Error::not_found(format!("unknown provider '{provider}'")))?;
    let fail = |code: &str| Redirect::to(&with_query(&state.config.auth.error_url, "error", code));

    if let Some(error) = params.error.as_deref() {
        // Burn the token so it cannot be replayed.
        if let Some(token) = params.state.as_deref() {
            let _ = state.states.validate(token, &provider, &fingerprint(&headers));
        }
        tracing::info!(provider = %provider, error, "OAuth login declined");
        return Ok(fail("oauth_denied").into_response());
    }

    let Some(token) = params.state.as_deref() else {
        return Ok(fail("auth_error").into_response());
    };
    if let Err(err) = state.states.validate(token, &provider, &fingerprint(&headers)) {
        tracing::warn!(provider = %provider, error = %err, "OAuth state rejected");
        return Ok(fail("auth_error").into_response());
    }

    let Some(code) = params.code.as_deref() else {
        return Ok(fail("oauth_error").into_response());
    };
    let exchange = exchange_within(
        state.exchange.as_ref(),
        EXCHANGE_TIMEOUT,
        &provider,
        config,
        code,
    );
    let identity = match exchange.await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(provider = %provider, error = %err, "OAuth code exchange failed");
            return Ok(fail("oauth_error").into_response());
        }
    };

    let player = match resolve_player(&state, &identity).await {
        Ok(player) => player,
        Err(err) => {
            tracing::error!(provider = %provider, error = %err, "player resolution failed");
            return Ok(fail("database_error").into_response());
        }
    };

    let (session_token, _) = match state.sessions.issue(player) {
        Ok(issued) => issued,
        Err(err) => {
            tracing::error!(error = %err, "session issue failed");
            return Ok(fail("auth_error").into_response());
        }
    };

    tracing::info!(provider = %provider, player, "player logged in");
    let cookie = session_cookie(&session_token, state.config.server.production);
    let success = with_query(&state.config.auth.client_url, "login", "success");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&success)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc", false);
        assert_eq!(
            cookie,
            "orrery_session=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400"
        );
        assert!(session_cookie("abc", true).ends_with("; Secure"));
    }

    #[test]
    fn test_query_append() {
        assert_eq!(
            with_query("https://x.io/login", "error", "auth_error"),
            "https://x.io/login?error=auth_error"
        );
        assert_eq!(
            with_query("https://x.io/?ref=a", "login", "success"),
            "https://x.io/?ref=a&login=success"
        );
    }
}
