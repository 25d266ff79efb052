//! Route table.
//!
//! ```text
//! /
//! ├── /admin/runs                   POST  (X-Admin-Token)
//! ├── /spatial/{id}/children        GET
//! ├── /spatial/{id}/ancestors       GET
//! ├── /systems/{id}/planets         GET
//! ├── /auth/{provider}              GET   -> 303 provider
//! ├── /auth/{provider}/callback     GET   -> 303 client / error page
//! └── /health                       GET
//! ```

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::auth::{callback, login, require_admin};
use super::handlers::{
    ancestors, children, create_run, health, method_not_allowed, not_found, planets,
};
use super::AppState;

/// Full router with state applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(admin_router(state.clone()))
        .route(
            "/spatial/{id}/children",
            get(children).fallback(method_not_allowed),
        )
        .route(
            "/spatial/{id}/ancestors",
            get(ancestors).fallback(method_not_allowed),
        )
        .route(
            "/systems/{id}/planets",
            get(planets).fallback(method_not_allowed),
        )
        .route("/auth/{provider}", get(login).fallback(method_not_allowed))
        .route(
            "/auth/{provider}/callback",
            get(callback).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

/// Admin routes, behind the token guard.
fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/runs", post(create_run).fallback(method_not_allowed))
        .route_layer(from_fn_with_state(state, require_admin))
}
