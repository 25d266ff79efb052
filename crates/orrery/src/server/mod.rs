//! # HTTP Boundary
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ORRERY SERVER                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │  POST /admin/runs ──[X-Admin-Token]──► Pipeline::create_run   │
//! │  GET  /spatial/{id}/children  ─┐                              │
//! │  GET  /spatial/{id}/ancestors ─┼──► Store::acquire (reads)    │
//! │  GET  /systems/{id}/planets   ─┘                              │
//! │  GET  /auth/{provider}          ──► StateRegistry::issue      │
//! │  GET  /auth/{provider}/callback ──► validate, exchange,       │
//! │                                     resolve player, cookie    │
//! │  GET  /health                                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers never build error responses by hand. They return
//! [`ApiError`], which renders `{error, message, code}`.

mod auth;
mod error;
mod handlers;
mod router;

pub use auth::{ADMIN_TOKEN_HEADER, SESSION_COOKIE};
pub use error::{ApiError, ApiResult, ErrorBody};
pub use router::build_router;

use std::sync::Arc;

use orrery_security::{IdentityExchange, SessionRegistry, StateRegistry, SWEEP_INTERVAL};
use orrery_shared::{Clock, Error, Result};
use orrery_store::Store;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::OrreryConfig;
use crate::pipeline::Pipeline;

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<OrreryConfig>,
    /// Run generation.
    pub pipeline: Arc<Pipeline>,
    /// OAuth state tokens.
    pub states: Arc<StateRegistry>,
    /// Login sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Code -> identity exchange.
    pub exchange: Arc<dyn IdentityExchange>,
    /// Fired on shutdown. Generation requests run under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires the registries and the pipeline around `store`.
    #[must_use]
    pub fn new(
        config: OrreryConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        exchange: Arc<dyn IdentityExchange>,
    ) -> Self {
        let pipeline = Pipeline::new(store, Arc::clone(&clock), config.generation.clone());
        let states = StateRegistry::new(Arc::clone(&clock), config.auth.strict_fingerprint);
        let sessions = SessionRegistry::new(clock);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            states: Arc::new(states),
            sessions: Arc::new(sessions),
            exchange,
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts the periodic state and session sweeps. Both stop on shutdown.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        let states = Arc::clone(&self.states).spawn_sweeper(self.shutdown.child_token());

        let sessions = Arc::clone(&self.sessions);
        let cancel = self.shutdown.child_token();
        let sessions = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = sessions.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "expired sessions swept");
                        }
                    }
                }
            }
        });

        vec![states, sessions]
    }
}

/// Serves until `state.shutdown` fires.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::internal("HTTP server failed").with_cause(e))
}
