//! # OAuth State Registry
//!
//! One-time CSRF tokens binding an authorize redirect to its callback.
//!
//! ## Rules
//!
//! 1. A token lives at most 10 minutes
//! 2. Any lookup hit removes it, valid or not
//! 3. Provider must match, the client fingerprint is only warned about
//!    unless strict mode is on
//!
//! ## Locking
//!
//! `peek` and `stats` share the read lock. `issue`, `validate` and `sweep`
//! take the write lock. The clock is injected so tests can jump forward.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use orrery_shared::{Clock, Error, Result};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::token::random_token;

/// Token lifetime.
pub const STATE_TTL_MINUTES: i64 = 10;

/// Period of the background sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// What a token was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateEntry {
    /// Provider the authorize redirect went to.
    pub provider: String,
    /// Client fingerprint (User-Agent) at issue time.
    pub fingerprint: String,
    /// Issue instant.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateStats {
    /// Entries still inside their lifetime.
    pub live: usize,
    /// Entries waiting for the sweeper.
    pub expired: usize,
}

/// Process-wide state token store.
pub struct StateRegistry {
    entries: RwLock<HashMap<String, StateEntry>>,
    clock: Arc<dyn Clock>,
    strict_fingerprint: bool,
    ttl: TimeDelta,
}

impl StateRegistry {
    /// Empty registry. With `strict_fingerprint` a mismatch fails validation.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, strict_fingerprint: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            strict_fingerprint,
            ttl: TimeDelta::minutes(STATE_TTL_MINUTES),
        }
    }

    fn is_expired(&self, entry: &StateEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at > self.ttl
    }

    /// Issues a token for `provider` bound to `fingerprint`.
    pub fn issue(&self, provider: &str, fingerprint: &str) -> Result<String> {
        let token = random_token()?;
        let entry = StateEntry {
            provider: provider.to_string(),
            fingerprint: fingerprint.to_string(),
            created_at: self.clock.now(),
        };
        self.entries.write().insert(token.clone(), entry);
        Ok(token)
    }

    /// Consumes `token`. Fails `unauthorized` when it is unknown, expired or
    /// was issued for another provider.
    pub fn validate(&self, token: &str, provider: &str, fingerprint: &str) -> Result<()> {
        let entry = self
            .entries
            .write()
            .remove(token)
            .ok_or_else(|| Error::unauthorized("invalid or expired state"))?;

        if self.is_expired(&entry, self.clock.now()) {
            return Err(Error::unauthorized("expired state"));
        }

        if entry.provider != provider {
            return Err(Error::unauthorized(format!(
                "state was issued for provider '{}', not '{provider}'",
                entry.provider
            )));
        }

        if entry.fingerprint != fingerprint {
            if self.strict_fingerprint {
                return Err(Error::unauthorized("state fingerprint mismatch"));
            }
            tracing::warn!(
                provider,
                issued_to = %entry.fingerprint,
                presented = %fingerprint,
                "OAuth state fingerprint mismatch"
            );
        }

        Ok(())
    }

    /// Reads an entry without consuming it.
    #[must_use]
    pub fn peek(&self, token: &str) -> Option<StateEntry> {
        self.entries.read().get(token).cloned()
    }

    /// Live and expired counts.
    #[must_use]
    pub fn stats(&self) -> StateStats {
        let now = self.clock.now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| self.is_expired(e, now)).count();
        StateStats {
            live: entries.len() - expired,
            expired,
        }
    }

    /// Drops every expired entry. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !self.is_expired(e, now));
        before - entries.len()
    }

    /// Sweeps every `SWEEP_INTERVAL` until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "expired OAuth states swept");
                        }
                    }
                }
            }
        })
    }
}
