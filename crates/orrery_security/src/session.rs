//! # Session Registry
//!
//! Maps the authentication cookie to a player for 24 hours. In memory only:
//! a restart logs everybody out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use orrery_shared::{Clock, PlayerId, Result};
use parking_lot::RwLock;

use crate::token::random_token;

/// Session lifetime, also the cookie's `Max-Age`.
pub const SESSION_TTL_HOURS: i64 = 24;

/// A logged-in player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    /// Who.
    pub player_id: PlayerId,
    /// Until when.
    pub expires_at: DateTime<Utc>,
}

/// Cookie value -> session.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// `Max-Age` for the cookie, in seconds.
    #[inline]
    #[must_use]
    pub const fn max_age_seconds() -> i64 {
        SESSION_TTL_HOURS * 3600
    }

    /// Opens a session, returning the cookie value.
    pub fn issue(&self, player_id: PlayerId) -> Result<(String, Session)> {
        let token = random_token()?;
        let session = Session {
            player_id,
            expires_at: self.clock.now() + TimeDelta::hours(SESSION_TTL_HOURS),
        };
        self.sessions.write().insert(token.clone(), session);
        Ok((token, session))
    }

    /// The session behind a cookie, if it has not expired.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<Session> {
        let now = self.clock.now();
        self.sessions
            .read()
            .get(token)
            .copied()
            .filter(|s| s.expires_at > now)
    }

    /// Drops expired sessions. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_shared::ManualClock;

    #[test]
    fn test_session_expires_after_a_day() {
        let clock = ManualClock::default();
        let registry = SessionRegistry::new(Arc::new(clock.clone()));
        let (token, session) = registry.issue(7).unwrap();

        assert_eq!(registry.lookup(&token), Some(session));
        clock.advance(TimeDelta::hours(23));
        assert!(registry.lookup(&token).is_some());
        clock.advance(TimeDelta::hours(1));
        assert!(registry.lookup(&token).is_none());
        assert_eq!(registry.sweep(), 1);
    }

    #[test]
    fn test_max_age_matches_cookie() {
        assert_eq!(SessionRegistry::max_age_seconds(), 86_400);
    }
}
