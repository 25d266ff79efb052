//! # ORRERY Security - Login Gatekeeping
//!
//! Everything between "the browser asked to log in" and "the player has a
//! session cookie".
//!
//! ## Flow
//!
//! ```text
//! GET /auth/github
//!     │── StateRegistry::issue ─────────► state token (10 min, one use)
//!     ▼
//! provider authorize page
//!     │
//! GET /auth/github/callback?code&state
//!     │── StateRegistry::validate ──────► token consumed
//!     │── IdentityExchange::exchange ───► ProviderIdentity (30s budget)
//!     │── (store) resolve player
//!     │── SessionRegistry::issue ───────► cookie value (24h)
//!     ▼
//! client_url?login=success
//! ```
//!
//! Tokens are 32 bytes from the OS CSPRNG, base64url without padding.
//! The world-shape random stream is never used here.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod oauth_state;
pub mod providers;
pub mod session;
pub mod token;

pub use oauth_state::{StateEntry, StateRegistry, StateStats, STATE_TTL_MINUTES, SWEEP_INTERVAL};
pub use providers::{
    exchange_within, HttpExchange, IdentityExchange, ProviderConfig, EXCHANGE_TIMEOUT,
};
pub use session::{Session, SessionRegistry, SESSION_TTL_HOURS};
pub use token::{constant_time_eq, random_token, TOKEN_BYTES};
