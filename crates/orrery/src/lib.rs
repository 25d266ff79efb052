//! # ORRERY
//!
//! The service crate: generation pipeline, configuration and HTTP boundary.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          ORRERY SERVICE                             │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │   ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐    │
//! │   │   server     │────>│   pipeline   │────>│    generator     │    │
//! │   │  (axum)      │     │  one tx/run  │     │  level batches   │    │
//! │   └──────┬───────┘     └──────┬───────┘     └────────┬─────────┘    │
//! │          │                    │                      │              │
//! │   ┌──────▼───────┐     ┌──────▼───────┐     ┌────────▼─────────┐    │
//! │   │   security   │     │    store     │<────│   procedural     │    │
//! │   │ state/session│     │ pg / memory  │     │ seed, grid, rolls│    │
//! │   └──────────────┘     └──────────────┘     └──────────────────┘    │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML configuration with environment overrides
//! - `generator`: spatial level and planet batch drivers
//! - `pipeline`: the transactional create-run flow
//! - `server`: routes, admin guard, OAuth callback, error rendering

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod generator;
pub mod pipeline;
pub mod server;

// Re-export the units
pub use orrery_procedural as procedural;
pub use orrery_security as security;
pub use orrery_shared as shared;
pub use orrery_store as store;

pub use config::OrreryConfig;
pub use pipeline::{ceil_to_hour, CreateRunRequest, GameSettings, Pipeline};
pub use server::{build_router, serve, AppState};
