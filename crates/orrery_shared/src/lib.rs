//! # ORRERY Shared
//!
//! Common types used by the generator, the store and the server.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `sqlx`
//! - `axum`
//! - Any storage or transport crate
//!
//! If you need a row type, put it in `orrery_store`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod error;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::{GALAXY_NAMES, PLANET_SUFFIXES, SECTOR_NAMES, SYSTEM_NAMES};
pub use error::{Error, ErrorKind, Result};
pub use model::{
    EntityType, NewPlanet, NewRun, NewSpatialEntity, Planet, PlanetId, PlanetType, PlayerId,
    ProviderIdentity, Run, RunId, RunStatus, SpatialEntity, SpatialId,
};
