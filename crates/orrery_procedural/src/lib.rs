//! # ORRERY Procedural Generation
//!
//! Deterministic universe generation: the pure half of the pipeline.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed + same plan always produces the same rows
//! 2. **Breadth-first**: Every level is produced as one flat batch
//! 3. **Storage-free**: This crate builds insert payloads, it never writes them
//!
//! ## Core Components
//!
//! - `WorldSeed` / `SeedRng`: FNV-1a seeded ChaCha stream
//! - `GenerationPlan`: ordered levels with per-parent fan-out
//! - `GridLayout` / `NameCursor`: coordinates and names for one parent
//! - `PlanetRoller`: planet count, type, size and population rolls
//!
//! ## Example
//!
//! ```rust,ignore
//! use orrery_procedural::{GenerationPlan, PlanetRoller, UniverseConfig, WorldSeed};
//!
//! let seed = WorldSeed::resolve(Some("feedface"))?;
//! let plan = GenerationPlan::from_config(&UniverseConfig::default())?;
//! let mut rng = seed.rng();
//!
//! let mut planets = Vec::new();
//! PlanetRoller::new(plan.planets).roll_system(&mut rng, system_id, &mut planets);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod layout;
pub mod planets;
pub mod planner;
pub mod seed;

pub use layout::{grid_side, push_parent_rows, GridLayout, NameCursor};
pub use planets::{planet_name, PlanetRoller};
pub use planner::{GenerationPlan, LevelPlan, PlanetBand, UniverseConfig};
pub use seed::{fnv1a_64, SeedRng, WorldSeed};
