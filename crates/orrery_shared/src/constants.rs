//! # Generation Constants
//!
//! Fixed literal pools and limits for universe generation.
//!
//! **CRITICAL:** Changing any list here changes every universe generated
//! from an existing seed. Append-only is NOT safe either: names are picked
//! with `i mod len`.

// =============================================================================
// NAME POOLS
// =============================================================================

/// Galaxy names, cycled per parent.
pub const GALAXY_NAMES: &[&str] = &[
    "Andromeda",
    "Milky Way",
    "Centaurus",
    "Pegasus",
    "Cygnus",
    "Draco",
];

/// Sector names, cycled per parent.
pub const SECTOR_NAMES: &[&str] = &[
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta",
];

/// System names, cycled per parent.
pub const SYSTEM_NAMES: &[&str] = &[
    "Altair", "Vega", "Sirius", "Arcturus", "Capella", "Rigel", "Procyon",
];

/// Planet name suffixes: `"Planet " + PLANET_SUFFIXES[i mod 18]`.
pub const PLANET_SUFFIXES: &[&str] = &[
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X",
    "Prime", "Alpha", "Beta", "Gamma", "Major", "Minor", "Core", "Outer",
];

// =============================================================================
// PLANET ROLL RANGES
// =============================================================================

/// Smallest planet size.
pub const PLANET_SIZE_MIN: i32 = 50;

/// Largest planet size.
pub const PLANET_SIZE_MAX: i32 = 200;

/// Smallest non-zero max population.
pub const PLANET_MAX_POPULATION_MIN: i64 = 100_000;

/// Largest max population.
pub const PLANET_MAX_POPULATION_MAX: i64 = 999_999;

// =============================================================================
// PLAN DEFAULTS & LIMITS
// =============================================================================

/// Galaxies under the universe when the request leaves it at zero.
pub const DEFAULT_GALAXY_COUNT: u32 = 1;

/// Sectors per galaxy when the request leaves it at zero.
pub const DEFAULT_SECTORS_PER_GALAXY: u32 = 10;

/// Systems per sector when the request leaves it at zero.
pub const DEFAULT_SYSTEMS_PER_SECTOR: u32 = 10;

/// Lower planet bound when the request leaves it at zero.
pub const DEFAULT_MIN_PLANETS: u32 = 1;

/// Upper planet bound when the request leaves it at zero.
pub const DEFAULT_MAX_PLANETS: u32 = 8;

/// Largest number of spatial entities a single run may hold.
pub const MAX_SPATIAL_ENTITIES: u64 = 1_000_000;

/// Largest number of planets a single run may hold.
pub const MAX_PLANETS: u64 = 10_000_000;

// =============================================================================
// SEEDS
// =============================================================================

/// Shortest accepted user seed.
pub const SEED_MIN_LEN: usize = 3;

/// Longest accepted user seed.
pub const SEED_MAX_LEN: usize = 32;

/// Bytes of OS entropy in a generated seed (hex encoded: 16 chars).
pub const GENERATED_SEED_BYTES: usize = 8;
