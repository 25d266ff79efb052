//! # Domain Model
//!
//! Runs, spatial entities and planets as the rest of ORRERY sees them.
//!
//! ## Hierarchy
//!
//! ```text
//! Run ──owns──> universe (level 0, no parent)
//!                 └── galaxy   (level 1)
//!                       └── sector  (level 2)
//!                             └── system (level 3) ──> planets (not spatial)
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{GALAXY_NAMES, SECTOR_NAMES, SYSTEM_NAMES};
use crate::error::Error;

/// Run identifier.
pub type RunId = i64;

/// Spatial entity identifier.
pub type SpatialId = i64;

/// Planet identifier.
pub type PlanetId = i64;

/// Player identifier.
pub type PlayerId = i64;

// =============================================================================
// RUN
// =============================================================================

/// Lifecycle status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Being generated, invisible to players.
    Creating,
    /// Generated and ticking.
    Active,
    /// Ticking suspended.
    Paused,
    /// Finished for good.
    Completed,
}

impl RunStatus {
    /// Wire / column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(Self::Creating),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(Error::internal(format!("unknown run status '{other}'"))),
        }
    }
}

/// A persisted run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Identifier.
    pub id: RunId,
    /// Human name.
    pub name: String,
    /// Seed the world shape was derived from.
    pub seed: String,
    /// Universe entity, set once generation has linked it.
    pub root_spatial_id: Option<SpatialId>,
    /// Planets across every system of the run.
    pub planet_count: i64,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Current turn (0 while creating).
    pub current_turn: i32,
    /// Player cap.
    pub max_players: i32,
    /// Hours between turns.
    pub turn_interval_hours: i32,
    /// Next turn boundary, set iff active.
    pub next_turn_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a run (always inserted as `creating`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRun {
    /// Human name.
    pub name: String,
    /// Resolved seed.
    pub seed: String,
    /// Player cap.
    pub max_players: i32,
    /// Hours between turns.
    pub turn_interval_hours: i32,
}

// =============================================================================
// SPATIAL ENTITIES
// =============================================================================

/// Type tag of a spatial entity. The level is fixed by the type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Level 0, exactly one per run.
    Universe,
    /// Level 1.
    Galaxy,
    /// Level 2.
    Sector,
    /// Level 3, owner of planets.
    System,
}

impl EntityType {
    /// Every type, root first.
    pub const ALL: [Self; 4] = [Self::Universe, Self::Galaxy, Self::Sector, Self::System];

    /// Depth in the spatial tree.
    #[inline]
    #[must_use]
    pub const fn level(self) -> i32 {
        match self {
            Self::Universe => 0,
            Self::Galaxy => 1,
            Self::Sector => 2,
            Self::System => 3,
        }
    }

    /// Type living at `level`, if any.
    #[must_use]
    pub const fn from_level(level: i32) -> Option<Self> {
        match level {
            0 => Some(Self::Universe),
            1 => Some(Self::Galaxy),
            2 => Some(Self::Sector),
            3 => Some(Self::System),
            _ => None,
        }
    }

    /// Type of this type's children (`None` for systems).
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Universe => Some(Self::Galaxy),
            Self::Galaxy => Some(Self::Sector),
            Self::Sector => Some(Self::System),
            Self::System => None,
        }
    }

    /// Name pool for generated entities of this type. Empty for the universe,
    /// which takes the run's name.
    #[must_use]
    pub const fn name_pool(self) -> &'static [&'static str] {
        match self {
            Self::Universe => &[],
            Self::Galaxy => GALAXY_NAMES,
            Self::Sector => SECTOR_NAMES,
            Self::System => SYSTEM_NAMES,
        }
    }

    /// Wire / column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Universe => "universe",
            Self::Galaxy => "galaxy",
            Self::Sector => "sector",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "universe" => Ok(Self::Universe),
            "galaxy" => Ok(Self::Galaxy),
            "sector" => Ok(Self::Sector),
            "system" => Ok(Self::System),
            other => Err(Error::internal(format!("unknown entity type '{other}'"))),
        }
    }
}

/// A persisted spatial entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialEntity {
    /// Identifier.
    pub id: SpatialId,
    /// Owning run.
    pub run_id: RunId,
    /// Parent, `None` iff level 0.
    pub parent_id: Option<SpatialId>,
    /// Type tag.
    pub entity_type: EntityType,
    /// Depth, always `entity_type.level()`.
    pub level: i32,
    /// Grid column within the parent.
    pub x_coord: i32,
    /// Grid row within the parent.
    pub y_coord: i32,
    /// Display name.
    pub name: String,
    /// Number of entities pointing here as parent.
    pub child_count: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a spatial entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSpatialEntity {
    /// Owning run.
    pub run_id: RunId,
    /// Parent, `None` only for the universe.
    pub parent_id: Option<SpatialId>,
    /// Type tag.
    pub entity_type: EntityType,
    /// Depth.
    pub level: i32,
    /// Grid column.
    pub x_coord: i32,
    /// Grid row.
    pub y_coord: i32,
    /// Display name.
    pub name: String,
}

impl NewSpatialEntity {
    /// The level-0 root of a run.
    #[must_use]
    pub fn universe(run_id: RunId, name: impl Into<String>) -> Self {
        Self {
            run_id,
            parent_id: None,
            entity_type: EntityType::Universe,
            level: EntityType::Universe.level(),
            x_coord: 0,
            y_coord: 0,
            name: name.into(),
        }
    }
}

// =============================================================================
// PLANETS
// =============================================================================

/// Planet classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanetType {
    /// Rock, no atmosphere.
    Barren,
    /// Earth-like.
    Terrestrial,
    /// Uninhabitable giant.
    GasGiant,
    /// Frozen.
    Ice,
    /// Molten.
    Volcanic,
}

impl PlanetType {
    /// Weighted-choice order. The cumulative roll walks this array.
    pub const WEIGHTED: [Self; 5] = [
        Self::Terrestrial,
        Self::GasGiant,
        Self::Barren,
        Self::Ice,
        Self::Volcanic,
    ];

    /// Selection weight (sums to 100 across all types).
    #[inline]
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Terrestrial => 40,
            Self::GasGiant => 20,
            Self::Barren | Self::Ice => 15,
            Self::Volcanic => 10,
        }
    }

    /// Whether anyone can live here.
    #[inline]
    #[must_use]
    pub const fn is_habitable(self) -> bool {
        !matches!(self, Self::GasGiant)
    }

    /// Wire / column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Barren => "barren",
            Self::Terrestrial => "terrestrial",
            Self::GasGiant => "gas_giant",
            Self::Ice => "ice",
            Self::Volcanic => "volcanic",
        }
    }
}

impl fmt::Display for PlanetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "barren" => Ok(Self::Barren),
            "terrestrial" => Ok(Self::Terrestrial),
            "gas_giant" => Ok(Self::GasGiant),
            "ice" => Ok(Self::Ice),
            "volcanic" => Ok(Self::Volcanic),
            other => Err(Error::internal(format!("unknown planet type '{other}'"))),
        }
    }
}

/// A persisted planet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    /// Identifier.
    pub id: PlanetId,
    /// Owning system.
    pub system_id: SpatialId,
    /// 0-based position within the system.
    pub planet_index: i32,
    /// Display name.
    pub name: String,
    /// Classification.
    #[serde(rename = "type")]
    pub planet_type: PlanetType,
    /// Size, always positive.
    pub size: i32,
    /// Current population.
    pub population: i64,
    /// Population cap, 0 for gas giants.
    pub max_population: i64,
    /// Owning player, if claimed.
    pub owner_id: Option<PlayerId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a planet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPlanet {
    /// Owning system.
    pub system_id: SpatialId,
    /// 0-based position within the system.
    pub planet_index: i32,
    /// Display name.
    pub name: String,
    /// Classification.
    pub planet_type: PlanetType,
    /// Size.
    pub size: i32,
    /// Starting population.
    pub population: i64,
    /// Population cap.
    pub max_population: i64,
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Identity returned by an OAuth provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider name (`github`, `google`, ...).
    pub provider: String,
    /// Stable user id at the provider.
    pub provider_user_id: String,
    /// Display name reported by the provider.
    pub display_name: String,
    /// E-mail, when the provider disclosed one.
    pub email: Option<String>,
}
