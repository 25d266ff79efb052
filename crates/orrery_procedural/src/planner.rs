//! # Generation Planner
//!
//! Turns the `universe` section of a create request into an ordered level
//! plan:
//!
//! ```text
//! [(galaxy, g), (sector, s), (system, y)]  +  planet band [min, max]
//! ```
//!
//! Zero means "use the default". Everything is validated here, before the
//! pipeline touches the store.

use orrery_shared::constants::{
    DEFAULT_GALAXY_COUNT, DEFAULT_MAX_PLANETS, DEFAULT_MIN_PLANETS, DEFAULT_SECTORS_PER_GALAXY,
    DEFAULT_SYSTEMS_PER_SECTOR, MAX_PLANETS, MAX_SPATIAL_ENTITIES,
};
use orrery_shared::{EntityType, Error, Result};
use serde::{Deserialize, Serialize};

/// Universe shape as requested. Omitted or zero fields take defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Galaxies under the universe.
    pub galaxy_count: u32,
    /// Sectors under each galaxy.
    pub sectors_per_galaxy: u32,
    /// Systems under each sector.
    pub systems_per_sector: u32,
    /// Fewest planets per system.
    pub min_planets_per_system: u32,
    /// Most planets per system.
    pub max_planets_per_system: u32,
}

impl UniverseConfig {
    /// Shorthand used heavily by tests and tools.
    #[must_use]
    pub const fn new(galaxies: u32, sectors: u32, systems: u32, min: u32, max: u32) -> Self {
        Self {
            galaxy_count: galaxies,
            sectors_per_galaxy: sectors,
            systems_per_sector: systems,
            min_planets_per_system: min,
            max_planets_per_system: max,
        }
    }

    /// Copy with every zero field replaced by its default.
    #[must_use]
    pub const fn with_defaults(self) -> Self {
        const fn or(value: u32, default: u32) -> u32 {
            if value == 0 {
                default
            } else {
                value
            }
        }
        Self {
            galaxy_count: or(self.galaxy_count, DEFAULT_GALAXY_COUNT),
            sectors_per_galaxy: or(self.sectors_per_galaxy, DEFAULT_SECTORS_PER_GALAXY),
            systems_per_sector: or(self.systems_per_sector, DEFAULT_SYSTEMS_PER_SECTOR),
            min_planets_per_system: or(self.min_planets_per_system, DEFAULT_MIN_PLANETS),
            max_planets_per_system: or(self.max_planets_per_system, DEFAULT_MAX_PLANETS),
        }
    }
}

/// One breadth-first level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelPlan {
    /// Type of every entity created at this level.
    pub entity_type: EntityType,
    /// Children created under each parent.
    pub per_parent: u32,
}

impl LevelPlan {
    /// Depth of the entities this level creates.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> i32 {
        self.entity_type.level()
    }
}

/// Inclusive planet count range per system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanetBand {
    /// Fewest planets.
    pub min: u32,
    /// Most planets.
    pub max: u32,
}

impl PlanetBand {
    /// Number of distinct counts (`max - min + 1`).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max - self.min + 1
    }
}

/// Validated, defaulted plan for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationPlan {
    /// Levels below the universe, root-most first.
    pub levels: Vec<LevelPlan>,
    /// Planet range per system.
    pub planets: PlanetBand,
}

impl GenerationPlan {
    /// Builds the plan, applying defaults and validating bounds.
    pub fn from_config(config: &UniverseConfig) -> Result<Self> {
        let config = config.with_defaults();

        if config.min_planets_per_system > config.max_planets_per_system {
            return Err(Error::validation(format!(
                "min_planets_per_system ({}) exceeds max_planets_per_system ({})",
                config.min_planets_per_system, config.max_planets_per_system
            )));
        }

        // Fan-outs line up with the type chain below the universe.
        let fan_outs = [
            config.galaxy_count,
            config.sectors_per_galaxy,
            config.systems_per_sector,
        ];
        let mut levels = Vec::with_capacity(fan_outs.len());
        let mut parent = EntityType::Universe;
        for per_parent in fan_outs {
            let Some(entity_type) = parent.child() else {
                break;
            };
            levels.push(LevelPlan {
                entity_type,
                per_parent,
            });
            parent = entity_type;
        }

        let plan = Self {
            levels,
            planets: PlanetBand {
                min: config.min_planets_per_system,
                max: config.max_planets_per_system,
            },
        };

        let entities = plan.total_spatial_entities();
        if entities > MAX_SPATIAL_ENTITIES {
            return Err(Error::validation(format!(
                "plan creates {entities} spatial entities, limit is {MAX_SPATIAL_ENTITIES}"
            )));
        }
        let planets = plan.max_planets();
        if planets > MAX_PLANETS {
            return Err(Error::validation(format!(
                "plan may create {planets} planets, limit is {MAX_PLANETS}"
            )));
        }

        Ok(plan)
    }

    /// Entities created at each level (parents × fan-out), root excluded.
    #[must_use]
    pub fn level_totals(&self) -> Vec<u64> {
        let mut parents = 1u64;
        self.levels
            .iter()
            .map(|level| {
                parents = parents.saturating_mul(u64::from(level.per_parent));
                parents
            })
            .collect()
    }

    /// `1 + g + g·s + g·s·y`.
    #[must_use]
    pub fn total_spatial_entities(&self) -> u64 {
        self.level_totals()
            .into_iter()
            .fold(1u64, u64::saturating_add)
    }

    /// Number of leaf systems (`g·s·y`).
    #[must_use]
    pub fn system_count(&self) -> u64 {
        self.level_totals().last().copied().unwrap_or(0)
    }

    /// Most planets the plan can produce.
    #[must_use]
    pub fn max_planets(&self) -> u64 {
        self.system_count().saturating_mul(u64::from(self.planets.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_shared::ErrorKind;

    #[test]
    fn test_zero_config_takes_defaults() {
        let plan = GenerationPlan::from_config(&UniverseConfig::default()).unwrap();
        let fan_out: Vec<_> = plan.levels.iter().map(|l| (l.entity_type, l.per_parent)).collect();
        assert_eq!(
            fan_out,
            vec![
                (EntityType::Galaxy, 1),
                (EntityType::Sector, 10),
                (EntityType::System, 10),
            ]
        );
        assert_eq!(plan.planets, PlanetBand { min: 1, max: 8 });
    }

    #[test]
    fn test_levels_are_root_most_first() {
        let plan = GenerationPlan::from_config(&UniverseConfig::new(2, 3, 4, 1, 1)).unwrap();
        let levels: Vec<_> = plan.levels.iter().map(LevelPlan::level).collect();
        assert_eq!(levels, vec![1, 2, 3]);
    }

    #[test]
    fn test_totals() {
        let plan = GenerationPlan::from_config(&UniverseConfig::new(2, 2, 2, 1, 3)).unwrap();
        assert_eq!(plan.level_totals(), vec![2, 4, 8]);
        assert_eq!(plan.total_spatial_entities(), 15);
        assert_eq!(plan.system_count(), 8);
        assert_eq!(plan.max_planets(), 24);
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let err = GenerationPlan::from_config(&UniverseConfig::new(1, 1, 1, 5, 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_min_above_default_max_is_rejected() {
        // max omitted -> 8, min 9 no longer fits.
        let err = GenerationPlan::from_config(&UniverseConfig::new(1, 1, 1, 9, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_oversized_plan_is_rejected() {
        let err =
            GenerationPlan::from_config(&UniverseConfig::new(1000, 1000, 1000, 1, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_band() {
        let band = PlanetBand { min: 2, max: 2 };
        assert_eq!(band.width(), 1);
    }

    #[test]
    fn test_partial_json_config() {
        let config: UniverseConfig =
            serde_json::from_str(r#"{"galaxy_count": 3, "max_planets_per_system": 4}"#).unwrap();
        let config = config.with_defaults();
        assert_eq!(config, UniverseConfig::new(3, 10, 10, 1, 4));
    }
}
