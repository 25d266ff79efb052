//! # Planet Rolls
//!
//! Every planet consumes exactly three draws after its type roll:
//!
//! ```text
//! count = min + int(max - min + 1)            (once per system)
//! per planet:
//!   type  = cumulative(int(100))              terrestrial 40 | gas_giant 20
//!                                             barren 15 | ice 15 | volcanic 10
//!   size  = range(50, 200)
//!   cap   = range(100_000, 999_999)           forced to 0 for gas giants
//! ```
//!
//! The cap is drawn for gas giants too, so stream positions never depend on
//! the type that was rolled.

use orrery_shared::constants::{
    PLANET_MAX_POPULATION_MAX, PLANET_MAX_POPULATION_MIN, PLANET_SIZE_MAX, PLANET_SIZE_MIN,
    PLANET_SUFFIXES,
};
use orrery_shared::{NewPlanet, PlanetType, SpatialId};

use crate::planner::PlanetBand;
use crate::seed::SeedRng;

/// `"Planet " + suffix`, cycling the suffix list.
#[must_use]
pub fn planet_name(index: usize) -> String {
    format!("Planet {}", PLANET_SUFFIXES[index % PLANET_SUFFIXES.len()])
}

/// Rolls planets for systems within a fixed count band.
#[derive(Clone, Copy, Debug)]
pub struct PlanetRoller {
    band: PlanetBand,
}

impl PlanetRoller {
    /// Roller for the given band.
    #[must_use]
    pub const fn new(band: PlanetBand) -> Self {
        Self { band }
    }

    /// Planets in the next system.
    #[inline]
    pub fn roll_count(&self, rng: &mut SeedRng) -> u32 {
        self.band.min + rng.int(self.band.width())
    }

    /// Weighted type choice.
    pub fn roll_type(rng: &mut SeedRng) -> PlanetType {
        let roll = rng.int(100);
        let mut cumulative = 0;
        for planet_type in PlanetType::WEIGHTED {
            cumulative += planet_type.weight();
            if roll < cumulative {
                return planet_type;
            }
        }
        // Weights sum to 100, unreachable in practice.
        PlanetType::Volcanic
    }

    /// Appends every planet of one system to `out` and returns how many.
    // Index and size are bounded by the band and the size constants.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn roll_system(
        &self,
        rng: &mut SeedRng,
        system_id: SpatialId,
        out: &mut Vec<NewPlanet>,
    ) -> u32 {
        let count = self.roll_count(rng);
        out.reserve(count as usize);

        for index in 0..count {
            let planet_type = Self::roll_type(rng);
            let size = rng.range(i64::from(PLANET_SIZE_MIN), i64::from(PLANET_SIZE_MAX));
            let cap = rng.range(PLANET_MAX_POPULATION_MIN, PLANET_MAX_POPULATION_MAX);

            out.push(NewPlanet {
                system_id,
                planet_index: index as i32,
                name: planet_name(index as usize),
                planet_type,
                size: size as i32,
                population: 0,
                max_population: if planet_type.is_habitable() { cap } else { 0 },
            });
        }
        count
    }
}
