//! # Determinism Integration Test
//!
//! Same seed + same plan must give the same universe, row for row.

use orrery_procedural::{push_parent_rows, GenerationPlan, PlanetRoller, UniverseConfig, WorldSeed};
use orrery_shared::{NewPlanet, NewSpatialEntity, PlanetType};

/// Walks a plan the way the pipeline does, handing out sequential fake ids.
fn materialise(seed: &str, config: UniverseConfig) -> (Vec<NewSpatialEntity>, Vec<NewPlanet>) {
    let seed = WorldSeed::parse(seed).unwrap();
    let plan = GenerationPlan::from_config(&config).unwrap();
    let mut rng = seed.rng();

    let mut next_id = 1i64;
    let mut parents = vec![next_id];
    let mut spatial = vec![NewSpatialEntity::universe(1, "Test")];

    for level in &plan.levels {
        let mut rows = Vec::new();
        for parent in &parents {
            push_parent_rows(1, *parent, level.entity_type, level.per_parent, &mut rows);
        }
        parents = rows
            .iter()
            .map(|_| {
                next_id += 1;
                next_id
            })
            .collect();
        spatial.extend(rows);
    }

    let roller = PlanetRoller::new(plan.planets);
    let mut planets = Vec::new();
    for system in &parents {
        roller.roll_system(&mut rng, *system, &mut planets);
    }
    (spatial, planets)
}

fn planet_tuples(planets: &[NewPlanet]) -> Vec<(PlanetType, i32, i64, String)> {
    planets
        .iter()
        .map(|p| (p.planet_type, p.size, p.max_population, p.name.clone()))
        .collect()
}

#[test]
fn test_same_seed_same_universe() {
    let config = UniverseConfig::new(2, 3, 4, 1, 8);
    let (spatial_a, planets_a) = materialise("feedface", config);
    let (spatial_b, planets_b) = materialise("feedface", config);

    assert_eq!(spatial_a, spatial_b);
    assert_eq!(planet_tuples(&planets_a), planet_tuples(&planets_b));
}

#[test]
fn test_different_seed_different_planets() {
    let config = UniverseConfig::new(1, 10, 10, 1, 8);
    let (_, planets_a) = materialise("feedface", config);
    let (_, planets_b) = materialise("deadbeef", config);

    assert_ne!(planet_tuples(&planets_a), planet_tuples(&planets_b));
}

#[test]
fn test_entity_count_matches_plan() {
    let config = UniverseConfig::new(2, 2, 2, 1, 1);
    let (spatial, planets) = materialise("feedface", config);

    assert_eq!(spatial.len(), 1 + 2 + 4 + 8);
    assert_eq!(planets.len(), 8);

    let plan = GenerationPlan::from_config(&config).unwrap();
    assert_eq!(spatial.len() as u64, plan.total_spatial_entities());
}

#[test]
fn test_planet_total_within_band() {
    let config = UniverseConfig::new(1, 5, 5, 2, 6);
    let (_, planets) = materialise("abc", config);
    let systems = 25;
    assert!(planets.len() >= systems * 2);
    assert!(planets.len() <= systems * 6);
    assert!(planets
        .iter()
        .filter(|p| p.planet_type == PlanetType::GasGiant)
        .all(|p| p.max_population == 0));
}
