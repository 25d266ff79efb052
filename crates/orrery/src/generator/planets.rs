use orrery_procedural::{PlanetBand, PlanetRoller, SeedRng};
use orrery_shared::{Error, Planet, Result, SpatialId};
use orrery_store::Executor;

/// Rolls every system's planets from `rng` and inserts them in one batch.
///
/// Systems are visited in input order, so the same stream and the same
/// system order always produce the same planets.
pub async fn generate_planets<E>(
    exec: &mut E,
    systems: &[SpatialId],
    band: PlanetBand,
    rng: &mut SeedRng,
) -> Result<Vec<Planet>>
where
    E: Executor + ?Sized,
{
    let roller = PlanetRoller::new(band);
    let mut rows = Vec::with_capacity(systems.len() * band.max as usize);
    for &system in systems {
        roller.roll_system(rng, system, &mut rows);
    }

    let planets = exec
        .insert_planet_batch(&rows)
        .await
        .map_err(|e| e.context("failed to insert planets"))?;

    if planets.len() != rows.len() {
        return Err(Error::internal(format!(
            "planet batch returned {} rows for {} planets",
            planets.len(),
            rows.len()
        )));
    }

    tracing::debug!(systems = systems.len(), planets = planets.len(), "planet batch inserted");
    Ok(planets)
}
