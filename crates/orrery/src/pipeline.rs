//! # Run Pipeline
//!
//! One create request becomes one active run, or nothing at all.
//!
//! ```text
//! validate ─► resolve seed ─► plan                          (no store access)
//!    │
//!    ▼  [create gate]
//! purge old runs ─► BEGIN
//!    insert run (creating) ─► universe (0,0) ─► link root
//!    galaxies ─► sectors ─► systems ─► planets ─► planet_count
//!    activate (turn 1, next turn = ceil(now, 1h))
//! COMMIT ─► reload run
//! ```
//!
//! Any failure between BEGIN and COMMIT rolls back. Cancellation is checked
//! before every level and before every parent inside a level.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use orrery_procedural::{GenerationPlan, UniverseConfig, WorldSeed};
use orrery_shared::{Clock, Error, NewRun, NewSpatialEntity, Result, Run, RunId};
use orrery_store::{Executor, Store};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::GenerationDefaults;
use crate::generator::{checkpoint, generate_level, generate_planets};

// =============================================================================
// REQUEST
// =============================================================================

/// `game` section of a create request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Run name, defaulted from config.
    pub name: Option<String>,
    /// World seed, generated when absent or empty.
    pub seed: Option<String>,
    /// Player cap, defaulted from config.
    pub max_players: Option<i32>,
    /// Hours between turns, defaulted from config.
    pub turn_interval_hours: Option<i32>,
}

/// Body of `POST /admin/runs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateRunRequest {
    /// Run settings.
    pub game: GameSettings,
    /// Universe shape.
    pub universe: UniverseConfig,
}

impl CreateRunRequest {
    /// Request with only a seed and a shape.
    #[must_use]
    pub fn seeded(seed: &str, universe: UniverseConfig) -> Self {
        Self {
            game: GameSettings {
                seed: Some(seed.to_string()),
                ..GameSettings::default()
            },
            universe,
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Rounds up to the next whole hour. Whole hours are returned unchanged.
pub fn ceil_to_hour(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let hour = TimeDelta::hours(1);
    let floor = now
        .duration_trunc(hour)
        .map_err(|e| Error::internal("cannot round timestamp").with_cause(e))?;
    Ok(if floor == now { floor } else { floor + hour })
}

fn resolve_settings(game: &GameSettings, defaults: &GenerationDefaults) -> Result<NewRun> {
    let name = game
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&defaults.run_name)
        .to_string();
    if name.is_empty() {
        return Err(Error::validation("run name must not be empty"));
    }

    let max_players = game.max_players.unwrap_or(defaults.max_players);
    if max_players < 1 {
        return Err(Error::validation(format!(
            "max_players must be at least 1, got {max_players}"
        )));
    }

    let turn_interval_hours = game.turn_interval_hours.unwrap_or(defaults.turn_interval_hours);
    if turn_interval_hours < 1 {
        return Err(Error::validation(format!(
            "turn_interval_hours must be at least 1, got {turn_interval_hours}"
        )));
    }

    Ok(NewRun {
        name,
        seed: String::new(),
        max_players,
        turn_interval_hours,
    })
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Generates runs against a store.
pub struct Pipeline {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    defaults: GenerationDefaults,
    create_gate: Mutex<()>,
}

impl Pipeline {
    /// Pipeline writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, defaults: GenerationDefaults) -> Self {
        Self {
            store,
            clock,
            defaults,
            create_gate: Mutex::new(()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Replaces every existing run with a freshly generated, active one.
    ///
    /// Input is validated before any store access. Concurrent calls in this
    /// process queue behind each other.
    pub async fn create_run(
        &self,
        request: &CreateRunRequest,
        cancel: &CancellationToken,
    ) -> Result<Run> {
        let mut new_run = resolve_settings(&request.game, &self.defaults)?;
        let seed = WorldSeed::resolve(request.game.seed.as_deref())?;
        let plan = GenerationPlan::from_config(&request.universe)?;
        new_run.seed = seed.as_str().to_string();

        let span = tracing::info_span!("create_run", seed = %seed.as_str(), run_name = %new_run.name);
        async move {
            let _gate = self.create_gate.lock().await;
            let started = Instant::now();

            self.purge().await?;

            let mut tx = self.store.begin().await?;
            let outcome = self.generate(&mut *tx, &new_run, &seed, &plan, cancel).await;
            let run_id = match outcome {
                Ok(run_id) => {
                    tx.commit().await.map_err(|e| e.context("failed to commit run"))?;
                    run_id
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "rollback failed");
                    }
                    tracing::warn!(error = %err, cancelled = err.is_cancelled(), "run generation aborted");
                    return Err(err);
                }
            };

            let run = self.store.acquire().await?.get_run(run_id).await?;
            tracing::info!(
                run_id,
                planets = run.planet_count,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "run active"
            );
            Ok(run)
        }
        .instrument(span)
        .await
    }

    /// Deletes every existing run, outside any transaction.
    async fn purge(&self) -> Result<()> {
        let mut conn = self.store.acquire().await?;
        let ids = conn.list_run_ids().await?;
        if ids.is_empty() {
            return Ok(());
        }
        let removed = conn
            .delete_runs(&ids)
            .await
            .map_err(|e| e.context("failed to purge previous runs"))?;
        tracing::info!(removed, "previous runs purged");
        Ok(())
    }

    async fn generate<E>(
        &self,
        exec: &mut E,
        new_run: &NewRun,
        seed: &WorldSeed,
        plan: &GenerationPlan,
        cancel: &CancellationToken,
    ) -> Result<RunId>
    where
        E: Executor + ?Sized,
    {
        let run = exec.insert_run(new_run).await?;

        let root = exec
            .insert_spatial_batch(&[NewSpatialEntity::universe(run.id, &run.name)])
            .await?
            .first()
            .copied()
            .ok_or_else(|| Error::internal("universe insert returned no id"))?;
        exec.link_root(run.id, root).await?;

        let mut parents = vec![root];
        for level in &plan.levels {
            checkpoint(cancel)?;
            parents = generate_level(exec, run.id, &parents, level, cancel).await?;
            tracing::info!(
                run_id = run.id,
                level = level.level(),
                entity_type = %level.entity_type,
                created = parents.len(),
                "level generated"
            );
        }

        checkpoint(cancel)?;
        let mut rng = seed.rng();
        let planets = generate_planets(exec, &parents, plan.planets, &mut rng).await?;
        let planet_count = i64::try_from(planets.len())
            .map_err(|e| Error::internal("planet count overflow").with_cause(e))?;
        exec.update_planet_count(run.id, planet_count).await?;
        tracing::info!(run_id = run.id, planets = planet_count, "planets generated");

        let next_turn_at = ceil_to_hour(self.clock.now())?;
        exec.activate_run(run.id, next_turn_at).await?;
        Ok(run.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orrery_shared::ErrorKind;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_ceil_to_hour() {
        assert_eq!(ceil_to_hour(at(12, 0, 0)).unwrap(), at(12, 0, 0));
        assert_eq!(ceil_to_hour(at(12, 0, 1)).unwrap(), at(13, 0, 0));
        assert_eq!(ceil_to_hour(at(12, 59, 59)).unwrap(), at(13, 0, 0));
        assert_eq!(
            ceil_to_hour(at(23, 30, 0)).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_settings_fall_back_to_defaults() {
        let defaults = GenerationDefaults::default();
        let run = resolve_settings(&GameSettings::default(), &defaults).unwrap();
        assert_eq!(run.name, "Orrery");
        assert_eq!(run.max_players, 8);
        assert_eq!(run.turn_interval_hours, 24);

        let blank = GameSettings {
            name: Some("   ".into()),
            ..GameSettings::default()
        };
        assert_eq!(resolve_settings(&blank, &defaults).unwrap().name, "Orrery");
    }

    #[test]
    fn test_settings_reject_non_positive_values() {
        let defaults = GenerationDefaults::default();
        let game = GameSettings {
            max_players: Some(0),
            ..GameSettings::default()
        };
        assert_eq!(
            resolve_settings(&game, &defaults).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let game = GameSettings {
            turn_interval_hours: Some(-3),
            ..GameSettings::default()
        };
        assert_eq!(
            resolve_settings(&game, &defaults).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = r#"{"game":{"seed":"feedface","max_players":4},"universe":{"galaxy_count":2}}"#;
        let request: CreateRunRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.game.seed.as_deref(), Some("feedface"));
        assert_eq!(request.game.max_players, Some(4));
        assert_eq!(request.universe.galaxy_count, 2);
        assert_eq!(request.universe.sectors_per_galaxy, 0);

        let empty: CreateRunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, CreateRunRequest::default());
    }
}
