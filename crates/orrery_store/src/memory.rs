//! # In-Memory Store
//!
//! The Postgres contract in process. Enforces the same constraints the
//! schema does, with the same error kinds:
//!
//! | Violation                              | Kind       |
//! |----------------------------------------|------------|
//! | duplicate `(parent, x, y)`             | `conflict` |
//! | duplicate `(system, planet_index)`     | `conflict` |
//! | missing run / parent / system (FK)     | `internal` |
//! | level, parent or population checks     | `internal` |
//!
//! A transaction takes the store lock for its whole lifetime and works on a
//! private copy of the state. `commit` swaps the copy in; anything else
//! (rollback, error, drop) discards it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orrery_shared::{
    Clock, EntityType, Error, NewPlanet, NewRun, NewSpatialEntity, Planet, PlanetId, PlayerId,
    ProviderIdentity, Result, Run, RunId, RunStatus, SpatialEntity, SpatialId, SystemClock,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::executor::{Executor, Store, Transaction};

/// Where an injected failure fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    /// `insert_spatial_batch`.
    SpatialBatch,
    /// `insert_planet_batch`.
    PlanetBatch,
    /// `activate_run`.
    Activate,
    /// `Transaction::commit`.
    Commit,
}

/// Row counts, for asserting that nothing leaked out of a rollback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryCounts {
    /// Runs.
    pub runs: usize,
    /// Spatial entities.
    pub spatial: usize,
    /// Planets.
    pub planets: usize,
    /// Players.
    pub players: usize,
}

#[derive(Clone, Debug)]
struct PlayerRow {
    display_name: String,
    email: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct Sequences {
    run: i64,
    spatial: i64,
    planet: i64,
    player: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Clone, Debug, Default)]
struct MemoryState {
    seq: Sequences,
    runs: BTreeMap<RunId, Run>,
    spatial: BTreeMap<SpatialId, SpatialEntity>,
    /// Unique `(parent_id, x, y)`. Roots have no parent and are not indexed.
    cells: HashSet<(SpatialId, i32, i32)>,
    planets: BTreeMap<PlanetId, Planet>,
    /// Unique `(system_id, planet_index)`.
    slots: HashSet<(SpatialId, i32)>,
    players: BTreeMap<PlayerId, PlayerRow>,
    links: HashMap<(String, String), PlayerId>,
    fail_point: Option<FailPoint>,
}

impl MemoryState {
    fn trip(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            return Err(Error::internal(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn counts(&self) -> MemoryCounts {
        MemoryCounts {
            runs: self.runs.len(),
            spatial: self.spatial.len(),
            planets: self.planets.len(),
            players: self.players.len(),
        }
    }

    fn run_mut(&mut self, id: RunId) -> Result<&mut Run> {
        self.runs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("run {id} not found")))
    }

    // =========================================================================
    // RUNS
    // =========================================================================

    fn insert_run(&mut self, now: DateTime<Utc>, run: &NewRun) -> Result<Run> {
        if run.max_players <= 0 || run.turn_interval_hours <= 0 {
            return Err(Error::internal(
                "check violation: max_players and turn_interval_hours must be positive",
            ));
        }
        let row = Run {
            id: next(&mut self.seq.run),
            name: run.name.clone(),
            seed: run.seed.clone(),
            root_spatial_id: None,
            planet_count: 0,
            status: RunStatus::Creating,
            current_turn: 0,
            max_players: run.max_players,
            turn_interval_hours: run.turn_interval_hours,
            next_turn_at: None,
            created_at: now,
            updated_at: now,
        };
        self.runs.insert(row.id, row.clone());
        Ok(row)
    }

    fn get_run(&self, id: RunId) -> Result<Run> {
        self.runs
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("run {id} not found")))
    }

    fn link_root(&mut self, now: DateTime<Utc>, run_id: RunId, root: SpatialId) -> Result<()> {
        let run = self.run_mut(run_id)?;
        run.root_spatial_id = Some(root);
        run.updated_at = now;
        Ok(())
    }

    fn update_planet_count(&mut self, now: DateTime<Utc>, run_id: RunId, count: i64) -> Result<()> {
        if count < 0 {
            return Err(Error::internal("check violation: planet_count must not be negative"));
        }
        let run = self.run_mut(run_id)?;
        run.planet_count = count;
        run.updated_at = now;
        Ok(())
    }

    fn activate_run(
        &mut self,
        now: DateTime<Utc>,
        run_id: RunId,
        next_turn_at: DateTime<Utc>,
    ) -> Result<Run> {
        self.trip(FailPoint::Activate)?;
        let run = self.run_mut(run_id)?;
        if run.status != RunStatus::Creating {
            return Err(Error::conflict(format!(
                "run {run_id} is {}, expected creating",
                run.status
            )));
        }
        if run.root_spatial_id.is_none() {
            return Err(Error::internal(format!(
                "check violation: run {run_id} has no root spatial entity"
            )));
        }
        run.status = RunStatus::Active;
        run.current_turn = 1;
        run.next_turn_at = Some(next_turn_at);
        run.updated_at = now;
        Ok(run.clone())
    }

    fn list_run_ids(&self) -> Vec<RunId> {
        self.runs.keys().copied().collect()
    }

    fn delete_runs(&mut self, ids: &[RunId]) -> u64 {
        let doomed: HashSet<RunId> = ids
            .iter()
            .copied()
            .filter(|id| self.runs.contains_key(id))
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        self.runs.retain(|id, _| !doomed.contains(id));

        let mut gone = HashSet::new();
        self.spatial.retain(|id, entity| {
            let keep = !doomed.contains(&entity.run_id);
            if !keep {
                gone.insert(*id);
            }
            keep
        });
        self.cells.retain(|(parent, _, _)| !gone.contains(parent));
        self.planets.retain(|_, planet| !gone.contains(&planet.system_id));
        self.slots.retain(|(system, _)| !gone.contains(system));

        doomed.len() as u64
    }

    // =========================================================================
    // BATCH WRITERS
    // =========================================================================

    fn insert_spatial_batch(
        &mut self,
        now: DateTime<Utc>,
        rows: &[NewSpatialEntity],
    ) -> Result<Vec<SpatialId>> {
        self.trip(FailPoint::SpatialBatch)?;

        // Check the whole statement before touching anything.
        let mut batch_cells = HashSet::with_capacity(rows.len());
        for row in rows {
            if !self.runs.contains_key(&row.run_id) {
                return Err(Error::internal(format!(
                    "foreign key violation: run {} does not exist",
                    row.run_id
                )));
            }
            if row.level != row.entity_type.level() {
                return Err(Error::internal(format!(
                    "check violation: {} at level {}",
                    row.entity_type, row.level
                )));
            }
            match row.parent_id {
                None if row.level == 0 => {}
                None => {
                    return Err(Error::internal(format!(
                        "check violation: level {} entity without parent",
                        row.level
                    )));
                }
                Some(parent_id) => {
                    let parent = self.spatial.get(&parent_id).ok_or_else(|| {
                        Error::internal(format!(
                            "foreign key violation: parent {parent_id} does not exist"
                        ))
                    })?;
                    if parent.level != row.level - 1 || parent.run_id != row.run_id {
                        return Err(Error::internal(format!(
                            "parent {parent_id} (level {}, run {}) cannot hold level {} of run {}",
                            parent.level, parent.run_id, row.level, row.run_id
                        )));
                    }
                    let cell = (parent_id, row.x_coord, row.y_coord);
                    if self.cells.contains(&cell) || !batch_cells.insert(cell) {
                        return Err(Error::conflict(format!(
                            "cell ({}, {}) of parent {parent_id} is taken",
                            row.x_coord, row.y_coord
                        )));
                    }
                }
            }
        }

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = next(&mut self.seq.spatial);
            if let Some(parent_id) = row.parent_id {
                self.cells.insert((parent_id, row.x_coord, row.y_coord));
                if let Some(parent) = self.spatial.get_mut(&parent_id) {
                    parent.child_count += 1;
                    parent.updated_at = now;
                }
            }
            self.spatial.insert(
                id,
                SpatialEntity {
                    id,
                    run_id: row.run_id,
                    parent_id: row.parent_id,
                    entity_type: row.entity_type,
                    level: row.level,
                    x_coord: row.x_coord,
                    y_coord: row.y_coord,
                    name: row.name.clone(),
                    child_count: 0,
                    created_at: now,
                    updated_at: now,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    fn insert_planet_batch(&mut self, now: DateTime<Utc>, rows: &[NewPlanet]) -> Result<Vec<Planet>> {
        self.trip(FailPoint::PlanetBatch)?;

        let mut batch_slots = HashSet::with_capacity(rows.len());
        for row in rows {
            if !self.spatial.contains_key(&row.system_id) {
                return Err(Error::internal(format!(
                    "foreign key violation: system {} does not exist",
                    row.system_id
                )));
            }
            let habitable_ok = row.planet_type.is_habitable() || row.max_population == 0;
            if row.size <= 0
                || row.population < 0
                || row.population > row.max_population
                || row.planet_index < 0
                || !habitable_ok
            {
                return Err(Error::internal(format!(
                    "check violation: planet {} of system {}",
                    row.planet_index, row.system_id
                )));
            }
            let slot = (row.system_id, row.planet_index);
            if self.slots.contains(&slot) || !batch_slots.insert(slot) {
                return Err(Error::conflict(format!(
                    "planet index {} of system {} is taken",
                    row.planet_index, row.system_id
                )));
            }
        }

        let mut planets = Vec::with_capacity(rows.len());
        for row in rows {
            let planet = Planet {
                id: next(&mut self.seq.planet),
                system_id: row.system_id,
                planet_index: row.planet_index,
                name: row.name.clone(),
                planet_type: row.planet_type,
                size: row.size,
                population: row.population,
                max_population: row.max_population,
                owner_id: None,
                created_at: now,
                updated_at: now,
            };
            self.slots.insert((row.system_id, row.planet_index));
            self.planets.insert(planet.id, planet.clone());
            planets.push(planet);
        }
        Ok(planets)
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    fn get_spatial(&self, id: SpatialId) -> Result<SpatialEntity> {
        self.spatial
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("spatial entity {id} not found")))
    }

    fn get_children(&self, parent: SpatialId) -> Result<Vec<SpatialEntity>> {
        if !self.spatial.contains_key(&parent) {
            return Err(Error::not_found(format!("spatial entity {parent} not found")));
        }
        let mut children: Vec<_> = self
            .spatial
            .values()
            .filter(|e| e.parent_id == Some(parent))
            .cloned()
            .collect();
        children.sort_by_key(|e| (e.x_coord, e.y_coord));
        Ok(children)
    }

    fn get_ancestors(&self, id: SpatialId) -> Result<Vec<SpatialEntity>> {
        let mut current = self.get_spatial(id)?;
        let mut chain = Vec::with_capacity(EntityType::ALL.len());
        while let Some(parent_id) = current.parent_id {
            let parent = self.spatial.get(&parent_id).cloned().ok_or_else(|| {
                Error::internal(format!(
                    "spatial entity {} points at missing parent {parent_id}",
                    current.id
                ))
            })?;
            chain.push(current);
            current = parent;
        }
        chain.push(current);
        chain.reverse();
        Ok(chain)
    }

    fn get_planets(&self, system: SpatialId) -> Result<Vec<Planet>> {
        let entity = self.get_spatial(system)?;
        if entity.entity_type != EntityType::System {
            return Err(Error::validation(format!(
                "spatial entity {system} is a {}, not a system",
                entity.entity_type
            )));
        }
        let mut planets: Vec<_> = self
            .planets
            .values()
            .filter(|p| p.system_id == system)
            .cloned()
            .collect();
        planets.sort_by_key(|p| p.planet_index);
        Ok(planets)
    }

    // =========================================================================
    // PLAYERS
    // =========================================================================

    fn resolve_player(&mut self, identity: &ProviderIdentity) -> Result<PlayerId> {
        let key = (identity.provider.clone(), identity.provider_user_id.clone());
        if let Some(&id) = self.links.get(&key) {
            if let Some(player) = self.players.get_mut(&id) {
                player.display_name.clone_from(&identity.display_name);
                if identity.email.is_some() {
                    player.email.clone_from(&identity.email);
                }
            }
            return Ok(id);
        }

        let id = next(&mut self.seq.player);
        self.players.insert(
            id,
            PlayerRow {
                display_name: identity.display_name.clone(),
                email: identity.email.clone(),
            },
        );
        self.links.insert(key, id);
        Ok(id)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// In-process store. Clones share the same state.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Empty store stamping rows with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            clock,
        }
    }

    /// Arms (or with `None`, disarms) a failure.
    pub async fn inject_failure(&self, point: Option<FailPoint>) {
        self.state.lock().await.fail_point = point;
    }

    /// Committed row counts.
    pub async fn counts(&self) -> MemoryCounts {
        self.state.lock().await.counts()
    }

    /// Display name and e-mail stored for a player.
    pub async fn player(&self, id: PlayerId) -> Option<(String, Option<String>)> {
        self.state
            .lock()
            .await
            .players
            .get(&id)
            .map(|p| (p.display_name.clone(), p.email.clone()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            clock: Arc::clone(&self.clock),
        }))
    }

    async fn acquire(&self) -> Result<Box<dyn Executor>> {
        Ok(Box::new(MemoryConn {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }))
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// Holds the store lock and a private working copy.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Executor for MemoryTx {
    async fn insert_run(&mut self, run: &NewRun) -> Result<Run> {
        let now = self.clock.now();
        self.work.insert_run(now, run)
    }

    async fn get_run(&mut self, id: RunId) -> Result<Run> {
        self.work.get_run(id)
    }

    async fn link_root(&mut self, run_id: RunId, root: SpatialId) -> Result<()> {
        let now = self.clock.now();
        self.work.link_root(now, run_id, root)
    }

    async fn update_planet_count(&mut self, run_id: RunId, count: i64) -> Result<()> {
        let now = self.clock.now();
        self.work.update_planet_count(now, run_id, count)
    }

    async fn activate_run(&mut self, run_id: RunId, next_turn_at: DateTime<Utc>) -> Result<Run> {
        let now = self.clock.now();
        self.work.activate_run(now, run_id, next_turn_at)
    }

    async fn list_run_ids(&mut self) -> Result<Vec<RunId>> {
        Ok(self.work.list_run_ids())
    }

    async fn delete_runs(&mut self, ids: &[RunId]) -> Result<u64> {
        Ok(self.work.delete_runs(ids))
    }

    async fn insert_spatial_batch(&mut self, rows: &[NewSpatialEntity]) -> Result<Vec<SpatialId>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        self.work.insert_spatial_batch(now, rows)
    }

    async fn insert_planet_batch(&mut self, rows: &[NewPlanet]) -> Result<Vec<Planet>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        self.work.insert_planet_batch(now, rows)
    }

    async fn get_spatial(&mut self, id: SpatialId) -> Result<SpatialEntity> {
        self.work.get_spatial(id)
    }

    async fn get_children(&mut self, parent: SpatialId) -> Result<Vec<SpatialEntity>> {
        self.work.get_children(parent)
    }

    async fn get_ancestors(&mut self, id: SpatialId) -> Result<Vec<SpatialEntity>> {
        self.work.get_ancestors(id)
    }

    async fn get_planets(&mut self, system: SpatialId) -> Result<Vec<Planet>> {
        self.work.get_planets(system)
    }

    async fn resolve_player(&mut self, identity: &ProviderIdentity) -> Result<PlayerId> {
        self.work.resolve_player(identity)
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.work.trip(FailPoint::Commit)?;
        let Self { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Autocommit access: every call locks, applies, releases.
pub struct MemoryConn {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Executor for MemoryConn {
    async fn insert_run(&mut self, run: &NewRun) -> Result<Run> {
        let now = self.clock.now();
        self.state.lock().await.insert_run(now, run)
    }

    async fn get_run(&mut self, id: RunId) -> Result<Run> {
        self.state.lock().await.get_run(id)
    }

    async fn link_root(&mut self, run_id: RunId, root: SpatialId) -> Result<()> {
        let now = self.clock.now();
        self.state.lock().await.link_root(now, run_id, root)
    }

    async fn update_planet_count(&mut self, run_id: RunId, count: i64) -> Result<()> {
        let now = self.clock.now();
        self.state.lock().await.update_planet_count(now, run_id, count)
    }

    async fn activate_run(&mut self, run_id: RunId, next_turn_at: DateTime<Utc>) -> Result<Run> {
        let now = self.clock.now();
        self.state.lock().await.activate_run(now, run_id, next_turn_at)
    }

    async fn list_run_ids(&mut self) -> Result<Vec<RunId>> {
        Ok(self.state.lock().await.list_run_ids())
    }

    async fn delete_runs(&mut self, ids: &[RunId]) -> Result<u64> {
        Ok(self.state.lock().await.delete_runs(ids))
    }

    async fn insert_spatial_batch(&mut self, rows: &[NewSpatialEntity]) -> Result<Vec<SpatialId>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        self.state.lock().await.insert_spatial_batch(now, rows)
    }

    async fn insert_planet_batch(&mut self, rows: &[NewPlanet]) -> Result<Vec<Planet>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        self.state.lock().await.insert_planet_batch(now, rows)
    }

    async fn get_spatial(&mut self, id: SpatialId) -> Result<SpatialEntity> {
        self.state.lock().await.get_spatial(id)
    }

    async fn get_children(&mut self, parent: SpatialId) -> Result<Vec<SpatialEntity>> {
        self.state.lock().await.get_children(parent)
    }

    async fn get_ancestors(&mut self, id: SpatialId) -> Result<Vec<SpatialEntity>> {
        self.state.lock().await.get_ancestors(id)
    }

    async fn get_planets(&mut self, system: SpatialId) -> Result<Vec<Planet>> {
        self.state.lock().await.get_planets(system)
    }

    async fn resolve_player(&mut self, identity: &ProviderIdentity) -> Result<PlayerId> {
        self.state.lock().await.resolve_player(identity)
    }
}
