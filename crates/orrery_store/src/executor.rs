//! # Executor Contract
//!
//! ```text
//!             ┌──────────────┐
//!             │    Store     │  begin() / acquire()
//!             └──────┬───────┘
//!          ┌─────────┴─────────┐
//!   ┌──────▼──────┐     ┌──────▼──────┐
//!   │ Transaction │     │ Connection  │
//!   │ commit()    │     │ (autocommit)│
//!   │ rollback()  │     │             │
//!   └──────┬──────┘     └──────┬──────┘
//!          └─────── Executor ──┘   batch writers, traversal reader
//! ```
//!
//! Every method is one store round-trip, except empty batches which return
//! immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orrery_shared::{
    NewPlanet, NewRun, NewSpatialEntity, Planet, PlayerId, ProviderIdentity, Result, Run, RunId,
    SpatialEntity, SpatialId,
};

/// Anything that can run the store's statements.
#[async_trait]
pub trait Executor: Send {
    // =========================================================================
    // RUNS
    // =========================================================================

    /// Inserts a run in `creating` state.
    async fn insert_run(&mut self, run: &NewRun) -> Result<Run>;

    /// Loads a run. `not_found` if absent.
    async fn get_run(&mut self, id: RunId) -> Result<Run>;

    /// Points the run at its universe entity.
    async fn link_root(&mut self, run_id: RunId, root: SpatialId) -> Result<()>;

    /// Stores the aggregate planet count.
    async fn update_planet_count(&mut self, run_id: RunId, count: i64) -> Result<()>;

    /// `creating -> active`, turn 1, next turn at `next_turn_at`.
    ///
    /// `conflict` if the run is not `creating`, `not_found` if absent.
    async fn activate_run(&mut self, run_id: RunId, next_turn_at: DateTime<Utc>) -> Result<Run>;

    /// Every run id, ascending.
    async fn list_run_ids(&mut self) -> Result<Vec<RunId>>;

    /// Deletes runs and everything they own. Returns the number removed.
    async fn delete_runs(&mut self, ids: &[RunId]) -> Result<u64>;

    // =========================================================================
    // BATCH WRITERS
    // =========================================================================

    /// Inserts spatial rows and bumps their parents' child counts.
    ///
    /// Ids are returned in input order. Empty input makes no round-trip.
    async fn insert_spatial_batch(&mut self, rows: &[NewSpatialEntity]) -> Result<Vec<SpatialId>>;

    /// Inserts planets, returning full rows in input order.
    async fn insert_planet_batch(&mut self, rows: &[NewPlanet]) -> Result<Vec<Planet>>;

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// One spatial entity. `not_found` if absent.
    async fn get_spatial(&mut self, id: SpatialId) -> Result<SpatialEntity>;

    /// Children ordered by `(x, y)`. `not_found` if the parent is absent.
    async fn get_children(&mut self, parent: SpatialId) -> Result<Vec<SpatialEntity>>;

    /// The entity and all its ancestors, root first.
    async fn get_ancestors(&mut self, id: SpatialId) -> Result<Vec<SpatialEntity>>;

    /// Planets of a system ordered by index.
    async fn get_planets(&mut self, system: SpatialId) -> Result<Vec<Planet>>;

    // =========================================================================
    // PLAYERS
    // =========================================================================

    /// Player linked to a provider identity, created on first sight.
    async fn resolve_player(&mut self, identity: &ProviderIdentity) -> Result<PlayerId>;
}

/// An open transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait Transaction: Executor {
    /// Makes every change visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every change.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Source of transactions and connections.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction on one pooled connection.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Borrows a connection, each statement committing on its own.
    async fn acquire(&self) -> Result<Box<dyn Executor>>;
}
