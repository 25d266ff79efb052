//! # Postgres Store
//!
//! Batches are one statement each: typed arrays go in, `UNNEST ... WITH
//! ORDINALITY` expands them, and the generated ids are joined back on the
//! natural unique key and ordered by ordinality.
//!
//! ```text
//! $1..$7 arrays ──> input(ord) ──INSERT──> inserted(id, key)
//!                      │                        │
//!                      │                 bump parents' child_count
//!                      └──── JOIN on key ───────┘
//!                                 │
//!                          ids ORDER BY ord
//! ```
//!
//! Enum columns are bound and read as text, so row structs stay plain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orrery_shared::{
    EntityType, Error, ErrorKind, NewPlanet, NewRun, NewSpatialEntity, Planet, PlayerId,
    ProviderIdentity, Result, Run, RunId, SpatialEntity, SpatialId,
};
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, Postgres};

use crate::executor::{Executor, Store, Transaction};

/// Schema migrations shipped with this crate.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// =============================================================================
// ERRORS
// =============================================================================

/// Maps a driver error into the taxonomy, keeping it as the cause.
fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |err| {
        let kind = match &err {
            sqlx::Error::RowNotFound => ErrorKind::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        };
        Error::new(kind, context).with_cause(err)
    }
}

// =============================================================================
// ROWS
// =============================================================================

macro_rules! run_columns {
    () => {
        "id, name, seed, root_spatial_id, planet_count, status::text AS status, current_turn, \
         max_players, turn_interval_hours, next_turn_at, created_at, updated_at"
    };
}

macro_rules! spatial_columns {
    ($p:literal) => {
        concat!(
            $p, "id, ", $p, "run_id, ", $p, "parent_id, ", $p, "entity_type::text AS entity_type, ",
            $p, "level, ", $p, "x_coord, ", $p, "y_coord, ", $p, "name, ", $p, "child_count, ",
            $p, "created_at, ", $p, "updated_at"
        )
    };
}

macro_rules! planet_columns {
    ($p:literal) => {
        concat!(
            $p, "id, ", $p, "system_id, ", $p, "planet_index, ", $p, "name, ",
            $p, "type::text AS planet_type, ", $p, "size, ", $p, "population, ",
            $p, "max_population, ", $p, "owner_id, ", $p, "created_at, ", $p, "updated_at"
        )
    };
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: i64,
    name: String,
    seed: String,
    root_spatial_id: Option<i64>,
    planet_count: i64,
    status: String,
    current_turn: i32,
    max_players: i32,
    turn_interval_hours: i32,
    next_turn_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RunRow> for Run {
    type Error = Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            seed: row.seed,
            root_spatial_id: row.root_spatial_id,
            planet_count: row.planet_count,
            status: row.status.parse()?,
            current_turn: row.current_turn,
            max_players: row.max_players,
            turn_interval_hours: row.turn_interval_hours,
            next_turn_at: row.next_turn_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SpatialRow {
    id: i64,
    run_id: i64,
    parent_id: Option<i64>,
    entity_type: String,
    level: i32,
    x_coord: i32,
    y_coord: i32,
    name: String,
    child_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SpatialRow> for SpatialEntity {
    type Error = Error;

    fn try_from(row: SpatialRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            run_id: row.run_id,
            parent_id: row.parent_id,
            entity_type: row.entity_type.parse()?,
            level: row.level,
            x_coord: row.x_coord,
            y_coord: row.y_coord,
            name: row.name,
            child_count: row.child_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PlanetRow {
    id: i64,
    system_id: i64,
    planet_index: i32,
    name: String,
    planet_type: String,
    size: i32,
    population: i64,
    max_population: i64,
    owner_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlanetRow> for Planet {
    type Error = Error;

    fn try_from(row: PlanetRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            system_id: row.system_id,
            planet_index: row.planet_index,
            name: row.name,
            planet_type: row.planet_type.parse()?,
            size: row.size,
            population: row.population,
            max_population: row.max_population,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// STATEMENTS
// =============================================================================

async fn insert_run(conn: &mut PgConnection, run: &NewRun) -> Result<Run> {
    let row: RunRow = sqlx::query_as(concat!(
        "INSERT INTO runs (name, seed, max_players, turn_interval_hours) \
         VALUES ($1, $2, $3, $4) RETURNING ",
        run_columns!()
    ))
    .bind(&run.name)
    .bind(&run.seed)
    .bind(run.max_players)
    .bind(run.turn_interval_hours)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("insert run"))?;
    row.try_into()
}

async fn get_run(conn: &mut PgConnection, id: RunId) -> Result<Run> {
    let row: Option<RunRow> =
        sqlx::query_as(concat!("SELECT ", run_columns!(), " FROM runs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error("load run"))?;
    row.ok_or_else(|| Error::not_found(format!("run {id} not found")))?
        .try_into()
}

async fn link_root(conn: &mut PgConnection, run_id: RunId, root: SpatialId) -> Result<()> {
    let done = sqlx::query("UPDATE runs SET root_spatial_id = $2, updated_at = now() WHERE id = $1")
        .bind(run_id)
        .bind(root)
        .execute(&mut *conn)
        .await
        .map_err(db_error("link run root"))?;
    if done.rows_affected() == 0 {
        return Err(Error::not_found(format!("run {run_id} not found")));
    }
    Ok(())
}

async fn update_planet_count(conn: &mut PgConnection, run_id: RunId, count: i64) -> Result<()> {
    let done = sqlx::query("UPDATE runs SET planet_count = $2, updated_at = now() WHERE id = $1")
        .bind(run_id)
        .bind(count)
        .execute(&mut *conn)
        .await
        .map_err(db_error("update planet count"))?;
    if done.rows_affected() == 0 {
        return Err(Error::not_found(format!("run {run_id} not found")));
    }
    Ok(())
}

async fn activate_run(
    conn: &mut PgConnection,
    run_id: RunId,
    next_turn_at: DateTime<Utc>,
) -> Result<Run> {
    let row: Option<RunRow> = sqlx::query_as(concat!(
        "UPDATE runs SET status = 'active', current_turn = 1, next_turn_at = $2, updated_at = now() \
         WHERE id = $1 AND status = 'creating' RETURNING ",
        run_columns!()
    ))
    .bind(run_id)
    .bind(next_turn_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("activate run"))?;

    if let Some(row) = row {
        return row.try_into();
    }

    let status: Option<String> = sqlx::query_scalar("SELECT status::text FROM runs WHERE id = $1")
        .bind(run_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("load run status"))?;
    match status {
        None => Err(Error::not_found(format!("run {run_id} not found"))),
        Some(status) => Err(Error::conflict(format!(
            "run {run_id} is {status}, expected creating"
        ))),
    }
}

async fn list_run_ids(conn: &mut PgConnection) -> Result<Vec<RunId>> {
    sqlx::query_scalar("SELECT id FROM runs ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("list runs"))
}

async fn delete_runs(conn: &mut PgConnection, ids: &[RunId]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let done = sqlx::query("DELETE FROM runs WHERE id = ANY($1)")
        .bind(ids.to_vec())
        .execute(&mut *conn)
        .await
        .map_err(db_error("delete runs"))?;
    Ok(done.rows_affected())
}

const INSERT_SPATIAL_BATCH: &str = "\
WITH input AS (
    SELECT *
    FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::TEXT[], $4::INT[], $5::INT[], $6::INT[], $7::TEXT[])
        WITH ORDINALITY AS t (run_id, parent_id, entity_type, level, x_coord, y_coord, name, ord)
),
inserted AS (
    INSERT INTO spatial_entities (run_id, parent_id, entity_type, level, x_coord, y_coord, name)
    SELECT run_id, parent_id, entity_type::entity_type, level, x_coord, y_coord, name
    FROM input
    ORDER BY ord
    RETURNING id, parent_id, x_coord, y_coord
),
bumped AS (
    UPDATE spatial_entities AS s
    SET child_count = s.child_count + c.n, updated_at = now()
    FROM (
        SELECT parent_id, COUNT(*)::INT AS n
        FROM inserted
        WHERE parent_id IS NOT NULL
        GROUP BY parent_id
    ) AS c
    WHERE s.id = c.parent_id
)
SELECT inserted.id
FROM input
JOIN inserted
  ON inserted.parent_id IS NOT DISTINCT FROM input.parent_id
 AND inserted.x_coord = input.x_coord
 AND inserted.y_coord = input.y_coord
ORDER BY input.ord";

async fn insert_spatial_batch(
    conn: &mut PgConnection,
    rows: &[NewSpatialEntity],
) -> Result<Vec<SpatialId>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let run_ids: Vec<i64> = rows.iter().map(|r| r.run_id).collect();
    let parent_ids: Vec<Option<i64>> = rows.iter().map(|r| r.parent_id).collect();
    let types: Vec<&str> = rows.iter().map(|r| r.entity_type.as_str()).collect();
    let levels: Vec<i32> = rows.iter().map(|r| r.level).collect();
    let xs: Vec<i32> = rows.iter().map(|r| r.x_coord).collect();
    let ys: Vec<i32> = rows.iter().map(|r| r.y_coord).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();

    let ids: Vec<SpatialId> = sqlx::query_scalar(INSERT_SPATIAL_BATCH)
        .bind(run_ids)
        .bind(parent_ids)
        .bind(types)
        .bind(levels)
        .bind(xs)
        .bind(ys)
        .bind(names)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("insert spatial batch"))?;

    if ids.len() != rows.len() {
        return Err(Error::internal(format!(
            "spatial batch returned {} ids for {} rows",
            ids.len(),
            rows.len()
        )));
    }
    tracing::debug!(rows = rows.len(), "spatial batch inserted");
    Ok(ids)
}

const INSERT_PLANET_BATCH: &str = concat!(
    "\
WITH input AS (
    SELECT *
    FROM UNNEST($1::BIGINT[], $2::INT[], $3::TEXT[], $4::TEXT[], $5::INT[], $6::BIGINT[], $7::BIGINT[])
        WITH ORDINALITY AS t (system_id, planet_index, name, planet_type, size, population, max_population, ord)
),
inserted AS (
    INSERT INTO planets (system_id, planet_index, name, type, size, population, max_population)
    SELECT system_id, planet_index, name, planet_type::planet_type, size, population, max_population
    FROM input
    ORDER BY ord
    RETURNING *
)
SELECT ",
    planet_columns!("inserted."),
    "
FROM input
JOIN inserted
  ON inserted.system_id = input.system_id
 AND inserted.planet_index = input.planet_index
ORDER BY input.ord"
);

async fn insert_planet_batch(conn: &mut PgConnection, rows: &[NewPlanet]) -> Result<Vec<Planet>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let systems: Vec<i64> = rows.iter().map(|r| r.system_id).collect();
    let indices: Vec<i32> = rows.iter().map(|r| r.planet_index).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let types: Vec<&str> = rows.iter().map(|r| r.planet_type.as_str()).collect();
    let sizes: Vec<i32> = rows.iter().map(|r| r.size).collect();
    let populations: Vec<i64> = rows.iter().map(|r| r.population).collect();
    let caps: Vec<i64> = rows.iter().map(|r| r.max_population).collect();

    let inserted: Vec<PlanetRow> = sqlx::query_as(INSERT_PLANET_BATCH)
        .bind(systems)
        .bind(indices)
        .bind(names)
        .bind(types)
        .bind(sizes)
        .bind(populations)
        .bind(caps)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("insert planet batch"))?;

    if inserted.len() != rows.len() {
        return Err(Error::internal(format!(
            "planet batch returned {} rows for {} inputs",
            inserted.len(),
            rows.len()
        )));
    }
    tracing::debug!(rows = rows.len(), "planet batch inserted");
    convert_all(inserted)
}

async fn get_spatial(conn: &mut PgConnection, id: SpatialId) -> Result<SpatialEntity> {
    let row: Option<SpatialRow> = sqlx::query_as(concat!(
        "SELECT ",
        spatial_columns!(""),
        " FROM spatial_entities WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("load spatial entity"))?;
    row.ok_or_else(|| Error::not_found(format!("spatial entity {id} not found")))?
        .try_into()
}

async fn get_children(conn: &mut PgConnection, parent: SpatialId) -> Result<Vec<SpatialEntity>> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM spatial_entities WHERE id = $1)")
            .bind(parent)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error("check spatial entity"))?;
    if !exists {
        return Err(Error::not_found(format!("spatial entity {parent} not found")));
    }

    let rows: Vec<SpatialRow> = sqlx::query_as(concat!(
        "SELECT ",
        spatial_columns!(""),
        " FROM spatial_entities WHERE parent_id = $1 ORDER BY x_coord, y_coord"
    ))
    .bind(parent)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("load children"))?;
    convert_all(rows)
}

const ANCESTORS: &str = concat!(
    "\
WITH RECURSIVE chain (id, parent_id, depth) AS (
    SELECT id, parent_id, 0 FROM spatial_entities WHERE id = $1
    UNION ALL
    SELECT s.id, s.parent_id, chain.depth + 1
    FROM spatial_entities AS s
    JOIN chain ON s.id = chain.parent_id
    WHERE chain.depth < 16
)
SELECT ",
    spatial_columns!("e."),
    "
FROM chain
JOIN spatial_entities AS e ON e.id = chain.id
ORDER BY e.level"
);

async fn get_ancestors(conn: &mut PgConnection, id: SpatialId) -> Result<Vec<SpatialEntity>> {
    let rows: Vec<SpatialRow> = sqlx::query_as(ANCESTORS)
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("load ancestors"))?;

    let chain: Vec<SpatialEntity> = convert_all(rows)?;
    match chain.first() {
        None => Err(Error::not_found(format!("spatial entity {id} not found"))),
        Some(top) if top.parent_id.is_some() => Err(Error::internal(format!(
            "spatial entity {} points at missing parent",
            top.id
        ))),
        Some(_) => Ok(chain),
    }
}

async fn get_planets(conn: &mut PgConnection, system: SpatialId) -> Result<Vec<Planet>> {
    let entity = get_spatial(conn, system).await?;
    if entity.entity_type != EntityType::System {
        return Err(Error::validation(format!(
            "spatial entity {system} is a {}, not a system",
            entity.entity_type
        )));
    }

    let rows: Vec<PlanetRow> = sqlx::query_as(concat!(
        "SELECT ",
        planet_columns!(""),
        " FROM planets WHERE system_id = $1 ORDER BY planet_index"
    ))
    .bind(system)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("load planets"))?;
    convert_all(rows)
}

async fn linked_player(
    conn: &mut PgConnection,
    identity: &ProviderIdentity,
) -> Result<Option<PlayerId>> {
    sqlx::query_scalar(
        "SELECT player_id FROM auth_providers WHERE provider = $1 AND provider_user_id = $2",
    )
    .bind(&identity.provider)
    .bind(&identity.provider_user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("look up provider link"))
}

async fn resolve_player(conn: &mut PgConnection, identity: &ProviderIdentity) -> Result<PlayerId> {
    if let Some(player_id) = linked_player(conn, identity).await? {
        sqlx::query(
            "UPDATE players SET display_name = $2, email = COALESCE($3, email), updated_at = now() \
             WHERE id = $1",
        )
        .bind(player_id)
        .bind(&identity.display_name)
        .bind(&identity.email)
        .execute(&mut *conn)
        .await
        .map_err(db_error("refresh player"))?;
        return Ok(player_id);
    }

    let player_id: i64 =
        sqlx::query_scalar("INSERT INTO players (display_name, email) VALUES ($1, $2) RETURNING id")
            .bind(&identity.display_name)
            .bind(&identity.email)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error("create player"))?;

    // Waits on a concurrent first login for the same identity, then yields to it.
    let linked: Option<i64> = sqlx::query_scalar(
        "INSERT INTO auth_providers (provider, provider_user_id, player_id) VALUES ($1, $2, $3) \
         ON CONFLICT (provider, provider_user_id) DO NOTHING RETURNING player_id",
    )
    .bind(&identity.provider)
    .bind(&identity.provider_user_id)
    .bind(player_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("link provider identity"))?;

    if linked.is_some() {
        tracing::info!(player_id, provider = %identity.provider, "player created");
        return Ok(player_id);
    }

    sqlx::query("DELETE FROM players WHERE id = $1")
        .bind(player_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("drop duplicate player"))?;
    let winner = linked_player(conn, identity).await?.ok_or_else(|| {
        Error::internal(format!(
            "{} identity {} conflicted but is not linked",
            identity.provider, identity.provider_user_id
        ))
    })?;
    tracing::debug!(player_id = winner, provider = %identity.provider, "concurrent first login joined");
    Ok(winner)
}

// =============================================================================
// HANDLES
// =============================================================================

/// Implements `Executor` for a type with a `conn(&mut self) -> &mut PgConnection`.
macro_rules! pg_executor {
    ($handle:ty) => {
        #[async_trait]
        impl Executor for $handle {
            async fn insert_run(&mut self, run: &NewRun) -> Result<Run> {
                insert_run(self.conn(), run).await
            }

            async fn get_run(&mut self, id: RunId) -> Result<Run> {
                get_run(self.conn(), id).await
            }

            async fn link_root(&mut self, run_id: RunId, root: SpatialId) -> Result<()> {
                link_root(self.conn(), run_id, root).await
            }

            async fn update_planet_count(&mut self, run_id: RunId, count: i64) -> Result<()> {
                update_planet_count(self.conn(), run_id, count).await
            }

            async fn activate_run(
                &mut self,
                run_id: RunId,
                next_turn_at: DateTime<Utc>,
            ) -> Result<Run> {
                activate_run(self.conn(), run_id, next_turn_at).await
            }

            async fn list_run_ids(&mut self) -> Result<Vec<RunId>> {
                list_run_ids(self.conn()).await
            }

            async fn delete_runs(&mut self, ids: &[RunId]) -> Result<u64> {
                delete_runs(self.conn(), ids).await
            }

            async fn insert_spatial_batch(
                &mut self,
                rows: &[NewSpatialEntity],
            ) -> Result<Vec<SpatialId>> {
                insert_spatial_batch(self.conn(), rows).await
            }

            async fn insert_planet_batch(&mut self, rows: &[NewPlanet]) -> Result<Vec<Planet>> {
                insert_planet_batch(self.conn(), rows).await
            }

            async fn get_spatial(&mut self, id: SpatialId) -> Result<SpatialEntity> {
                get_spatial(self.conn(), id).await
            }

            async fn get_children(&mut self, parent: SpatialId) -> Result<Vec<SpatialEntity>> {
                get_children(self.conn(), parent).await
            }

            async fn get_ancestors(&mut self, id: SpatialId) -> Result<Vec<SpatialEntity>> {
                get_ancestors(self.conn(), id).await
            }

            async fn get_planets(&mut self, system: SpatialId) -> Result<Vec<Planet>> {
                get_planets(self.conn(), system).await
            }

            async fn resolve_player(&mut self, identity: &ProviderIdentity) -> Result<PlayerId> {
                resolve_player(self.conn(), identity).await
            }
        }
    };
}

/// A Postgres transaction. Dropped without `commit`, the driver rolls back.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTx {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

pg_executor!(PgTx);

#[async_trait]
impl Transaction for PgTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(db_error("commit"))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(db_error("rollback"))
    }
}

/// A pooled connection in autocommit mode.
pub struct PgConn {
    conn: PoolConnection<Postgres>,
}

impl PgConn {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

pg_executor!(PgConn);

// =============================================================================
// STORE
// =============================================================================

/// Postgres-backed store over a shared pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool of at most `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| Error::external("database unreachable").with_cause(e))?;
        Ok(Self { pool })
    }

    /// Applies pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::internal("database migration failed").with_cause(e))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin transaction"))?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn acquire(&self) -> Result<Box<dyn Executor>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("acquire connection"))?;
        Ok(Box::new(PgConn { conn }))
    }
}
