use orrery_procedural::{push_parent_rows, LevelPlan};
use orrery_shared::{Error, Result, RunId, SpatialId};
use orrery_store::Executor;
use tokio_util::sync::CancellationToken;

use super::checkpoint;

/// Creates `level.per_parent` children under every parent in one batch.
///
/// Ids come back grouped by parent: `ids[i * n .. (i + 1) * n]` belong to
/// `parents[i]`. Cancellation is checked before each parent, and a
/// cancelled level never reaches the store.
pub async fn generate_level<E>(
    exec: &mut E,
    run_id: RunId,
    parents: &[SpatialId],
    level: &LevelPlan,
    cancel: &CancellationToken,
) -> Result<Vec<SpatialId>>
where
    E: Executor + ?Sized,
{
    if parents.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = Vec::with_capacity(parents.len() * level.per_parent as usize);
    for &parent in parents {
        checkpoint(cancel)?;
        push_parent_rows(run_id, parent, level.entity_type, level.per_parent, &mut rows);
    }

    let ids = exec
        .insert_spatial_batch(&rows)
        .await
        .map_err(|e| e.context(format!("failed to insert {} level", level.entity_type)))?;

    if ids.len() != rows.len() {
        return Err(Error::internal(format!(
            "{} batch returned {} ids for {} rows",
            level.entity_type,
            ids.len(),
            rows.len()
        )));
    }

    tracing::debug!(
        entity_type = %level.entity_type,
        parents = parents.len(),
        rows = rows.len(),
        "spatial batch inserted"
    );
    Ok(ids)
}
