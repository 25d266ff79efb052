//! # Batch Generators
//!
//! The storage half of generation. `orrery_procedural` builds the rows,
//! these drivers hand them to an [`Executor`](orrery_store::Executor) one
//! level at a time:
//!
//! ```text
//! parents ──► push_parent_rows × p ──► insert_spatial_batch ──► child ids
//! systems ──► roll_system × k      ──► insert_planet_batch  ──► planets
//! ```
//!
//! Both take `E: Executor + ?Sized`, so a boxed transaction and a plain
//! connection work the same way.

mod planets;
mod spatial;

pub use planets::generate_planets;
pub use spatial::generate_level;

use orrery_shared::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Fails with a cancellation error once `cancel` has fired.
#[inline]
pub fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled());
    }
    Ok(())
}
