//! # ORRERY Store
//!
//! Transactional persistence for runs, the spatial tree and planets.
//!
//! ## Design Principles
//!
//! 1. **One contract**: `Executor` is implemented by transactions and by raw
//!    connections alike, so batch writers never care which they hold
//! 2. **Set-at-a-time**: a batch is one statement, ids come back in input order
//! 3. **All or nothing**: dropping a `Transaction` without `commit` rolls back
//!
//! ## Backends
//!
//! - `PgStore`: Postgres via `sqlx`, schema in `migrations/`
//! - `MemoryStore`: in-process, same invariants, used by tests
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! let run = tx.insert_run(&new_run).await?;
//! let ids = tx.insert_spatial_batch(&rows).await?;
//! tx.commit().await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod executor;
pub mod memory;
pub mod postgres;

pub use executor::{Executor, Store, Transaction};
pub use memory::{FailPoint, MemoryStore};
pub use postgres::{PgStore, MIGRATOR};
