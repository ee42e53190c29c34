//! Durable task records and the node expansion audit trail.
//!
//! Each running task writes only its own `discovery_tasks` row, so no
//! cross-task locking is needed beyond SQLite's own.

pub mod audit;
pub mod tasks;

pub use audit::{list_expansions, record_expansion, ExpansionRecord};
pub use tasks::{
    create_task, finish_task, get_task, list_incomplete_tasks, list_tasks, update_progress,
};

use rusqlite::types::Type;

/// Convert a parse failure on a stored enum column into a rusqlite row error.
pub(crate) fn column_parse_error(
    idx: usize,
    err: crate::error::DiscoveryError,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
