//! Statement execution with bounded repair.
//!
//! - `backend`: the database boundary ([`SqlBackend`]) and row sets
//! - `sqlite`: SQLite adapter over `rusqlite`
//! - `classify`: backend error classification
//! - `reformulate`: the [`Reformulator`] seam and a heuristic implementation
//! - `repair`: the attempt/repair state machine

mod backend;
mod classify;
mod error;
mod reformulate;
mod repair;
mod sqlite;

pub use backend::{ColumnMeta, RowSet, SqlBackend};
pub use classify::{classify, ClassifiedError, FailureClass, ObjectKind, ObjectRef};
pub use error::{BackendError, RepairError};
pub use reformulate::{HeuristicReformulator, NoReformulation, Reformulator};
pub use repair::{fingerprint, Attempt, RepairConfig, RepairLoop, RepairSession, RepairState};
pub use sqlite::SqliteBackend;
