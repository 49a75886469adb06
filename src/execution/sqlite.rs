//! SQLite adapter.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle};

use super::backend::{ColumnMeta, RowSet, SqlBackend};
use super::error::BackendError;
use crate::sql::Dialect;

/// Executes statements on a SQLite connection.
///
/// Calls run on the blocking thread pool; the connection is shared behind a
/// mutex so the backend is cheap to clone. Dropping the future of a call
/// (as a timeout does) cancels it: a call still waiting for the connection
/// never starts, and a running statement is interrupted, so the connection
/// is released for the next caller.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let conn = Connection::open(path).map_err(to_backend_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory().map_err(to_backend_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Run a batch of setup statements (schema, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(to_backend_error)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::new("POISONED", "connection lock poisoned"))
    }
}

#[async_trait]
impl SqlBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str) -> Result<RowSet, BackendError> {
        let state = Arc::new(Mutex::new(CallState::Pending));
        let _cancel = CancelOnDrop {
            state: Arc::clone(&state),
            interrupt: Arc::clone(&self.interrupt),
        };

        let backend = self.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = backend.lock()?;
            if !advance(&state, CallState::Running) {
                return Err(BackendError::new(
                    "OperationInterrupted",
                    "statement cancelled before it started",
                ));
            }
            let result = query_rows(&conn, &sql).map_err(to_backend_error);
            advance(&state, CallState::Done);
            result
        })
        .await
        .map_err(|e| BackendError::new("TASK", e.to_string()))?
    }
}

/// Progress of one call, shared by its future and its blocking task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Pending,
    Running,
    Done,
    Cancelled,
}

/// Move a call forward unless it was cancelled. Returns whether it moved.
fn advance(state: &Mutex<CallState>, next: CallState) -> bool {
    let Ok(mut current) = state.lock() else {
        return false;
    };
    if *current == CallState::Cancelled {
        return false;
    }
    *current = next;
    true
}

/// Cancels its call when the future awaiting the call is dropped early.
///
/// The interrupt is issued while holding the call state, and the task only
/// marks itself done under the same lock, so it always lands on this
/// call's statement and never on the next caller's.
struct CancelOnDrop {
    state: Arc<Mutex<CallState>>,
    interrupt: Arc<InterruptHandle>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match *state {
            CallState::Pending => *state = CallState::Cancelled,
            CallState::Running => {
                tracing::debug!("interrupting abandoned sqlite statement");
                self.interrupt.interrupt();
                *state = CallState::Cancelled;
            }
            CallState::Done | CallState::Cancelled => {}
        }
    }
}

fn query_rows(conn: &Connection, sql: &str) -> rusqlite::Result<RowSet> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = names.len();
    let mut types: Vec<Option<String>> = vec![None; width];

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for (i, ty) in types.iter_mut().enumerate() {
            let value = row.get_ref(i)?;
            if ty.is_none() {
                *ty = storage_type(&value).map(String::from);
            }
            values.push(to_json(value));
        }
        rows.push(values);
    }

    Ok(RowSet {
        columns: names
            .into_iter()
            .zip(types)
            .map(|(name, value_type)| ColumnMeta { name, value_type })
            .collect(),
        rows,
    })
}

fn storage_type(value: &ValueRef<'_>) -> Option<&'static str> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(_) => Some("integer"),
        ValueRef::Real(_) => Some("real"),
        ValueRef::Text(_) => Some("text"),
        ValueRef::Blob(_) => Some("blob"),
    }
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => i.into(),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned().into(),
        ValueRef::Blob(b) => b.iter().map(|byte| format!("{byte:02x}")).collect::<String>().into(),
    }
}

fn to_backend_error(err: rusqlite::Error) -> BackendError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => BackendError::new(format!("{:?}", e.code), err.to_string()),
        _ => BackendError::new("SQLITE", err.to_string()),
    }
}
