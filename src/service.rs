use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{params, params_from_iter, Connection, InterruptHandle, OptionalExtension};
use tracing::debug;

use crate::db::{timestamp_column, Database};
use crate::error::{StoreError, TodoError};
use crate::models::Todo;

const SELECT_BY_ID: &str =
    "SELECT id, subject, description, created_at, updated_at FROM todos WHERE id = ?1";
const READ_ALL: &str =
    "SELECT id, subject, description, created_at, updated_at FROM todos ORDER BY id DESC";
const READ_LATEST: &str =
    "SELECT id, subject, description, created_at, updated_at FROM todos ORDER BY id DESC LIMIT ?1";
const READ_BEFORE: &str = "SELECT id, subject, description, created_at, updated_at FROM todos \
     WHERE id < ?1 ORDER BY id DESC LIMIT ?2";

/// CRUD over the `todos` table.
///
/// Every clone shares one connection. Statements run on tokio's blocking
/// pool so request tasks never block the runtime on SQLite. Dropping an
/// operation's future cancels its store call: a call still waiting for the
/// connection is skipped and a running statement is interrupted.
#[derive(Clone)]
pub struct TodoService {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl TodoService {
    pub fn new(db: Database) -> Self {
        let conn = db.into_connection();
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Inserts a TODO and returns it as stored, timestamps included.
    pub async fn create_todo(
        &self,
        subject: String,
        description: String,
    ) -> Result<Todo, TodoError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO todos (subject, description) VALUES (?1, ?2)",
                params![subject, description],
            )?;
            let id = conn.last_insert_rowid();
            debug!(id, "todo created");
            select_todo(conn, id)?.ok_or(TodoError::NotFound)
        })
        .await
    }

    /// Lists TODOs newest first.
    ///
    /// `prev_id == 0 && size == 0` returns everything, `prev_id == 0` returns
    /// the latest `size`, otherwise up to `size` rows with `id < prev_id`.
    pub async fn read_todos(&self, prev_id: i64, size: i64) -> Result<Vec<Todo>, TodoError> {
        self.run(move |conn| {
            let todos = match (prev_id, size) {
                (0, 0) => collect_todos(conn, READ_ALL, params![])?,
                (0, size) => collect_todos(conn, READ_LATEST, params![size])?,
                (prev_id, size) => collect_todos(conn, READ_BEFORE, params![prev_id, size])?,
            };
            Ok(todos)
        })
        .await
    }

    /// Replaces subject and description of an existing TODO.
    pub async fn update_todo(
        &self,
        id: i64,
        subject: String,
        description: String,
    ) -> Result<Todo, TodoError> {
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE todos SET subject = ?1, description = ?2 WHERE id = ?3",
                params![subject, description, id],
            )?;
            if changed == 0 {
                return Err(TodoError::NotFound);
            }
            select_todo(conn, id)?.ok_or(TodoError::NotFound)
        })
        .await
    }

    /// Removes every listed id in one statement. Unknown ids are skipped;
    /// the call fails with `NotFound` only when nothing was removed.
    pub async fn delete_todos(&self, ids: &[i64]) -> Result<(), TodoError> {
        if ids.is_empty() {
            return Err(TodoError::Validation("No Items".to_string()));
        }
        let ids = ids.to_vec();
        self.run(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("DELETE FROM todos WHERE id IN ({placeholders})");
            let removed = conn.execute(&sql, params_from_iter(ids.iter()))?;
            if removed == 0 {
                return Err(TodoError::NotFound);
            }
            debug!(requested = ids.len(), removed, "todos deleted");
            Ok(())
        })
        .await
    }

    async fn run<T, F>(&self, op: F) -> Result<T, TodoError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, TodoError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let call = Arc::new(StoreCall::new(Arc::clone(&self.interrupt)));
        let _cancel = CancelOnDrop(Arc::clone(&call));

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            if !call.begin() {
                return Err(StoreError::Cancelled.into());
            }
            let result = op(&guard);
            call.finish();
            result
        })
        .await
        .map_err(StoreError::from)?
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .execute_batch(sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CallState {
    Pending,
    Running,
    Cancelled,
    Done,
}

/// Lifecycle of one blocking store call, shared between the request future
/// and the blocking task.
struct StoreCall {
    state: Mutex<CallState>,
    interrupt: Arc<InterruptHandle>,
}

impl StoreCall {
    fn new(interrupt: Arc<InterruptHandle>) -> Self {
        Self {
            state: Mutex::new(CallState::Pending),
            interrupt,
        }
    }

    /// Called with the connection held. Returns false if the request is gone.
    fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != CallState::Pending {
            return false;
        }
        *state = CallState::Running;
        true
    }

    fn finish(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CallState::Done;
    }

    // The state lock is held across `interrupt()`, and `finish` runs before
    // the connection is released, so only this call's statement is hit.
    fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CallState::Pending => *state = CallState::Cancelled,
            CallState::Running => {
                debug!("interrupting store call of dropped request");
                self.interrupt.interrupt();
                *state = CallState::Cancelled;
            }
            CallState::Cancelled | CallState::Done => {}
        }
    }
}

struct CancelOnDrop(Arc<StoreCall>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn map_todo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        subject: row.get(1)?,
        description: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

fn select_todo(conn: &Connection, id: i64) -> rusqlite::Result<Option<Todo>> {
    conn.query_row(SELECT_BY_ID, params![id], map_todo).optional()
}

fn collect_todos(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Todo>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, map_todo)?;

    let mut todos = Vec::new();
    for todo in rows {
        todos.push(todo?);
    }
    Ok(todos)
}
