use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result};

use crate::domain::task::{CanonicalTask, Note};
use crate::timestamp;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// Declared column order of `tasks_view`. Drives both the export SELECT and
/// the CSV header, so the two can never drift apart.
pub const TASK_VIEW_COLUMNS: [&str; 11] = [
    "id",
    "body",
    "state",
    "priority_adjustment",
    "created_utc",
    "modified_utc",
    "due_utc",
    "closed_utc",
    "metadata",
    "user",
    "tags",
];

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

// The modified/closed columns are derived by triggers. An update that leaves
// modified untouched gets it recomputed to the current instant; an update
// that changes it keeps the written value verbatim. Closed follows the state:
// entering done/obsolete copies the statement's modified value, leaving them
// clears it.
const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_tasks_schema_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    state TEXT NOT NULL,
    priority_adjustment REAL,
    created_utc TEXT NOT NULL,
    modified_utc TEXT NOT NULL,
    due_utc TEXT,
    closed_utc TEXT,
    metadata TEXT,
    user TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_tags (
    task_id TEXT NOT NULL REFERENCES tasks(id),
    tag TEXT NOT NULL,
    PRIMARY KEY (task_id, tag)
);

CREATE TABLE IF NOT EXISTS task_notes (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id),
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state);
CREATE INDEX IF NOT EXISTS idx_tasks_created_utc ON tasks(created_utc);
CREATE INDEX IF NOT EXISTS idx_task_notes_task_id ON task_notes(task_id);

CREATE VIEW IF NOT EXISTS tasks_view AS
SELECT
    t.id,
    t.body,
    t.state,
    t.priority_adjustment,
    t.created_utc,
    t.modified_utc,
    t.due_utc,
    t.closed_utc,
    t.metadata,
    t.user,
    (SELECT group_concat(tag, ',') FROM task_tags WHERE task_id = t.id) AS tags
FROM tasks t;

CREATE TRIGGER IF NOT EXISTS tasks_modified_after_update
AFTER UPDATE ON tasks
WHEN new.modified_utc = old.modified_utc
BEGIN
    UPDATE tasks
    SET modified_utc = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
    WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS tasks_closed_after_update
AFTER UPDATE ON tasks
WHEN new.state IN ('done', 'obsolete')
BEGIN
    UPDATE tasks SET closed_utc = new.modified_utc WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS tasks_reopened_after_update
AFTER UPDATE ON tasks
WHEN new.state NOT IN ('done', 'obsolete')
BEGIN
    UPDATE tasks SET closed_utc = NULL WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS tasks_closed_after_insert
AFTER INSERT ON tasks
WHEN new.state IN ('done', 'obsolete') AND new.closed_utc IS NULL
BEGIN
    UPDATE tasks SET closed_utc = new.modified_utc WHERE id = new.id;
END;
"#,
    },
    Migration {
        version: 2,
        name: "clear_closed_on_open_insert_v2",
        sql: r#"
CREATE TRIGGER IF NOT EXISTS tasks_reopened_after_insert
AFTER INSERT ON tasks
WHEN new.state NOT IN ('done', 'obsolete') AND new.closed_utc IS NOT NULL
BEGIN
    UPDATE tasks SET closed_utc = NULL WHERE id = new.id;
END;
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, timestamp::now_utc()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

/// A task row as stored, before any domain-level parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub body: String,
    pub state: String,
    pub priority_adjustment: Option<f64>,
    pub created_utc: String,
    pub modified_utc: String,
    pub due_utc: Option<String>,
    pub closed_utc: Option<String>,
    pub metadata: Option<String>,
    pub user: String,
}

/// A flattened `tasks_view` row. The tags column joins the task's tags with
/// commas and is NULL for untagged tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskViewRow {
    pub id: String,
    pub body: String,
    pub state: String,
    pub priority_adjustment: Option<f64>,
    pub created_utc: String,
    pub modified_utc: String,
    pub due_utc: Option<String>,
    pub closed_utc: Option<String>,
    pub metadata: Option<String>,
    pub user: String,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskWrite {
    UpdateTask(CanonicalTask),
    RefreshModified { id: String, modified_utc: String },
    AddTag { task_id: String, tag: String },
    AddNote { id: String, task_id: String, body: String },
}

pub fn insert_task(conn: &Connection, task: &CanonicalTask) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO tasks (
    id, body, state, priority_adjustment, created_utc, modified_utc,
    due_utc, closed_utc, metadata, user
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#,
        params![
            task.id,
            task.body,
            task.state.as_str(),
            task.priority_adjustment,
            task.created_utc,
            task.modified_utc,
            task.due_utc,
            task.closed_utc,
            metadata_text(task),
            task.user,
        ],
    )?;
    Ok(())
}

pub fn update_task(conn: &Connection, task: &CanonicalTask) -> Result<()> {
    conn.execute(
        r#"
UPDATE tasks SET
    body = ?2,
    state = ?3,
    priority_adjustment = ?4,
    created_utc = ?5,
    modified_utc = ?6,
    due_utc = ?7,
    closed_utc = ?8,
    metadata = ?9,
    user = ?10
WHERE id = ?1
"#,
        params![
            task.id,
            task.body,
            task.state.as_str(),
            task.priority_adjustment,
            task.created_utc,
            task.modified_utc,
            task.due_utc,
            task.closed_utc,
            metadata_text(task),
            task.user,
        ],
    )?;
    Ok(())
}

pub fn refresh_modified(conn: &Connection, id: &str, modified_utc: &str) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET modified_utc = ?2 WHERE id = ?1",
        params![id, modified_utc],
    )?;
    Ok(())
}

pub fn insert_tag(conn: &Connection, task_id: &str, tag: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO task_tags (task_id, tag) VALUES (?1, ?2)",
        params![task_id, tag],
    )?;
    Ok(())
}

pub fn insert_note(conn: &Connection, id: &str, task_id: &str, body: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO task_notes (id, task_id, body) VALUES (?1, ?2, ?3)",
        params![id, task_id, body],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<TaskRecord>> {
    conn.query_row(
        r#"
SELECT id, body, state, priority_adjustment, created_utc, modified_utc,
       due_utc, closed_utc, metadata, user
FROM tasks
WHERE id = ?1
"#,
        params![id],
        |row| {
            Ok(TaskRecord {
                id: row.get(0)?,
                body: row.get(1)?,
                state: row.get(2)?,
                priority_adjustment: row.get(3)?,
                created_utc: row.get(4)?,
                modified_utc: row.get(5)?,
                due_utc: row.get(6)?,
                closed_utc: row.get(7)?,
                metadata: row.get(8)?,
                user: row.get(9)?,
            })
        },
    )
    .optional()
}

pub fn task_tags(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT tag FROM task_tags WHERE task_id = ?1 ORDER BY tag")?;
    let mut rows = stmt.query(params![task_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(row.get(0)?);
    }
    Ok(result)
}

pub fn task_notes(conn: &Connection, task_id: &str) -> Result<Vec<Note>> {
    let mut stmt =
        conn.prepare("SELECT id, body FROM task_notes WHERE task_id = ?1 ORDER BY id")?;
    let mut rows = stmt.query(params![task_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(Note {
            id: row.get(0)?,
            body: row.get(1)?,
        });
    }
    Ok(result)
}

pub fn list_view_rows(conn: &Connection) -> Result<Vec<TaskViewRow>> {
    let sql = format!(
        "SELECT {} FROM tasks_view ORDER BY id",
        TASK_VIEW_COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(TaskViewRow {
            id: row.get(0)?,
            body: row.get(1)?,
            state: row.get(2)?,
            priority_adjustment: row.get(3)?,
            created_utc: row.get(4)?,
            modified_utc: row.get(5)?,
            due_utc: row.get(6)?,
            closed_utc: row.get(7)?,
            metadata: row.get(8)?,
            user: row.get(9)?,
            tags: row.get(10)?,
        });
    }
    Ok(result)
}

/// Runs an edit round's write plan in order. Updates are fatal on failure,
/// tag and note additions degrade to warnings, matching import semantics.
pub fn apply_writes(conn: &Connection, writes: &[TaskWrite]) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    for write in writes {
        match write {
            TaskWrite::UpdateTask(task) => update_task(conn, task)?,
            TaskWrite::RefreshModified { id, modified_utc } => {
                refresh_modified(conn, id, modified_utc)?;
            }
            TaskWrite::AddTag { task_id, tag } => {
                if let Err(err) = insert_tag(conn, task_id, tag) {
                    warnings.push(format!("tag '{}' not recorded: {}", tag, err));
                }
            }
            TaskWrite::AddNote { id, task_id, body } => {
                if let Err(err) = insert_note(conn, id, task_id, body) {
                    warnings.push(format!("note '{}' not recorded: {}", id, err));
                }
            }
        }
    }
    Ok(warnings)
}

fn metadata_text(task: &CanonicalTask) -> Option<String> {
    task.metadata.as_ref().map(|metadata| {
        serde_json::to_string(metadata).expect("metadata serialization should never fail")
    })
}

#[cfg(test)]
mod tests;
