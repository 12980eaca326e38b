use std::error::Error;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use rusqlite::{params, Connection};
use serde_json::{json, Value};

use crate::db::{self, TaskViewRow, TASK_VIEW_COLUMNS};
use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Ndjson,
    Json,
    Sql,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "ndjson" => Ok(ExportFormat::Ndjson),
            "json" => Ok(ExportFormat::Json),
            "sql" => Ok(ExportFormat::Sql),
            _ => Err(ExportError::UnknownFormat(value.to_string())),
        }
    }
}

pub fn run(
    conn: &Connection,
    db_path: &Path,
    format: ExportFormat,
    out: &mut dyn Write,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => export_csv(conn, out),
        ExportFormat::Ndjson => export_ndjson(conn, out),
        ExportFormat::Json => export_json(conn, out),
        ExportFormat::Sql => export_sql(db_path, out),
    }
}

fn export_csv(conn: &Connection, out: &mut dyn Write) -> Result<(), ExportError> {
    writeln!(out, "{}", TASK_VIEW_COLUMNS.join(","))?;
    for row in db::list_view_rows(conn)? {
        let line = view_row_fields(&row)
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn export_ndjson(conn: &Connection, out: &mut dyn Write) -> Result<(), ExportError> {
    for row in db::list_view_rows(conn)? {
        writeln!(out, "{}", serde_json::to_string(&view_row_value(&row))?)?;
    }
    Ok(())
}

fn export_json(conn: &Connection, out: &mut dyn Write) -> Result<(), ExportError> {
    let values: Vec<Value> = db::list_view_rows(conn)?
        .iter()
        .map(view_row_value)
        .collect();
    writeln!(out, "{}", serde_json::to_string_pretty(&values)?)?;
    Ok(())
}

fn export_sql(db_path: &Path, out: &mut dyn Write) -> Result<(), ExportError> {
    ensure_sqlite3_available()?;
    let output = Command::new("sqlite3")
        .arg(db_path)
        .arg(".dump")
        .output()
        .map_err(ExportError::Io)?;
    if !output.status.success() {
        return Err(ExportError::CommandFailed(format!(
            "sqlite3 .dump failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    out.write_all(&output.stdout)?;
    Ok(())
}

fn ensure_sqlite3_available() -> Result<(), ExportError> {
    match Command::new("sqlite3").arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        _ => Err(ExportError::MissingSqlite3),
    }
}

/// Snapshots the live database into `<data-dir>/backups/<stamp>.db` using
/// VACUUM INTO, which is safe against a WAL database in use.
pub fn backup(conn: &Connection, data_dir: &Path) -> Result<PathBuf, ExportError> {
    let backups_dir = data_dir.join("backups");
    std::fs::create_dir_all(&backups_dir)?;
    let target = backups_dir.join(format!("{}.db", timestamp::backup_stamp()));
    conn.execute("VACUUM INTO ?1", params![target.display().to_string()])?;
    Ok(target)
}

fn view_row_fields(row: &TaskViewRow) -> [String; 11] {
    [
        row.id.clone(),
        row.body.clone(),
        row.state.clone(),
        row.priority_adjustment
            .map(|value| value.to_string())
            .unwrap_or_default(),
        row.created_utc.clone(),
        row.modified_utc.clone(),
        row.due_utc.clone().unwrap_or_default(),
        row.closed_utc.clone().unwrap_or_default(),
        row.metadata.clone().unwrap_or_default(),
        row.user.clone(),
        row.tags.clone().unwrap_or_default(),
    ]
}

fn view_row_value(row: &TaskViewRow) -> Value {
    json!({
        "id": row.id,
        "body": row.body,
        "state": row.state,
        "priority_adjustment": row.priority_adjustment,
        "created_utc": row.created_utc,
        "modified_utc": row.modified_utc,
        "due_utc": row.due_utc,
        "closed_utc": row.closed_utc,
        "metadata": row.metadata.as_deref().and_then(|raw| serde_json::from_str::<Value>(raw).ok()),
        "user": row.user,
        "tags": split_tags(&row.tags),
    })
}

fn split_tags(tags: &Option<String>) -> Vec<String> {
    tags.as_deref()
        .map(|joined| joined.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Json(serde_json::Error),
    MissingSqlite3,
    CommandFailed(String),
    UnknownFormat(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "I/O error: {}", err),
            ExportError::Db(err) => write!(f, "database error: {}", err),
            ExportError::Json(err) => write!(f, "JSON serialization error: {}", err),
            ExportError::MissingSqlite3 => {
                write!(f, "sqlite3 CLI is not installed; the sql dump needs it")
            }
            ExportError::CommandFailed(message) => write!(f, "{}", message),
            ExportError::UnknownFormat(value) => {
                write!(
                    f,
                    "unknown export format '{}': expected csv, ndjson, json, or sql",
                    value
                )
            }
        }
    }
}

impl Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        ExportError::Io(value)
    }
}

impl From<rusqlite::Error> for ExportError {
    fn from(value: rusqlite::Error) -> Self {
        ExportError::Db(value)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        ExportError::Json(value)
    }
}
