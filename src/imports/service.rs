use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde_json::json;

use crate::db;
use crate::task_id;
use crate::timestamp;

use super::errors::ImportError;
use super::normalize::normalize;
use super::record::ImportRecord;
use super::source::{self, SourceFormat};

pub struct ImportService<'a> {
    conn: &'a Connection,
    default_user: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub task_id: String,
    pub source: String,
    pub warnings: Vec<String>,
}

impl<'a> ImportService<'a> {
    pub fn new(conn: &'a Connection, default_user: &'a str) -> Self {
        Self { conn, default_user }
    }

    pub fn add(&self, body: &str, tags: &[String]) -> Result<ImportOutcome, ImportError> {
        let value = json!({
            "id": task_id::fresh_id(),
            "body": body,
            "entry": timestamp::now_utc(),
            "tags": tags,
        });
        let record = normalize(value, self.default_user)?;
        self.persist(record, "new")
    }

    pub fn import_file(&self, path: &Path) -> Result<ImportOutcome, ImportError> {
        let bytes = read_source_file(path)?;
        let format = SourceFormat::from_path(path)?;
        let record = source::decode(format, &bytes, self.default_user)?;
        self.persist(record, &path.display().to_string())
    }

    pub fn import_directory(&self, dir: &Path) -> Result<Vec<ImportOutcome>, ImportError> {
        let mut outcomes = Vec::new();
        for path in importable_entries(dir)? {
            outcomes.push(self.import_file(&path)?);
        }
        Ok(outcomes)
    }

    /// Task first, then tags, then notes. The task insert is the commit
    /// point: a duplicate primary key means the record was seen before, and
    /// later tag or note failures degrade to warnings instead of undoing it.
    fn persist(&self, record: ImportRecord, source: &str) -> Result<ImportOutcome, ImportError> {
        let ImportRecord { task, notes, tags } = record;

        match db::insert_task(self.conn, &task) {
            Ok(()) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(ImportError::AlreadyImported(task.id));
            }
            Err(err) => return Err(ImportError::Db(err)),
        }

        let mut warnings = Vec::new();
        for tag in &tags {
            if let Err(err) = db::insert_tag(self.conn, &task.id, tag) {
                warnings.push(format!("tag '{}' not recorded: {}", tag, err));
            }
        }
        for note in &notes {
            if let Err(err) = db::insert_note(self.conn, &note.id, &task.id, &note.body) {
                warnings.push(format!("note '{}' not recorded: {}", note.id, err));
            }
        }

        Ok(ImportOutcome {
            task_id: task.id,
            source: source.to_string(),
            warnings,
        })
    }
}

/// Files the directory modes consider, sorted by name: regular files with a
/// supported extension. Everything else is skipped without comment.
pub fn importable_entries(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            continue;
        }
        if SourceFormat::from_path(&path).is_ok() {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn read_source_file(path: &Path) -> Result<Vec<u8>, ImportError> {
    if path.is_dir() {
        return Err(ImportError::IsADirectory(path.to_path_buf()));
    }
    std::fs::read(path).map_err(ImportError::Io)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
