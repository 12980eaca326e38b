use std::error::Error;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::Connection;

use crate::config::{ConfigError, Context};
use crate::db;
use crate::domain::state::{ParseTaskStateError, TaskState};
use crate::domain::task::CanonicalTask;
use crate::edit::{self, EditError, Editor, LoopOutcome};
use crate::export::{self, ExportError, ExportFormat};
use crate::imports::{importable_entries, ImportError, ImportOutcome, ImportService};
use crate::timestamp;

pub struct App {
    conn: Connection,
    ctx: Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditReport {
    Unchanged,
    Updated { warnings: Vec<String> },
}

impl App {
    pub fn open(ctx: Context) -> Result<Self, AppError> {
        std::fs::create_dir_all(&ctx.data_dir)?;
        let db_path = ctx.db_path();
        let conn = db::open_connection(&db_path.to_string_lossy())?;
        Ok(Self { conn, ctx })
    }

    pub fn add(&self, body: &str, tags: &[String]) -> Result<ImportOutcome, AppError> {
        Ok(self.import_service().add(body, tags)?)
    }

    pub fn import_file(&self, path: &Path) -> Result<ImportOutcome, AppError> {
        Ok(self.import_service().import_file(path)?)
    }

    pub fn import_directory(&self, dir: &Path) -> Result<Vec<ImportOutcome>, AppError> {
        Ok(self.import_service().import_directory(dir)?)
    }

    /// Import, open the editor, then delete the source file. The file is
    /// only deleted once both steps succeeded; an edit round that came back
    /// unchanged still counts as success.
    pub fn ingest_file(
        &self,
        path: &Path,
        editor: &mut dyn Editor,
    ) -> Result<ImportOutcome, AppError> {
        let mut outcome = self.import_file(path)?;
        let report = self.edit_task(&outcome.task_id, editor)?;
        std::fs::remove_file(path)?;

        if let EditReport::Updated { warnings } = report {
            outcome.warnings.extend(warnings);
        }
        Ok(outcome)
    }

    pub fn ingest_directory(
        &self,
        dir: &Path,
        editor: &mut dyn Editor,
    ) -> Result<Vec<ImportOutcome>, AppError> {
        let mut outcomes = Vec::new();
        for path in importable_entries(dir)? {
            outcomes.push(self.ingest_file(&path, editor)?);
        }
        Ok(outcomes)
    }

    pub fn edit_task(&self, id: &str, editor: &mut dyn Editor) -> Result<EditReport, AppError> {
        let id = id.trim().to_ascii_lowercase();
        let record =
            db::get_task(&self.conn, &id)?.ok_or_else(|| AppError::NotFound(id.clone()))?;
        let task = task_from_record(record)?;
        let tags = db::task_tags(&self.conn, &id)?;
        let notes = db::task_notes(&self.conn, &id)?;

        let text = edit::render_task_text(&task, &notes, &tags);
        match edit::run_loop(editor, &text, &self.ctx.user)? {
            LoopOutcome::Unchanged => Ok(EditReport::Unchanged),
            LoopOutcome::Parsed(parsed) => {
                let now = timestamp::now_utc();
                let writes = edit::reconcile(&task, &notes, &tags, parsed, &now);
                let warnings = db::apply_writes(&self.conn, &writes)?;
                Ok(EditReport::Updated { warnings })
            }
        }
    }

    pub fn export(&self, format: ExportFormat, out: &mut dyn Write) -> Result<(), AppError> {
        export::run(&self.conn, &self.ctx.db_path(), format, out)?;
        Ok(())
    }

    pub fn backup(&self) -> Result<PathBuf, AppError> {
        Ok(export::backup(&self.conn, &self.ctx.data_dir)?)
    }

    fn import_service(&self) -> ImportService<'_> {
        ImportService::new(&self.conn, &self.ctx.user)
    }
}

fn task_from_record(record: db::TaskRecord) -> Result<CanonicalTask, AppError> {
    let state = TaskState::from_str(&record.state)?;
    // Metadata was serialized by this program; anything unreadable is
    // dropped rather than blocking the edit.
    let metadata = record.metadata.as_deref().and_then(|raw| {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    });
    Ok(CanonicalTask {
        id: record.id,
        body: record.body,
        state,
        priority_adjustment: record.priority_adjustment,
        created_utc: record.created_utc,
        modified_utc: record.modified_utc,
        due_utc: record.due_utc,
        closed_utc: record.closed_utc,
        metadata,
        user: record.user,
    })
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Config(ConfigError),
    Import(ImportError),
    Edit(EditError),
    Export(ExportError),
    ParseState(ParseTaskStateError),
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Edit(err) => write!(f, "edit error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::ParseState(err) => write!(f, "state parse error: {}", err),
            AppError::NotFound(id) => write!(f, "task '{}' not found", id),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Edit(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::ParseState(err) => Some(err),
            AppError::NotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        AppError::Import(value)
    }
}

impl From<EditError> for AppError {
    fn from(value: EditError) -> Self {
        AppError::Edit(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        AppError::Export(value)
    }
}

impl From<ParseTaskStateError> for AppError {
    fn from(value: ParseTaskStateError) -> Self {
        AppError::ParseState(value)
    }
}
