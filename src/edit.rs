use std::error::Error;
use std::fmt;
use std::process::Command;

use serde_json::Value;

use crate::db::TaskWrite;
use crate::domain::task::{CanonicalTask, Note};
use crate::imports::{normalize, ImportRecord};
use crate::task_id;

pub trait Editor {
    fn edit(&mut self, text: &str) -> Result<String, EditError>;
}

/// Hands the text to the user's editor via a temp file and reads it back.
/// Resolution order: $TASKDECK_EDITOR, $VISUAL, $EDITOR, then vi.
pub struct ExternalEditor;

impl Editor for ExternalEditor {
    fn edit(&mut self, text: &str) -> Result<String, EditError> {
        let path = std::env::temp_dir().join(format!("taskdeck-edit-{}.json", task_id::fresh_id()));
        std::fs::write(&path, text)?;

        let command_line = resolve_editor_command();
        let mut parts = command_line.split_whitespace();
        let program = parts.next().unwrap_or("vi").to_string();
        let args: Vec<&str> = parts.collect();

        let status = match Command::new(&program).args(&args).arg(&path).status() {
            Ok(status) => status,
            Err(source) => {
                let _ = std::fs::remove_file(&path);
                return Err(EditError::EditorSpawn { program, source });
            }
        };
        if !status.success() {
            let _ = std::fs::remove_file(&path);
            return Err(EditError::EditorExit(status));
        }

        let edited = std::fs::read_to_string(&path);
        let _ = std::fs::remove_file(&path);
        Ok(edited?)
    }
}

fn resolve_editor_command() -> String {
    std::env::var("TASKDECK_EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    Unchanged,
    Parsed(ImportRecord),
}

pub fn render_task_text(task: &CanonicalTask, notes: &[Note], tags: &[String]) -> String {
    let value = task.external_value(notes, tags);
    let mut text =
        serde_json::to_string_pretty(&value).expect("task rendering should never fail");
    text.push('\n');
    text
}

/// Runs editor rounds until the text parses or comes back identical to what
/// the round presented. A failed parse prints its diagnostic and re-presents
/// the failed text unchanged, so nothing typed is ever thrown away.
pub fn run_loop(
    editor: &mut dyn Editor,
    initial_text: &str,
    default_user: &str,
) -> Result<LoopOutcome, EditError> {
    let mut shown = initial_text.to_string();
    loop {
        let returned = editor.edit(&shown)?;
        if returned == shown {
            return Ok(LoopOutcome::Unchanged);
        }
        match parse_task_text(&returned, default_user) {
            Ok(record) => return Ok(LoopOutcome::Parsed(record)),
            Err(diagnostic) => {
                eprintln!("{}", diagnostic);
                shown = returned;
            }
        }
    }
}

fn parse_task_text(text: &str, default_user: &str) -> Result<ImportRecord, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => normalize(value, default_user).map_err(|err| err.to_string()),
        Err(err) => Err(format!("invalid task text: {}", err)),
    }
}

/// Turns a parsed edit round into an ordered write plan. The id can not be
/// edited away, modified stays pinned to its pre-edit value so the storage
/// trigger refreshes it, and a closed state gets a second update carrying a
/// fresh modified timestamp to repair the trigger-copied closed column.
/// Notes and tags are add-only: rows already stored are left alone.
pub fn reconcile(
    previous: &CanonicalTask,
    previous_notes: &[Note],
    previous_tags: &[String],
    parsed: ImportRecord,
    now_utc: &str,
) -> Vec<TaskWrite> {
    let ImportRecord {
        mut task,
        notes,
        tags,
    } = parsed;
    task.id = previous.id.clone();
    task.modified_utc = previous.modified_utc.clone();

    let closes = task.state.is_closed();
    let task_id = task.id.clone();
    let mut writes = vec![TaskWrite::UpdateTask(task)];
    if closes {
        writes.push(TaskWrite::RefreshModified {
            id: task_id.clone(),
            modified_utc: now_utc.to_string(),
        });
    }

    for note in notes {
        if previous_notes.iter().any(|existing| existing.id == note.id) {
            continue;
        }
        let id = if task_id::has_placeholder_time(&note.id) {
            task_id::set_time(&note.id, now_utc)
        } else {
            note.id
        };
        writes.push(TaskWrite::AddNote {
            id,
            task_id: task_id.clone(),
            body: note.body,
        });
    }

    for tag in tags {
        if previous_tags.iter().any(|existing| existing == &tag) {
            continue;
        }
        writes.push(TaskWrite::AddTag {
            task_id: task_id.clone(),
            tag,
        });
    }

    writes
}

#[derive(Debug)]
pub enum EditError {
    Io(std::io::Error),
    EditorSpawn {
        program: String,
        source: std::io::Error,
    },
    EditorExit(std::process::ExitStatus),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::Io(err) => write!(f, "I/O error: {}", err),
            EditError::EditorSpawn { program, source } => {
                write!(f, "failed to launch editor '{}': {}", program, source)
            }
            EditError::EditorExit(status) => {
                write!(f, "editor exited unsuccessfully: {}", status)
            }
        }
    }
}

impl Error for EditError {}

impl From<std::io::Error> for EditError {
    fn from(value: std::io::Error) -> Self {
        EditError::Io(value)
    }
}
