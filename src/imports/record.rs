use serde_json::Value;

use crate::domain::task::{CanonicalTask, Note};

/// One normalized import unit: the task plus the tags and notes that travel
/// with it. Persistence and editing both consume this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub task: CanonicalTask,
    pub notes: Vec<Note>,
    pub tags: Vec<String>,
}

impl ImportRecord {
    pub fn external_value(&self) -> Value {
        self.task.external_value(&self.notes, &self.tags)
    }
}
