use serde_json::{json, Map, Value};

use crate::domain::state::TaskState;

/// The normalized task record every source adapter converges on. Timestamps
/// are canonical second-precision UTC strings, so string order is time order.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTask {
    pub id: String,
    pub body: String,
    pub state: TaskState,
    pub priority_adjustment: Option<f64>,
    pub created_utc: String,
    pub modified_utc: String,
    pub due_utc: Option<String>,
    pub closed_utc: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub body: String,
}

impl CanonicalTask {
    /// Renders the record as the external JSON object the normalizer accepts
    /// back unchanged. Optional fields are omitted entirely when absent so
    /// their presence stays distinguishable from null.
    pub fn external_value(&self, notes: &[Note], tags: &[String]) -> Value {
        let mut out = Map::new();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        out.insert("body".to_string(), Value::String(self.body.clone()));
        out.insert(
            "state".to_string(),
            Value::String(self.state.as_str().to_string()),
        );
        if let Some(adjustment) = self.priority_adjustment {
            if let Some(number) = serde_json::Number::from_f64(adjustment) {
                out.insert("priority_adjustment".to_string(), Value::Number(number));
            }
        }
        out.insert(
            "created_at".to_string(),
            Value::String(self.created_utc.clone()),
        );
        out.insert(
            "modified_utc".to_string(),
            Value::String(self.modified_utc.clone()),
        );
        if let Some(due) = &self.due_utc {
            out.insert("due_utc".to_string(), Value::String(due.clone()));
        }
        if let Some(closed) = &self.closed_utc {
            out.insert("closed_utc".to_string(), Value::String(closed.clone()));
        }
        if let Some(metadata) = &self.metadata {
            out.insert("metadata".to_string(), Value::Object(metadata.clone()));
        }
        out.insert("user".to_string(), Value::String(self.user.clone()));
        out.insert(
            "tags".to_string(),
            Value::Array(tags.iter().map(|tag| Value::String(tag.clone())).collect()),
        );
        out.insert(
            "notes".to_string(),
            Value::Array(
                notes
                    .iter()
                    .map(|note| json!({ "id": note.id, "body": note.body }))
                    .collect(),
            ),
        );
        Value::Object(out)
    }
}
