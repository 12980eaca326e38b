use std::str::FromStr;

use serde_json::{Map, Value};

use crate::domain::state::TaskState;
use crate::domain::task::{CanonicalTask, Note};
use crate::imports::errors::ImportError;
use crate::imports::record::ImportRecord;
use crate::task_id;
use crate::timestamp;

pub const ID_ALIASES: [&str; 2] = ["id", "ulid"];
pub const CREATED_ALIASES: [&str; 3] = ["entry", "creation", "created_at"];
pub const BODY_ALIASES: [&str; 2] = ["body", "description"];
pub const STATE_ALIASES: [&str; 2] = ["state", "status"];
pub const PRIORITY_ALIASES: [&str; 3] = ["priority_adjustment", "urgency", "priority"];
pub const MODIFIED_ALIASES: [&str; 5] = [
    "modified",
    "modified_at",
    "modified_utc",
    "modification_date",
    "updated_at",
];
pub const DUE_ALIASES: [&str; 3] = ["due", "due_utc", "due_on"];
pub const CLOSED_ALIASES: [&str; 6] = [
    "closed",
    "closed_utc",
    "closed_on",
    "end",
    "end_utc",
    "end_on",
];

/// Folds a loosely-keyed external object into a canonical record. Alias
/// lookups are first-present-wins in the declared order; recognized keys are
/// consumed, everything left over lands in the metadata blob.
pub fn normalize(value: Value, default_user: &str) -> Result<ImportRecord, ImportError> {
    let Value::Object(mut fields) = value else {
        return Err(ImportError::Malformed {
            format: "record",
            message: "expected a JSON object".to_string(),
            input: value.to_string(),
        });
    };

    let explicit_id = take_first(&mut fields, &ID_ALIASES)
        .as_ref()
        .and_then(value_to_string)
        .map(|id| id.trim().to_ascii_lowercase())
        .filter(|id| !id.is_empty());

    let created_utc = take_first(&mut fields, &CREATED_ALIASES)
        .as_ref()
        .and_then(value_to_timestamp)
        .unwrap_or_else(|| timestamp::ZERO_UTC.to_string());

    let body = take_first(&mut fields, &BODY_ALIASES)
        .as_ref()
        .and_then(value_to_string)
        .unwrap_or_default();

    let state = take_first(&mut fields, &STATE_ALIASES)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|name| TaskState::from_str(name).ok())
        .unwrap_or(TaskState::Open);

    let priority_adjustment = take_first(&mut fields, &PRIORITY_ALIASES)
        .as_ref()
        .and_then(value_to_number);

    // A modified time earlier than creation is clamped up to creation.
    let modified_utc = take_first(&mut fields, &MODIFIED_ALIASES)
        .as_ref()
        .and_then(value_to_timestamp)
        .filter(|modified| modified.as_str() >= created_utc.as_str())
        .unwrap_or_else(|| created_utc.clone());

    let due_utc = take_first(&mut fields, &DUE_ALIASES)
        .as_ref()
        .and_then(value_to_timestamp);

    let closed_utc = take_first(&mut fields, &CLOSED_ALIASES)
        .as_ref()
        .and_then(value_to_timestamp);

    let mut tags = Vec::new();
    match fields.remove("tags") {
        Some(Value::Array(items)) => {
            for item in &items {
                if let Some(tag) = value_to_string(item) {
                    push_unique_tag(&mut tags, tag);
                }
            }
        }
        Some(Value::String(tag)) => push_unique_tag(&mut tags, tag),
        _ => {}
    }
    if let Some(project) = fields.remove("project") {
        if let Some(tag) = value_to_string(&project) {
            push_unique_tag(&mut tags, tag);
        }
    }

    let notes_field = fields.remove("notes");
    let annotations_field = fields.remove("annotations");
    let mut notes = Vec::new();
    if let Some(field) = notes_field {
        if let Value::Array(items) = field {
            notes.extend(items.iter().filter_map(note_from_value));
        }
    } else if let Some(Value::Array(items)) = annotations_field {
        notes.extend(items.iter().filter_map(note_from_annotation));
    }

    let user = fields
        .remove("user")
        .as_ref()
        .and_then(value_to_string)
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| default_user.to_string());

    let mut metadata = match fields.remove("metadata") {
        Some(Value::Object(seeded)) => seeded,
        Some(other) => {
            let mut blob = Map::new();
            blob.insert("metadata".to_string(), other);
            blob
        }
        None => Map::new(),
    };
    for (key, value) in fields {
        metadata.insert(key, value);
    }
    let metadata = if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    };

    let task = CanonicalTask {
        id: String::new(),
        body,
        state,
        priority_adjustment,
        created_utc,
        modified_utc,
        due_utc,
        closed_utc,
        metadata,
        user,
    };
    let mut record = ImportRecord { task, notes, tags };
    record.task.id = match explicit_id {
        Some(id) => id,
        None => task_id::derive_id(&record.external_value(), &record.task.created_utc),
    };

    Ok(record)
}

fn take_first(fields: &mut Map<String, Value>, aliases: &[&str]) -> Option<Value> {
    let mut found = None;
    for alias in aliases {
        if let Some(value) = fields.remove(*alias) {
            if found.is_none() {
                found = Some(value);
            }
        }
    }
    found
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn value_to_timestamp(value: &Value) -> Option<String> {
    value.as_str().and_then(timestamp::parse_flexible)
}

fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// Stored tags never contain a comma, the listing view's join character;
// a candidate holding commas is read as a comma-separated list.
fn push_unique_tag(tags: &mut Vec<String>, tag: String) {
    for part in tag.split(',') {
        let part = part.trim().to_string();
        if !part.is_empty() && !tags.iter().any(|existing| existing == &part) {
            tags.push(part);
        }
    }
}

fn note_from_value(item: &Value) -> Option<Note> {
    match item {
        Value::String(body) => Some(Note {
            id: task_id::id_from_seed(body.as_bytes(), timestamp::ZERO_UTC),
            body: body.clone(),
        }),
        Value::Object(fields) => {
            let body = fields.get("body").and_then(Value::as_str)?.to_string();
            let id = ID_ALIASES
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .map(|id| id.trim().to_ascii_lowercase())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| task_id::id_from_seed(body.as_bytes(), timestamp::ZERO_UTC));
            Some(Note { id, body })
        }
        _ => None,
    }
}

fn note_from_annotation(item: &Value) -> Option<Note> {
    let fields = item.as_object()?;
    let body = fields.get("description").and_then(Value::as_str)?.to_string();
    let entry_utc = fields
        .get("entry")
        .and_then(value_to_timestamp)
        .unwrap_or_else(|| timestamp::ZERO_UTC.to_string());
    Some(Note {
        id: task_id::id_from_seed(body.as_bytes(), &entry_utc),
        body,
    })
}
