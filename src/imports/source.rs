use std::ffi::OsStr;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::domain::state::TaskState;
use crate::domain::task::CanonicalTask;
use crate::task_id;
use crate::timestamp;

use super::errors::ImportError;
use super::normalize::normalize;
use super::record::ImportRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Email,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::Email => "email",
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(SourceFormat::Json),
            Some("eml") => Ok(SourceFormat::Email),
            other => Err(ImportError::Unsupported(other.unwrap_or("").to_string())),
        }
    }
}

pub fn decode(
    format: SourceFormat,
    bytes: &[u8],
    default_user: &str,
) -> Result<ImportRecord, ImportError> {
    match format {
        SourceFormat::Json => decode_json(bytes, default_user),
        SourceFormat::Email => decode_email(bytes, default_user),
    }
}

fn decode_json(bytes: &[u8], default_user: &str) -> Result<ImportRecord, ImportError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| ImportError::Malformed {
        format: SourceFormat::Json.as_str(),
        message: err.to_string(),
        input: String::from_utf8_lossy(bytes).to_string(),
    })?;
    normalize(value, default_user)
}

fn decode_email(bytes: &[u8], default_user: &str) -> Result<ImportRecord, ImportError> {
    let text = String::from_utf8_lossy(bytes);
    let message = parse_message(&text).map_err(|message| ImportError::Malformed {
        format: SourceFormat::Email.as_str(),
        message,
        input: text.to_string(),
    })?;

    // Headers fold left to right, a later header of the same kind replaces
    // the earlier one's contribution.
    let mut draft = MailDraft::default();
    for (name, value) in &message.headers {
        match name.as_str() {
            "date" => {
                if let Some(parsed) = timestamp::parse_mail_date(value) {
                    draft.created_utc = Some(parsed);
                }
            }
            "subject" => draft.subject = Some(value.clone()),
            "from" => draft.from = Some(parse_mailboxes(value)),
            "to" => draft.to = Some(parse_mailboxes(value)),
            "message-id" => draft.message_id = Some(value.clone()),
            "keywords" => draft.tags = Some(parse_keywords(value)),
            "comments" => draft.comments = Some(value.clone()),
            _ => {}
        }
    }

    let body = match draft.subject {
        Some(subject) if message.body.is_empty() => subject,
        Some(subject) => format!("{}\n\n{}", subject, message.body),
        None => message.body,
    };

    let mut metadata = Map::new();
    if let Some(from) = draft.from {
        metadata.insert("from".to_string(), from);
    }
    if let Some(to) = draft.to {
        metadata.insert("to".to_string(), to);
    }
    if let Some(message_id) = draft.message_id {
        metadata.insert("message_id".to_string(), Value::String(message_id));
    }
    if let Some(comments) = draft.comments {
        metadata.insert("comments".to_string(), Value::String(comments));
    }
    let metadata = if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    };

    let created_utc = draft
        .created_utc
        .unwrap_or_else(|| timestamp::ZERO_UTC.to_string());
    let task = CanonicalTask {
        id: task_id::id_from_seed(bytes, &created_utc),
        body,
        state: TaskState::Open,
        priority_adjustment: None,
        created_utc: created_utc.clone(),
        modified_utc: created_utc,
        due_utc: None,
        closed_utc: None,
        metadata,
        user: default_user.to_string(),
    };

    Ok(ImportRecord {
        task,
        notes: Vec::new(),
        tags: draft.tags.unwrap_or_default(),
    })
}

#[derive(Debug, Default)]
struct MailDraft {
    created_utc: Option<String>,
    subject: Option<String>,
    from: Option<Value>,
    to: Option<Value>,
    message_id: Option<String>,
    comments: Option<String>,
    tags: Option<Vec<String>>,
}

struct MailMessage {
    headers: Vec<(String, String)>,
    body: String,
}

/// Minimal RFC 822 reader: the header block ends at the first blank line,
/// continuation lines (leading space or tab) unfold into the previous header,
/// header names compare case-insensitively.
fn parse_message(text: &str) -> Result<MailMessage, String> {
    let text = text.replace("\r\n", "\n");
    let (header_block, body) = match text.split_once("\n\n") {
        Some((headers, body)) => (headers.to_string(), body.to_string()),
        None => (text.trim_end_matches('\n').to_string(), String::new()),
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in header_block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => return Err("continuation line before any header".to_string()),
            }
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(format!("header line without a colon: '{}'", line));
        };
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    Ok(MailMessage {
        headers,
        body: body.trim_end_matches('\n').to_string(),
    })
}

fn parse_mailboxes(raw: &str) -> Value {
    let mut out = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        out.push(parse_mailbox(part));
    }
    Value::Array(out)
}

fn parse_mailbox(raw: &str) -> Value {
    match raw.split_once('<') {
        Some((name, rest)) => {
            let email = rest.trim_end_matches('>').trim();
            let name = name.trim().trim_matches('"');
            json!({ "name": name, "email": email })
        }
        None => json!({ "name": "", "email": raw }),
    }
}

/// Each comma-separated keyword group becomes one tag, inner runs of
/// whitespace collapse to single spaces.
fn parse_keywords(raw: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for group in raw.split(',') {
        let tag = group.split_whitespace().collect::<Vec<_>>().join(" ");
        if !tag.is_empty() && !tags.iter().any(|existing| existing == &tag) {
            tags.push(tag);
        }
    }
    tags
}
