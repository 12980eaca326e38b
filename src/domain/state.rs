use std::error::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Open,
    Waiting,
    Done,
    Obsolete,
}

impl TaskState {
    pub const ALL: [TaskState; 4] = [
        TaskState::Open,
        TaskState::Waiting,
        TaskState::Done,
        TaskState::Obsolete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Open => "open",
            TaskState::Waiting => "waiting",
            TaskState::Done => "done",
            TaskState::Obsolete => "obsolete",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Obsolete)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = ParseTaskStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let state = match normalized.as_str() {
            "open" | "new" | "pending" => TaskState::Open,
            "waiting" | "blocked" | "on_hold" => TaskState::Waiting,
            "done" | "closed" | "completed" | "fixed" => TaskState::Done,
            "obsolete" | "deleted" | "cancelled" | "wontfix" | "wont_fix" => TaskState::Obsolete,
            _ => {
                return Err(ParseTaskStateError {
                    value: value.to_string(),
                });
            }
        };

        Ok(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskStateError {
    value: String,
}

impl fmt::Display for ParseTaskStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid task state '{}': expected one of {}",
            self.value,
            TaskState::ALL
                .iter()
                .map(|state| state.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseTaskStateError {}
