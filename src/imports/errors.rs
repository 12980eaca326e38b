use std::error::Error;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Malformed {
        format: &'static str,
        message: String,
        input: String,
    },
    Unsupported(String),
    IsADirectory(PathBuf),
    AlreadyImported(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "I/O error: {}", err),
            ImportError::Db(err) => write!(f, "database error: {}", err),
            ImportError::Malformed {
                format,
                message,
                input,
            } => {
                write!(
                    f,
                    "invalid {} input: {}\noffending input:\n{}",
                    format, message, input
                )
            }
            ImportError::Unsupported(ext) if ext.is_empty() => {
                write!(f, "missing file extension: expected .json or .eml")
            }
            ImportError::Unsupported(ext) => {
                write!(
                    f,
                    "unsupported file extension '.{}': expected .json or .eml",
                    ext
                )
            }
            ImportError::IsADirectory(path) => {
                write!(
                    f,
                    "'{}' is a directory; pass -d to import a directory",
                    path.display()
                )
            }
            ImportError::AlreadyImported(id) => {
                write!(f, "task '{}' was already imported", id)
            }
        }
    }
}

impl Error for ImportError {}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        ImportError::Io(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        ImportError::Db(value)
    }
}
