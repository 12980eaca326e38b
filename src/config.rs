use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_DB_NAME: &str = "main.db";

/// Resolved runtime settings. Flags and environment win over the optional
/// `config.toml` inside the data directory, which wins over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub data_dir: PathBuf,
    pub db_name: String,
    pub user: String,
}

impl Context {
    pub fn resolve(
        data_dir: Option<PathBuf>,
        db_name: Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let file = load_config_file(&data_dir)?;
        let db_name = db_name
            .or(file.db_name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
        let user = resolve_user(file.user);
        Ok(Context {
            data_dir,
            db_name,
            user,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    db_name: Option<String>,
    user: Option<String>,
}

fn load_config_file(data_dir: &Path) -> Result<ConfigFile, ConfigError> {
    let path = data_dir.join("config.toml");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(err) => return Err(ConfigError::Io(err)),
    };
    toml::from_str(&raw).map_err(|err| ConfigError::Invalid {
        path,
        message: err.to_string(),
    })
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".taskdeck"),
        _ => PathBuf::from(".taskdeck"),
    }
}

fn resolve_user(file_user: Option<String>) -> String {
    file_user
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .or_else(|| std::env::var("USER").ok().filter(|user| !user.is_empty()))
        .or_else(|| std::env::var("USERNAME").ok().filter(|user| !user.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Invalid { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "I/O error: {}", err),
            ConfigError::Invalid { path, message } => {
                write!(f, "invalid config file '{}': {}", path.display(), message)
            }
        }
    }
}

impl Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}
