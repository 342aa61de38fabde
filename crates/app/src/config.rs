use std::path::{Path, PathBuf};

use lingua_core::model::LearnerId;

use crate::cli::ArgsError;

pub const DEFAULT_DB_URL: &str = "sqlite://lingua.sqlite3";

/// Runtime configuration loaded from the environment.
///
/// | Env var             | Default                   |
/// |---------------------|---------------------------|
/// | `LINGUA_DB_URL`     | `sqlite://lingua.sqlite3` |
/// | `LINGUA_LEARNER_ID` | `1`                       |
/// | `LINGUA_SHUFFLE`    | `true`                    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub learner_id: LearnerId,
    pub shuffle_tiles: bool,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ArgsError::InvalidEnv` when a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ArgsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArgsError> {
        let db_url = lookup("LINGUA_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.to_string(), normalize_sqlite_url);

        let learner_id = match lookup("LINGUA_LEARNER_ID") {
            Some(raw) => raw.parse().map_err(|_| ArgsError::InvalidEnv {
                var: "LINGUA_LEARNER_ID",
                raw,
            })?,
            None => LearnerId::new(1),
        };

        let shuffle_tiles = match lookup("LINGUA_SHUFFLE") {
            Some(raw) => parse_flag(&raw).ok_or(ArgsError::InvalidEnv {
                var: "LINGUA_SHUFFLE",
                raw,
            })?,
            None => true,
        };

        Ok(Self {
            db_url,
            learner_id,
            shuffle_tiles,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Turns `sqlite:relative.db` or a bare path into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the parent directories of a file-backed database URL.
///
/// The database file itself is created on connect.
///
/// # Errors
///
/// Returns an error for URLs without a path or when the filesystem refuses.
pub fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
