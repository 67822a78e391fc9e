use std::fmt;

use crate::util::FileError;

#[derive(Debug)]
pub enum AuditError {
    Config(String),
    Pattern(regex::Error),
    Io(std::io::Error),
    File(FileError),
    Parse(String),
    Notify(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AuditError::Pattern(err) => write!(f, "Invalid pattern: {}", err),
            AuditError::Io(err) => write!(f, "IO error: {}", err),
            AuditError::File(err) => write!(f, "File error: {}", err),
            AuditError::Parse(msg) => write!(f, "Parse error: {}", msg),
            AuditError::Notify(msg) => write!(f, "Notification error: {}", msg),
        }
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuditError::Pattern(err) => Some(err),
            AuditError::Io(err) => Some(err),
            AuditError::File(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        AuditError::Io(err)
    }
}

impl From<FileError> for AuditError {
    fn from(err: FileError) -> Self {
        AuditError::File(err)
    }
}

impl From<regex::Error> for AuditError {
    fn from(err: regex::Error) -> Self {
        AuditError::Pattern(err)
    }
}

impl From<toml::de::Error> for AuditError {
    fn from(err: toml::de::Error) -> Self {
        AuditError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for AuditError {
    fn from(err: reqwest::Error) -> Self {
        AuditError::Notify(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
