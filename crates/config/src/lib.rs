// Configuration loading

pub mod credentials;
pub mod settings;

pub use settings::Settings;

use std::fmt;
use std::path::PathBuf;

/// Error reading or writing configuration files.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    Keychain(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "{}: {}", path.display(), message),
            ConfigError::Parse { path, message } => {
                write!(f, "invalid settings in {}: {}", path.display(), message)
            }
            ConfigError::Keychain(msg) => write!(f, "keychain: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
