//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use imagecache::cache::CacheError;
use imagecache::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// The configured cache has no disk tier
    DiskDisabled,
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Cache operation failed
    Cache(CacheError),
    /// Input image could not be opened or decoded
    ImageRead {
        path: PathBuf,
        error: image::ImageError,
    },
    /// Output image could not be written
    ImageWrite {
        path: PathBuf,
        error: image::ImageError,
    },
    /// The disk write did not succeed
    StoreFailed(String),
    /// No entry for the key
    NotFound(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::DiskDisabled = self {
            eprintln!();
            eprintln!("Set 'disk_enabled = true' in the [cache] section of the config file.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::DiskDisabled => write!(f, "The disk cache is disabled"),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Cache(e) => write!(f, "{}", e),
            CliError::ImageRead { path, error } => {
                write!(f, "Failed to read image '{}': {}", path.display(), error)
            }
            CliError::ImageWrite { path, error } => {
                write!(f, "Failed to write image '{}': {}", path.display(), error)
            }
            CliError::StoreFailed(key) => {
                write!(f, "Failed to persist '{}' (see the log for details)", key)
            }
            CliError::NotFound(key) => write!(f, "No cached image for key '{}'", key),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::ImageRead { error, .. } => Some(error),
            CliError::ImageWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}
