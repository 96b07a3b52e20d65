//! CLI runner for common setup.
//!
//! Loads the config file and initializes file logging once, so command
//! handlers only deal with their own work.

use std::path::{Path, PathBuf};

use imagecache::config::{config_file_path, ConfigFile};
use imagecache::logging::{default_log_dir, default_log_file, init_logging_full, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    /// Where the configuration came from
    config_path: PathBuf,
}

impl CliRunner {
    /// Load configuration and start logging to the log file.
    ///
    /// `config_path` overrides the default config location.
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        // Command output goes to stdout, so logs go to the file only
        let logging_guard =
            init_logging_full(&default_log_dir(), default_log_file(), false, debug_mode)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
            config_path,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = imagecache::VERSION,
            command,
            config = %self.config_path.display(),
            "imagecache CLI starting"
        );
    }
}
