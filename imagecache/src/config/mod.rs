//! Configuration file loading and size parsing.

mod file;
mod size;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    PressureSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
