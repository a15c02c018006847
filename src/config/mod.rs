//! Config module.
//! Provides the store configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{ConflictPolicy, LogLevel, StoreConfig};
pub use xml::{
    LoadedConfig, create_template_config, load_config_from_env, load_config_from_xml_path,
    parse_config_xml,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FILE_STORE_CONFIG";
/// Stream copy chunk size used when none is configured (128 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;
