//! Config module.
//! Provides the rule document types, default paths, XML loading/saving, and validation.

pub mod paths;
pub mod store;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use store::{ConfigOrigin, ConfigStore, LoadedConfig};
pub use types::{CategoryRule, LogLevel, MonitorSettings, Settings, SETTING_KEYS};
pub use validate::{sanitize, valid_date_format};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TIDY_MOVE_CONFIG";
/// Fallback bucket for extensions no category claims.
pub const DEFAULT_CATEGORY: &str = "Other";
pub const DATE_FORMAT_DEFAULT: &str = "%Y-%m";
pub const SETTLE_DELAY_DEFAULT: std::time::Duration = std::time::Duration::from_secs(1);
