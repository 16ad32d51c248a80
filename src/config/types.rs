//! Core configuration types.
//! - Settings mirrors the rule document (categories, exclusions, date layout, monitor).
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{DATE_FORMAT_DEFAULT, DEFAULT_CATEGORY, SETTLE_DELAY_DEFAULT};
use crate::classify::{display_extension, normalize_extension};
use crate::errors::TidyMoveError;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// One named bucket of extensions, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub name: String,
    /// Extensions as written in the document (".jpg", "JPG", "." for none).
    pub extensions: Vec<String>,
}

impl CategoryRule {
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            extensions: extensions
                .into_iter()
                .map(|e| display_extension(&normalize_extension(e.as_ref())))
                .collect(),
        }
    }
}

/// Watch-mode settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Wait after the last event for a path before organizing it.
    pub settle_delay: Duration,
    /// Watch subdirectories too.
    pub recursive: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY_DEFAULT,
            recursive: false,
        }
    }
}

/// The rule document handed from the config store to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Ordered: when an extension appears twice, the first category wins.
    pub categories: Vec<CategoryRule>,
    pub default_category: String,
    pub excluded_extensions: Vec<String>,
    /// Exact file names never moved (case-insensitive), e.g. "Thumbs.db".
    pub excluded_names: Vec<String>,
    pub process_hidden_files: bool,
    /// Files smaller than this are left alone.
    pub min_file_size: u64,
    /// Files larger than this are left alone (0 = no limit).
    pub max_file_size: u64,
    pub organize_by_date: bool,
    /// chrono strftime pattern for the date subfolder.
    pub date_format: String,
    /// Carry mtime/atime over when a move degrades to copy+delete.
    pub preserve_timestamps: bool,
    pub monitor: MonitorSettings,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            default_category: DEFAULT_CATEGORY.to_string(),
            excluded_extensions: [".tmp", ".temp", ".log", ".cache"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_names: ["Thumbs.db", ".DS_Store", "desktop.ini"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            process_hidden_files: false,
            min_file_size: 0,
            max_file_size: 0,
            organize_by_date: false,
            date_format: DATE_FORMAT_DEFAULT.to_string(),
            preserve_timestamps: true,
            monitor: MonitorSettings::default(),
            log_level: LogLevel::Normal,
            log_file: None,
        }
    }
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Images",
            ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "webp", "ico"],
        ),
        CategoryRule::new("Documents", ["doc", "docx", "pdf", "txt", "rtf", "odt", "pages"]),
        CategoryRule::new("Spreadsheets", ["xls", "xlsx", "csv", "ods", "numbers"]),
        CategoryRule::new("Presentations", ["ppt", "pptx", "odp", "key"]),
        CategoryRule::new("Audio", ["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a"]),
        CategoryRule::new("Video", ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"]),
        CategoryRule::new("Archives", ["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
        CategoryRule::new("Programs", ["exe", "msi", "dmg", "pkg", "deb", "rpm", "app"]),
        CategoryRule::new(
            "Code",
            ["py", "js", "html", "css", "java", "cpp", "c", "php", "rb", "go", "rs"],
        ),
        CategoryRule::new("Fonts", ["ttf", "otf", "woff", "woff2", "eot"]),
    ]
}

/// Keys understood by `get`/`set` besides `categories.<Name>`.
pub const SETTING_KEYS: &[&str] = &[
    "default_category",
    "excluded_extensions",
    "excluded_names",
    "process_hidden_files",
    "min_file_size",
    "max_file_size",
    "organize_by_date",
    "date_format",
    "preserve_timestamps",
    "monitor.settle_delay_ms",
    "monitor.recursive",
    "log_level",
    "log_file",
];

impl Settings {
    /// Look up a single value by dotted key, rendered as text.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(name) = key.strip_prefix("categories.") {
            return self
                .categories
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.extensions.join(","));
        }
        let v = match key {
            "categories" => self
                .categories
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "default_category" => self.default_category.clone(),
            "excluded_extensions" => self.excluded_extensions.join(","),
            "excluded_names" => self.excluded_names.join(","),
            "process_hidden_files" => self.process_hidden_files.to_string(),
            "min_file_size" => self.min_file_size.to_string(),
            "max_file_size" => self.max_file_size.to_string(),
            "organize_by_date" => self.organize_by_date.to_string(),
            "date_format" => self.date_format.clone(),
            "preserve_timestamps" => self.preserve_timestamps.to_string(),
            "monitor.settle_delay_ms" => self.monitor.settle_delay.as_millis().to_string(),
            "monitor.recursive" => self.monitor.recursive.to_string(),
            "log_level" => self.log_level.to_string(),
            "log_file" => self
                .log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => return None,
        };
        Some(v)
    }

    /// Update a single value by dotted key. `categories.<Name>` with an empty
    /// value removes the category; otherwise it replaces or appends it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), TidyMoveError> {
        let value = value.trim();
        if let Some(name) = key.strip_prefix("categories.") {
            let exts = split_list(value);
            if exts.is_empty() {
                self.remove_category(name);
            } else {
                self.set_category(name, exts);
            }
            return Ok(());
        }
        match key {
            "default_category" => self.default_category = value.to_string(),
            "excluded_extensions" => {
                self.excluded_extensions = split_list(value)
                    .iter()
                    .map(|e| display_extension(&normalize_extension(e)))
                    .collect()
            }
            "excluded_names" => self.excluded_names = split_list(value),
            "process_hidden_files" => self.process_hidden_files = parse_bool(key, value)?,
            "min_file_size" => self.min_file_size = parse_u64(key, value)?,
            "max_file_size" => self.max_file_size = parse_u64(key, value)?,
            "organize_by_date" => self.organize_by_date = parse_bool(key, value)?,
            "date_format" => self.date_format = value.to_string(),
            "preserve_timestamps" => self.preserve_timestamps = parse_bool(key, value)?,
            "monitor.settle_delay_ms" => {
                self.monitor.settle_delay = Duration::from_millis(parse_u64(key, value)?)
            }
            "monitor.recursive" => self.monitor.recursive = parse_bool(key, value)?,
            "log_level" => {
                self.log_level = value.parse().map_err(TidyMoveError::ConfigInvalid)?;
            }
            "log_file" => {
                self.log_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            _ => {
                return Err(TidyMoveError::ConfigInvalid(format!(
                    "unknown setting '{key}'"
                )));
            }
        }
        Ok(())
    }

    /// Replace the extensions of `name`, keeping its position, or append it.
    pub fn set_category(&mut self, name: &str, extensions: Vec<String>) {
        let rule = CategoryRule::new(name, extensions);
        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = rule,
            None => self.categories.push(rule),
        }
    }

    pub fn remove_category(&mut self, name: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.name != name);
        before != self.categories.len()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TidyMoveError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(TidyMoveError::ConfigInvalid(format!(
            "{key}: expected true/false, got '{value}'"
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, TidyMoveError> {
    value.parse::<u64>().map_err(|_| {
        TidyMoveError::ConfigInvalid(format!(
            "{key}: expected a non-negative integer, got '{value}'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_ordered_categories() {
        let s = Settings::default();
        assert_eq!(s.categories[0].name, "Images");
        assert!(s.categories[0].extensions.contains(&".jpg".to_string()));
        assert_eq!(s.default_category, DEFAULT_CATEGORY);
    }

    #[test]
    fn set_and_get_round_trip_for_scalars() {
        let mut s = Settings::default();
        s.set("organize_by_date", "yes").unwrap();
        s.set("monitor.settle_delay_ms", "250").unwrap();
        assert_eq!(s.get("organize_by_date").as_deref(), Some("true"));
        assert_eq!(s.monitor.settle_delay, Duration::from_millis(250));
    }

    #[test]
    fn set_category_normalizes_and_keeps_position() {
        let mut s = Settings::default();
        s.set("categories.Images", "JPG, .Png").unwrap();
        assert_eq!(s.categories[0].name, "Images");
        assert_eq!(s.categories[0].extensions, vec![".jpg", ".png"]);

        s.set("categories.Ebooks", "epub,mobi").unwrap();
        assert_eq!(s.categories.last().unwrap().name, "Ebooks");

        s.set("categories.Ebooks", "").unwrap();
        assert!(s.categories.iter().all(|c| c.name != "Ebooks"));
    }

    #[test]
    fn unknown_key_is_config_invalid() {
        let mut s = Settings::default();
        let err = s.set("theme", "dark").unwrap_err();
        assert!(matches!(err, TidyMoveError::ConfigInvalid(_)));
        assert!(s.get("theme").is_none());
    }

    #[test]
    fn bad_bool_rejected() {
        let mut s = Settings::default();
        assert!(s.set("organize_by_date", "maybe").is_err());
        assert!(!s.organize_by_date);
    }
}
