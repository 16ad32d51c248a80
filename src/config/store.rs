//! Config persistence.
//! Loads the rule document from disk (never failing: problems become issues
//! plus defaults), saves it atomically, and creates a template on first run.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::paths::{default_config_path, path_has_symlink_ancestor};
use super::types::Settings;
use super::validate::sanitize;
use super::xml::{parse_settings, render_settings};
use crate::errors::TidyMoveError;
use crate::fs_ops::io_error_with_help;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_0600};

/// Where the loaded settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// No file on disk; built-in defaults.
    Defaults,
    /// Parsed from this file (possibly with repaired values).
    File(PathBuf),
    /// The file existed but could not be used; defaults were substituted.
    Fallback(PathBuf),
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub settings: Settings,
    /// CONFIG_INVALID problems found while loading; never fatal.
    pub issues: Vec<TidyMoveError>,
    pub origin: ConfigOrigin,
}

/// A config document at a fixed location.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `$TIDY_MOVE_CONFIG` or the OS default location.
    pub fn open_default() -> Result<Self> {
        let path = default_config_path().ok_or_else(|| anyhow!("cannot determine config path"))?;
        Ok(Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and sanitize the document. A missing file yields defaults; an
    /// unreadable or malformed one yields defaults plus an issue.
    pub fn load(&self) -> LoadedConfig {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file; using defaults");
                return LoadedConfig {
                    settings: Settings::default(),
                    issues: Vec::new(),
                    origin: ConfigOrigin::Defaults,
                };
            }
            Err(e) => {
                return self.fallback(TidyMoveError::ConfigInvalid(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        match parse_settings(&content) {
            Ok((mut settings, mut issues)) => {
                issues.extend(sanitize(&mut settings));
                debug!(path = %self.path.display(), issues = issues.len(), "config loaded");
                LoadedConfig {
                    settings,
                    issues,
                    origin: ConfigOrigin::File(self.path.clone()),
                }
            }
            Err(TidyMoveError::ConfigInvalid(msg)) => self.fallback(TidyMoveError::ConfigInvalid(
                format!("{}: {msg}", self.path.display()),
            )),
            Err(other) => self.fallback(other),
        }
    }

    fn fallback(&self, issue: TidyMoveError) -> LoadedConfig {
        warn!(kind = issue.kind(), "{issue}; falling back to defaults");
        LoadedConfig {
            settings: Settings::default(),
            issues: vec![issue],
            origin: ConfigOrigin::Fallback(self.path.clone()),
        }
    }

    /// Write `settings` atomically, creating the parent directory if needed.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if path_has_symlink_ancestor(&self.path)? {
            return Err(anyhow!(
                "Refusing to write config: ancestor of {} is a symlink",
                self.path.display()
            ));
        }
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create config dir '{}'", parent.display()))?;
                let _ = set_dir_mode_0700(parent);
            }
        }
        let text = render_settings(settings)?;
        write_config_secure_0600(&self.path, text.as_bytes())?;
        let _ = set_file_mode_0600(&self.path);
        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Overwrite the document with built-in defaults.
    pub fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings)?;
        info!(path = %self.path.display(), "config reset to defaults");
        Ok(settings)
    }

    /// Write a default document if none exists. Returns true when one was created.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Settings::default())?;
        info!("Created template config at {}", self.path.display());
        Ok(true)
    }

    /// Parse a document from `src` strictly: any issue rejects the import.
    pub fn import(&self, src: &Path) -> Result<Settings> {
        let content =
            fs::read_to_string(src).with_context(|| format!("read '{}'", src.display()))?;
        let (mut settings, mut issues) = parse_settings(&content)?;
        issues.extend(sanitize(&mut settings));
        if let Some(first) = issues.into_iter().next() {
            return Err(first).with_context(|| format!("import '{}'", src.display()));
        }
        self.save(&settings)?;
        Ok(settings)
    }

    /// Write the current settings to `dest`.
    pub fn export(&self, settings: &Settings, dest: &Path) -> Result<()> {
        let text = render_settings(settings)?;
        fs::write(dest, text).map_err(io_error_with_help("export config", dest))
    }
}
