//! Category rules for one organize/preview/monitor/stats session.
//!
//! A `RuleSet` is built once and then only read. Categories keep their
//! declaration order; the extension lookup table is derived from that order
//! so "first declared wins" is explicit rather than an accident of map order.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use crate::classify::{display_extension, normalize_extension};
use crate::config::Settings;
use crate::errors::TidyMoveError;
use crate::record::FileRecord;

/// Why a file was left alone without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    Extension,
    Name,
    Hidden,
    Size,
    Symlink,
}

impl ExclusionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionReason::Extension => "excluded extension",
            ExclusionReason::Name => "excluded name",
            ExclusionReason::Hidden => "hidden file",
            ExclusionReason::Size => "size outside limits",
            ExclusionReason::Symlink => "symbolic link",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    /// Normalized (lowercase, no dot; "" for no extension).
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    categories: Vec<Category>,
    lookup: HashMap<String, usize>,
    default_category: String,
    excluded_extensions: HashSet<String>,
    excluded_names: HashSet<String>,
    process_hidden_files: bool,
    min_file_size: u64,
    max_file_size: u64,
}

/// A category name must be usable as exactly one directory level.
pub fn valid_category_name(name: &str) -> bool {
    if name.is_empty() || name.trim() != name || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut comps = Path::new(name).components();
    matches!(
        (comps.next(), comps.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl RuleSet {
    /// Strict constructor: rejects invalid names and any extension claimed by
    /// two categories.
    pub fn new<I, N, E, S>(categories: I, default_category: &str) -> Result<Self, TidyMoveError>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !valid_category_name(default_category) {
            return Err(TidyMoveError::ConfigInvalid(format!(
                "default category '{default_category}' is not a plain folder name"
            )));
        }
        let mut rules = Self::empty(default_category);
        for (name, exts) in categories {
            let name = name.into();
            if !valid_category_name(&name) {
                return Err(TidyMoveError::ConfigInvalid(format!(
                    "category name '{name}' is not a plain folder name"
                )));
            }
            if rules.categories.iter().any(|c| c.name == name) {
                return Err(TidyMoveError::ConfigInvalid(format!(
                    "category '{name}' declared twice"
                )));
            }
            let idx = rules.categories.len();
            let mut kept = Vec::new();
            for ext in exts {
                let norm = normalize_extension(ext.as_ref());
                if let Some(&owner) = rules.lookup.get(&norm) {
                    if owner == idx {
                        continue;
                    }
                    return Err(TidyMoveError::ConfigInvalid(format!(
                        "extension '{}' is listed under both '{}' and '{}'",
                        display_extension(&norm),
                        rules.categories[owner].name,
                        name
                    )));
                }
                rules.lookup.insert(norm.clone(), idx);
                kept.push(norm);
            }
            rules.categories.push(Category {
                name,
                extensions: kept,
            });
        }
        Ok(rules)
    }

    /// Lenient constructor for configuration documents: the first category to
    /// list an extension keeps it; later claims are dropped and reported.
    pub fn from_settings(settings: &Settings) -> (Self, Vec<TidyMoveError>) {
        let mut issues = Vec::new();
        let default = if valid_category_name(&settings.default_category) {
            settings.default_category.as_str()
        } else {
            issues.push(TidyMoveError::ConfigInvalid(format!(
                "default category '{}' is not a plain folder name; using '{}'",
                settings.default_category,
                crate::config::DEFAULT_CATEGORY
            )));
            crate::config::DEFAULT_CATEGORY
        };
        let mut rules = Self::empty(default);

        for rule in &settings.categories {
            if !valid_category_name(&rule.name) || rules.is_known_category(&rule.name) {
                issues.push(TidyMoveError::ConfigInvalid(format!(
                    "category '{}' dropped (invalid or repeated name)",
                    rule.name
                )));
                continue;
            }
            let idx = rules.categories.len();
            let mut kept = Vec::new();
            for ext in &rule.extensions {
                let norm = normalize_extension(ext);
                match rules.lookup.get(&norm) {
                    Some(&owner) if owner == idx => {}
                    Some(&owner) => issues.push(TidyMoveError::ConfigInvalid(format!(
                        "extension '{}' in '{}' already belongs to '{}'; ignored",
                        display_extension(&norm),
                        rule.name,
                        rules.categories[owner].name
                    ))),
                    None => {
                        rules.lookup.insert(norm.clone(), idx);
                        kept.push(norm);
                    }
                }
            }
            rules.categories.push(Category {
                name: rule.name.clone(),
                extensions: kept,
            });
        }

        let rules = rules
            .with_excluded_extensions(&settings.excluded_extensions)
            .with_excluded_names(&settings.excluded_names)
            .with_hidden_files(settings.process_hidden_files)
            .with_size_limits(settings.min_file_size, settings.max_file_size);
        (rules, issues)
    }

    fn empty(default_category: &str) -> Self {
        Self {
            categories: Vec::new(),
            lookup: HashMap::new(),
            default_category: default_category.to_string(),
            excluded_extensions: HashSet::new(),
            excluded_names: HashSet::new(),
            process_hidden_files: true,
            min_file_size: 0,
            max_file_size: 0,
        }
    }

    pub fn with_excluded_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = exts
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn with_excluded_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        self
    }

    pub fn with_hidden_files(mut self, process: bool) -> Self {
        self.process_hidden_files = process;
        self
    }

    /// `max == 0` means no upper limit.
    pub fn with_size_limits(mut self, min: u64, max: u64) -> Self {
        self.min_file_size = min;
        self.max_file_size = max;
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// Category owning a normalized extension, if any.
    pub fn category_for(&self, normalized_ext: &str) -> Option<&str> {
        self.lookup
            .get(normalized_ext)
            .map(|&i| self.categories[i].name.as_str())
    }

    pub fn is_excluded_extension(&self, normalized_ext: &str) -> bool {
        self.excluded_extensions.contains(normalized_ext)
    }

    /// Declared categories plus the default one: the folders organize writes to.
    pub fn is_known_category(&self, name: &str) -> bool {
        name == self.default_category || self.categories.iter().any(|c| c.name == name)
    }

    /// Name-based filters only (no metadata needed).
    pub(crate) fn name_exclusion(&self, file_name: &str) -> Option<ExclusionReason> {
        if self.excluded_names.contains(&file_name.to_lowercase()) {
            return Some(ExclusionReason::Name);
        }
        if !self.process_hidden_files && (file_name.starts_with('.') || file_name.starts_with('~'))
        {
            return Some(ExclusionReason::Hidden);
        }
        None
    }

    /// All non-extension filters, checked against a fresh record.
    pub fn exclusion_for(&self, record: &FileRecord) -> Option<ExclusionReason> {
        if record.is_symlink {
            return Some(ExclusionReason::Symlink);
        }
        if let Some(reason) = self.name_exclusion(&record.name) {
            return Some(reason);
        }
        if record.size < self.min_file_size
            || (self.max_file_size != 0 && record.size > self.max_file_size)
        {
            return Some(ExclusionReason::Size);
        }
        None
    }
}
