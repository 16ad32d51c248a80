//! Config validation logic.
//! Repairs values the engine cannot use and reports each repair as a
//! CONFIG_INVALID issue. Extension overlap is left to RuleSet, which resolves
//! it by document order.

use chrono::format::{Item, StrftimeItems};
use std::collections::HashSet;
use tracing::warn;

use super::types::Settings;
use super::{DATE_FORMAT_DEFAULT, DEFAULT_CATEGORY};
use crate::errors::TidyMoveError;
use crate::rules::valid_category_name;

/// True when `fmt` is a usable strftime pattern for a single relative subfolder path.
pub fn valid_date_format(fmt: &str) -> bool {
    let fmt = fmt.trim();
    if fmt.is_empty() || fmt.starts_with('/') || fmt.starts_with('\\') || fmt.contains("..") {
        return false;
    }
    StrftimeItems::new(fmt).all(|item| !matches!(item, Item::Error))
}

/// Fix up `settings` in place and return one issue per repaired value.
pub fn sanitize(settings: &mut Settings) -> Vec<TidyMoveError> {
    let mut issues = Vec::new();

    if !valid_date_format(&settings.date_format) {
        issues.push(TidyMoveError::ConfigInvalid(format!(
            "date_format '{}' is not a valid pattern; using '{}'",
            settings.date_format, DATE_FORMAT_DEFAULT
        )));
        settings.date_format = DATE_FORMAT_DEFAULT.to_string();
    }

    if !valid_category_name(&settings.default_category) {
        issues.push(TidyMoveError::ConfigInvalid(format!(
            "default_category '{}' is not a plain folder name; using '{}'",
            settings.default_category, DEFAULT_CATEGORY
        )));
        settings.default_category = DEFAULT_CATEGORY.to_string();
    }

    let mut seen = HashSet::new();
    settings.categories.retain(|c| {
        if !valid_category_name(&c.name) {
            issues.push(TidyMoveError::ConfigInvalid(format!(
                "category name '{}' is not a plain folder name; dropped",
                c.name
            )));
            return false;
        }
        if !seen.insert(c.name.clone()) {
            issues.push(TidyMoveError::ConfigInvalid(format!(
                "category '{}' is declared twice; later declaration dropped",
                c.name
            )));
            return false;
        }
        true
    });

    if settings.max_file_size != 0 && settings.min_file_size > settings.max_file_size {
        issues.push(TidyMoveError::ConfigInvalid(format!(
            "min_file_size {} exceeds max_file_size {}; size limits ignored",
            settings.min_file_size, settings.max_file_size
        )));
        settings.min_file_size = 0;
        settings.max_file_size = 0;
    }

    for issue in &issues {
        warn!(kind = issue.kind(), "{issue}");
    }
    issues
}
