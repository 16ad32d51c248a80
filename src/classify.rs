//! Extension → category mapping. Pure: no I/O.

use crate::rules::RuleSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Listed in the excluded extensions; the file must not be moved.
    Excluded,
    Category(String),
}

/// Comparison key for an extension: trimmed, lowercase, one leading dot removed.
/// `""` and `"."` both mean "no extension".
pub fn normalize_extension(raw: &str) -> String {
    let t = raw.trim();
    let t = t.strip_prefix('.').unwrap_or(t);
    t.to_lowercase()
}

/// How a normalized extension is written back into config documents.
pub fn display_extension(normalized: &str) -> String {
    format!(".{normalized}")
}

/// Exclusion wins over every category; unknown extensions go to the default.
pub fn classify(extension: &str, rules: &RuleSet) -> Classification {
    let key = normalize_extension(extension);
    if rules.is_excluded_extension(&key) {
        return Classification::Excluded;
    }
    let name = rules
        .category_for(&key)
        .unwrap_or_else(|| rules.default_category());
    Classification::Category(name.to_string())
}
