//! XML configuration support.
//! - Parses config.xml (quick_xml) into Settings, filling gaps with defaults.
//! - Renders Settings back to an indented document with a short header comment.
//!
//! Notes:
//! - Unknown elements are rejected; the store turns that into a CONFIG_INVALID
//!   issue and falls back to defaults rather than refusing to start.
//! - Category order in the document is preserved; it decides overlap precedence.

use anyhow::{Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::types::{CategoryRule, LogLevel, MonitorSettings, Settings};
use crate::classify::{display_extension, normalize_extension};
use crate::errors::TidyMoveError;

/// Struct mirroring the XML config for (de)serialization.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    categories: Option<XmlCategories>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excluded_extensions: Option<XmlExtList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excluded_names: Option<XmlNameList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process_hidden_files: Option<bool>,
    #[serde(
        default,
        deserialize_with = "de_u64_trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    min_file_size: Option<u64>,
    #[serde(
        default,
        deserialize_with = "de_u64_trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    max_file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organize_by_date: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preserve_timestamps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor: Option<XmlMonitor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlCategories {
    #[serde(rename = "category", default)]
    items: Vec<XmlCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlCategory {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "ext", default)]
    exts: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlExtList {
    #[serde(rename = "ext", default)]
    items: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlNameList {
    #[serde(rename = "name", default)]
    items: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlMonitor {
    #[serde(
        default,
        deserialize_with = "de_u64_trimmed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    settle_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recursive: Option<bool>,
}

// Custom deserializer that trims surrounding whitespace for optional u64
fn de_u64_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn trimmed_nonempty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse a config document. Missing elements keep their defaults; a bad
/// `log_level` value is reported as an issue and left at its default.
pub fn parse_settings(xml: &str) -> Result<(Settings, Vec<TidyMoveError>), TidyMoveError> {
    let parsed: XmlConfig =
        from_xml_str(xml).map_err(|e| TidyMoveError::ConfigInvalid(e.to_string()))?;
    let mut issues = Vec::new();
    let mut s = Settings::default();

    if let Some(cats) = parsed.categories {
        s.categories = cats
            .items
            .into_iter()
            .map(|c| CategoryRule::new(c.name.trim(), c.exts))
            .collect();
    }
    if let Some(dc) = trimmed_nonempty(parsed.default_category) {
        s.default_category = dc;
    }
    if let Some(list) = parsed.excluded_extensions {
        s.excluded_extensions = list
            .items
            .iter()
            .map(|e| display_extension(&normalize_extension(e)))
            .collect();
    }
    if let Some(list) = parsed.excluded_names {
        s.excluded_names = list
            .items
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
    }
    if let Some(v) = parsed.process_hidden_files {
        s.process_hidden_files = v;
    }
    if let Some(v) = parsed.min_file_size {
        s.min_file_size = v;
    }
    if let Some(v) = parsed.max_file_size {
        s.max_file_size = v;
    }
    if let Some(v) = parsed.organize_by_date {
        s.organize_by_date = v;
    }
    if let Some(v) = trimmed_nonempty(parsed.date_format) {
        s.date_format = v;
    }
    if let Some(v) = parsed.preserve_timestamps {
        s.preserve_timestamps = v;
    }
    if let Some(m) = parsed.monitor {
        let mut mon = MonitorSettings::default();
        if let Some(ms) = m.settle_delay_ms {
            mon.settle_delay = Duration::from_millis(ms);
        }
        if let Some(r) = m.recursive {
            mon.recursive = r;
        }
        s.monitor = mon;
    }
    if let Some(raw) = trimmed_nonempty(parsed.log_level) {
        match raw.parse::<LogLevel>() {
            Ok(level) => s.log_level = level,
            Err(msg) => issues.push(TidyMoveError::ConfigInvalid(msg)),
        }
    }
    s.log_file = trimmed_nonempty(parsed.log_file).map(PathBuf::from);

    Ok((s, issues))
}

const HEADER: &str = "<!--
  tidy_move configuration (XML)

    categories            -> <category name=\"...\"><ext>.jpg</ext></category>, first match wins
    default_category      -> folder for extensions no category lists
    excluded_extensions   -> never moved
    excluded_names        -> exact file names never moved (case-insensitive)
    process_hidden_files  -> include names starting with '.' or '~'
    min_file_size         -> bytes; smaller files are skipped
    max_file_size         -> bytes; larger files are skipped (0 = no limit)
    organize_by_date      -> add a date subfolder from the modification time
    date_format           -> strftime pattern for that subfolder
    preserve_timestamps   -> keep mtime/atime when a move falls back to copy
    monitor               -> settle_delay_ms, recursive
    log_level             -> quiet | normal | info | debug
-->
";

/// Render settings as a complete, indented config document.
pub fn render_settings(s: &Settings) -> Result<String> {
    let xml = XmlConfig {
        categories: Some(XmlCategories {
            items: s
                .categories
                .iter()
                .map(|c| XmlCategory {
                    name: c.name.clone(),
                    exts: c.extensions.clone(),
                })
                .collect(),
        }),
        default_category: Some(s.default_category.clone()),
        excluded_extensions: Some(XmlExtList {
            items: s.excluded_extensions.clone(),
        }),
        excluded_names: Some(XmlNameList {
            items: s.excluded_names.clone(),
        }),
        process_hidden_files: Some(s.process_hidden_files),
        min_file_size: Some(s.min_file_size),
        max_file_size: Some(s.max_file_size),
        organize_by_date: Some(s.organize_by_date),
        date_format: Some(s.date_format.clone()),
        preserve_timestamps: Some(s.preserve_timestamps),
        monitor: Some(XmlMonitor {
            settle_delay_ms: Some(s.monitor.settle_delay.as_millis() as u64),
            recursive: Some(s.monitor.recursive),
        }),
        log_level: Some(s.log_level.to_string()),
        log_file: s.log_file.as_ref().map(|p| p.display().to_string()),
    };

    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut body);
    ser.indent(' ', 2);
    xml.serialize(ser).context("serialize config xml")?;

    let mut out = String::with_capacity(HEADER.len() + body.len() + 1);
    out.push_str(HEADER);
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}
