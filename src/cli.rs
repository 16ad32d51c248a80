//! CLI definition and parsing.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug and wins over it.
//! - --target defaults to the source directory (organize in place).

use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::{Path, PathBuf};

use crate::config::LogLevel;

/// Sort a directory into category folders by file extension.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sort files into category folders by extension")]
pub struct Args {
    /// Config file to use instead of $TIDY_MOVE_CONFIG or the default location.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Move every file in SOURCE into its category folder.
    Organize {
        #[command(flatten)]
        loc: Location,
        /// Show what would be done, but do not modify files/directories.
        #[arg(long)]
        dry_run: bool,
        /// Add a date subfolder (config `date_format`) below each category.
        #[arg(long)]
        by_date: bool,
    },
    /// List the planned moves without touching anything.
    Preview {
        #[command(flatten)]
        loc: Location,
        /// Print at most N planned entries.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Watch SOURCE and organize new files until interrupted.
    Monitor {
        #[command(flatten)]
        loc: Location,
        /// Quiet period before a new file is picked up.
        #[arg(long, value_name = "MS")]
        settle_ms: Option<u64>,
    },
    /// Count files by category and extension (read-only).
    Stats {
        #[arg(value_name = "DIR", value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        #[arg(long, short = 'r')]
        recursive: bool,
    },
    /// Inspect or change the configuration document.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct Location {
    #[arg(value_name = "SOURCE", value_hint = ValueHint::DirPath)]
    pub source: PathBuf,

    /// Root for category folders (defaults to SOURCE).
    #[arg(long, short = 't', value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub target: Option<PathBuf>,

    #[arg(long, short = 'r')]
    pub recursive: bool,
}

impl Location {
    pub fn target_root(&self) -> &Path {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print every setting as key = value.
    List,
    /// Print the config file location.
    Path,
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
    },
    /// Overwrite the config with built-in defaults.
    Reset,
    /// Add or replace a category, e.g. `add-rule Images jpg,png`.
    AddRule {
        category: String,
        /// Comma-separated extensions.
        extensions: String,
    },
    Export {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    Import {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config value).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_defaults_to_source() {
        let args = Args::try_parse_from(["tidy_move", "organize", "/tmp/in"]).unwrap();
        match args.command {
            Command::Organize { loc, dry_run, .. } => {
                assert_eq!(loc.target_root(), Path::new("/tmp/in"));
                assert!(!dry_run);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn debug_wins_over_log_level() {
        let argv = ["tidy_move", "--log-level", "quiet", "stats", "x", "-d"];
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
        let args =
            Args::try_parse_from(["tidy_move", "stats", "x", "--log-level", "info"]).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Info));
    }

    #[test]
    fn config_subcommands_parse() {
        let args =
            Args::try_parse_from(["tidy_move", "config", "add-rule", "Images", "jpg,png"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::AddRule { ref category, .. }
            } if category == "Images"
        ));
        assert!(Args::try_parse_from(["tidy_move", "config", "set", "only_key"]).is_err());
    }
}
