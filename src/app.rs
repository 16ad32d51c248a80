//! Application orchestrator.
//! Loads config, initializes logging, installs the signal handler and runs
//! the selected subcommand.

use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

use tidy_move::cli::{Args, Command, ConfigAction, Location};
use tidy_move::config::{
    CONFIG_ENV, ConfigOrigin, ConfigStore, LoadedConfig, SETTING_KEYS, Settings, sanitize,
};
use tidy_move::output::{self as out, ConsoleSink};
use tidy_move::report::{FanOut, ReportSink, TracingSink};
use tidy_move::rules::valid_category_name;
use tidy_move::{
    CancelToken, OrganizeOptions, RuleSet, WatchOptions, Watcher, organize_batch, shutdown, stats,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    let (store, explicit) = match &args.config {
        Some(p) => (ConfigStore::at(p), true),
        None => (ConfigStore::open_default()?, std::env::var_os(CONFIG_ENV).is_some()),
    };

    // First run at the default location: write a template so users have something to edit.
    if !explicit {
        match store.ensure_exists() {
            Ok(true) => out::print_success(&format!(
                "A default tidy_move config was written to: {}",
                store.path().display()
            )),
            Ok(false) => {}
            Err(e) => out::print_warn(&format!("Could not create default config: {e:#}")),
        }
    }

    let loaded = store.load();
    let level = args
        .effective_log_level()
        .unwrap_or_else(|| loaded.settings.log_level.clone());

    let log_file = loaded.settings.log_file.as_deref();
    let guard_opt = init_tracing(&level, log_file, args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {}", e));
        e
    })?;

    for issue in &loaded.issues {
        out::print_warn(&issue.to_string());
    }

    // The guard is dropped on SIGINT too so buffered file logs are flushed.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    let cancel = CancelToken::new();
    {
        let guard_slot = Arc::clone(&guard_slot);
        let cancel = cancel.clone();
        let installed = ctrlc::set_handler(move || {
            if shutdown::is_requested() {
                if let Ok(mut g) = guard_slot.lock() {
                    let _ = g.take();
                }
                std::process::exit(130);
            }
            shutdown::request();
            cancel.cancel();
            out::print_warn("Received interrupt; finishing the current file...");
        });
        if let Err(e) = installed {
            out::print_warn(&format!("Could not install Ctrl-C handler: {e}"));
        }
    }

    debug!(?args, config = %store.path().display(), "starting tidy_move");

    let result = dispatch(&args, &store, loaded, &cancel);
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "command failed");
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn dispatch(
    args: &Args,
    store: &ConfigStore,
    loaded: LoadedConfig,
    cancel: &CancelToken,
) -> Result<()> {
    match &args.command {
        Command::Organize { loc, dry_run, by_date } => {
            let mut settings = loaded.settings;
            if *by_date {
                settings.organize_by_date = true;
            }
            run_batch(loc, &settings, *dry_run, None, cancel)
        }
        Command::Preview { loc, limit } => run_batch(loc, &loaded.settings, true, *limit, cancel),
        Command::Monitor { loc, settle_ms } => run_monitor(loc, &loaded.settings, *settle_ms),
        Command::Stats { dir, recursive } => run_stats(dir, &loaded.settings, *recursive),
        Command::Config { action } => run_config(action, store, loaded),
    }
}

fn build_rules(settings: &Settings) -> RuleSet {
    let (rules, issues) = RuleSet::from_settings(settings);
    for issue in &issues {
        out::print_warn(&issue.to_string());
    }
    rules
}

fn console_and_audit(limit: Option<usize>) -> FanOut {
    FanOut(vec![Box::new(ConsoleSink::new(limit)), Box::new(TracingSink)])
}

fn run_batch(
    loc: &Location,
    settings: &Settings,
    preview: bool,
    limit: Option<usize>,
    cancel: &CancelToken,
) -> Result<()> {
    let rules = build_rules(settings);
    let mut opts = OrganizeOptions::from_settings(loc.target_root(), settings);
    opts.recursive = loc.recursive;
    let sink = console_and_audit(limit);

    let result = organize_batch(&loc.source, &rules, &opts, preview, &sink, cancel)?;
    if result.cancelled {
        bail!("interrupted after {} file(s)", result.outcomes.len());
    }
    if result.failed > 0 {
        bail!("{} file(s) could not be organized", result.failed);
    }
    Ok(())
}

fn run_monitor(loc: &Location, settings: &Settings, settle_ms: Option<u64>) -> Result<()> {
    let rules = build_rules(settings);
    let mut opts = OrganizeOptions::from_settings(loc.target_root(), settings);
    opts.recursive = loc.recursive;
    let mut watch = WatchOptions::from(&settings.monitor);
    watch.recursive |= loc.recursive;
    if let Some(ms) = settle_ms {
        watch.settle_delay = Duration::from_millis(ms);
    }

    let sink: Arc<dyn ReportSink> = Arc::new(console_and_audit(None));
    let mut watcher = Watcher::new();
    watcher.start(&loc.source, rules, opts, watch, sink)?;
    out::print_info(&format!(
        "Watching {} (Ctrl-C to stop)",
        loc.source.display()
    ));

    while !shutdown::is_requested() {
        thread::sleep(Duration::from_millis(200));
    }
    watcher.stop()?;
    info!("monitor finished");
    Ok(())
}

fn run_stats(dir: &Path, settings: &Settings, recursive: bool) -> Result<()> {
    let rules = build_rules(settings);
    let s = stats(dir, &rules, recursive)?;
    out::print_user(&format!(
        "{} files, {} bytes ({} excluded)",
        s.total_files, s.total_size, s.excluded
    ));
    for (name, b) in &s.by_category {
        out::print_user(&format!("  {name:<16} {:>6} files {:>12} bytes", b.count, b.size));
    }
    let top = s.top_extensions(10);
    if !top.is_empty() {
        out::print_user("Top extensions:");
        for (ext, b) in top {
            let ext = if ext.is_empty() { "(none)" } else { ext };
            out::print_user(&format!("  {ext:<16} {:>6}", b.count));
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, store: &ConfigStore, loaded: LoadedConfig) -> Result<()> {
    match action {
        ConfigAction::Path => {
            out::print_user(&store.path().display().to_string());
            Ok(())
        }
        ConfigAction::List => {
            let s = &loaded.settings;
            for c in &s.categories {
                out::print_user(&format!("categories.{} = {}", c.name, c.extensions.join(",")));
            }
            for key in SETTING_KEYS {
                out::print_user(&format!("{key} = {}", s.get(key).unwrap_or_default()));
            }
            Ok(())
        }
        ConfigAction::Get { key } => {
            let v = loaded
                .settings
                .get(key)
                .ok_or_else(|| anyhow!("unknown setting '{key}'"))?;
            out::print_user(&v);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut settings = editable(&loaded)?;
            settings.set(key, value)?;
            save_checked(store, &settings)?;
            out::print_success(&format!("{key} updated"));
            Ok(())
        }
        ConfigAction::AddRule { category, extensions } => {
            if !valid_category_name(category) {
                bail!("'{category}' is not a plain folder name");
            }
            let exts: Vec<String> = extensions
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if exts.is_empty() {
                bail!("no extensions given for '{category}'");
            }
            let mut settings = editable(&loaded)?;
            settings.set_category(category, exts);
            save_checked(store, &settings)?;
            out::print_success(&format!("category '{category}' saved"));
            Ok(())
        }
        ConfigAction::Reset => {
            store.reset()?;
            out::print_success(&format!("config reset: {}", store.path().display()));
            Ok(())
        }
        ConfigAction::Export { file } => {
            store.export(&loaded.settings, file)?;
            out::print_success(&format!("config exported to {}", file.display()));
            Ok(())
        }
        ConfigAction::Import { file } => {
            store.import(file)?;
            out::print_success(&format!("config imported from {}", file.display()));
            Ok(())
        }
    }
}

/// Settings that may be edited and saved back. A document that failed to
/// load is not silently replaced by defaults.
fn editable(loaded: &LoadedConfig) -> Result<Settings> {
    if let ConfigOrigin::Fallback(path) = &loaded.origin {
        bail!(
            "config at {} could not be loaded; fix it or run `config reset`",
            path.display()
        );
    }
    Ok(loaded.settings.clone())
}

/// Reject edits that would be repaired or dropped on the next load.
fn save_checked(store: &ConfigStore, settings: &Settings) -> Result<()> {
    let mut scratch = settings.clone();
    if let Some(issue) = sanitize(&mut scratch).into_iter().next() {
        return Err(issue).context("setting rejected");
    }
    if let Some(issue) = RuleSet::from_settings(settings).1.into_iter().next() {
        return Err(issue).context("setting rejected");
    }
    store.save(settings)
}
