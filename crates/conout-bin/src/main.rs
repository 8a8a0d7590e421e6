//! conout entrypoint: probe once, build the gate, run one subcommand.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::load_from;
use core_locale::{LocaleEnv, SystemLocaleEnv, probe_with};
use core_output::OutputGate;
use std::path::Path;
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Args;
use commands::ProbeReport;

/// Install the global subscriber. With a log file the writer is non-blocking
/// and the returned guard must live until exit.
fn configure_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        // Global subscriber may already be installed; nothing to keep alive.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
        return Ok(None);
    };

    let log_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path {} has no file name", path.display()))?;
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        // Already installed; dropping the guard shuts the writer down.
        Err(_err) => Ok(None),
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(args.log_file.as_deref())?;
    install_panic_hook();

    let mut config = load_from(args.config.clone())?;
    let capacity = config.apply_overrides(args.overrides());

    let mut env = SystemLocaleEnv::new();
    let probed = probe_with(&mut env, config.locale_candidates());
    let mode = config.effective_mode.resolve(probed);
    info!(
        target: "runtime",
        utf8_clean = mode.is_utf8_clean(),
        legacy_codepage = mode.legacy_codepage(),
        forced = mode != probed,
        capacity,
        config_override = args.config.is_some(),
        "startup"
    );

    let report = ProbeReport {
        probed,
        resolved: mode,
        active_codepage: env.active_codepage(),
        console_codepage: env.console_output_codepage(),
        capacity,
    };
    let gate = OutputGate::stdout(mode, capacity);
    commands::run(&args.command, &gate, &report)
}
