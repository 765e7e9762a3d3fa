//! deploymark - Entry Point
//!
//! Marks a commit for deployment to one deploy group, optionally waits for
//! the fleet to pick it up, and rolls back when it does not.

use std::collections::HashMap;
use std::env;

use anyhow::Context;
use colored::Colorize;
use tracing::{error, info};

use deploymark::app::options::MarkOptions;
use deploymark::app::run::{mark_for_deployment, RunSummary};
use deploymark::logs::{init_logging, LogLevel, LogOptions};
use deploymark::storage::layout::StorageLayout;
use deploymark::storage::settings::Settings;
use deploymark::utils::{short_sha, version_info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --block
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    let options = match MarkOptions::from_args(&cli_args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            eprintln!(
                "usage: deploymark --service=S --deploy-group=G --commit=SHA [--git-url=U] \
                 [--block] [--auto-rollback] [--timeout=SECS] [--verify-image] \
                 [--soa-dir=D] [--config-dir=D] [--verbose]"
            );
            std::process::exit(1);
        }
    };

    let layout = match cli_args.get("config-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    let settings = match load_settings(&layout).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", format!("{e:#}").red());
            std::process::exit(1);
        }
    };

    // Initialize logging
    let mut log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    if options.verbose {
        log_options.log_level = LogLevel::Debug;
    }
    if settings.log_to_file {
        if let Err(e) = layout.setup().await {
            eprintln!("Failed to create {}: {e}", layout.base_dir.display());
        }
        log_options.log_dir = Some(layout.logs_dir().path().to_path_buf());
    }
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!(
        "Marking {} of {} for {}",
        short_sha(&options.commit),
        options.service,
        options.deploy_group
    );
    let summary = match mark_for_deployment(&options, &settings, &layout, await_shutdown_signal())
        .await
        .with_context(|| format!("Unable to mark {} for deployment", options.service))
    {
        Ok(summary) => summary,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{}", format!("{e:#}").red());
            std::process::exit(1);
        }
    };

    print_summary(&options, &summary);
    std::process::exit(summary.exit.code());
}

async fn load_settings(layout: &StorageLayout) -> anyhow::Result<Settings> {
    let settings_file = layout.settings_file();
    if !settings_file.exists().await {
        return Ok(Settings::default());
    }
    settings_file
        .read_json::<Settings>()
        .await
        .with_context(|| format!("Unable to read settings file {}", settings_file.path().display()))
}

fn print_summary(options: &MarkOptions, summary: &RunSummary) {
    let line = format!(
        "{}.{} -> {}: {}",
        options.service,
        options.deploy_group,
        short_sha(&summary.commit),
        summary.state
    );
    let line = match &summary.reason {
        Some(reason) => format!("{line} ({reason})"),
        None => line,
    };

    if summary.exit.is_success() {
        println!("{}", line.green());
    } else {
        println!("{}", line.red());
        if let Some(old) = &summary.old_commit {
            println!("previous commit: {}", short_sha(old).yellow());
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received");
    }
}
