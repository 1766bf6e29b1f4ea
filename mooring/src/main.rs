//! Mooring - Entry Point
//!
//! Deployment orchestration engine for a self-hosted container platform.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use mooring::app::options::AppOptions;
use mooring::app::run::run;
use mooring::filesys::file::File;
use mooring::logs::{init_logging, LogOptions};
use mooring::storage::layout::StorageLayout;
use mooring::storage::settings::Settings;
use mooring::utils::version_info;

use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "/etc/mooring/settings.json";

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
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        print_json(&version_info());
        return;
    }

    let settings = match load_settings(cli_args.get("config")).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load settings: {:#}", e);
            std::process::exit(1);
        }
    };

    // Print the effective settings and exit
    if cli_args.contains_key("print-config") {
        print_json(&settings);
        return;
    }

    // Initialize logging
    let log_dir = settings
        .data_dir
        .clone()
        .map(|dir| StorageLayout::new(dir).logs_dir().path().to_path_buf())
        .unwrap_or_else(|| LogOptions::default().log_dir);
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        file: settings.log_to_file,
        log_dir,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings);
    info!(version = %version_info().version, "Running mooring with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run mooring: {e}");
        std::process::exit(1);
    }
}

/// Read the settings file. A missing file at the default path yields the
/// defaults; an explicitly given path must exist.
async fn load_settings(path: Option<&String>) -> anyhow::Result<Settings> {
    let (path, explicit) = match path {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let file = File::new(&path);
    if !explicit && !file.exists().await {
        return Ok(Settings::default());
    }
    file.read_json::<Settings>()
        .await
        .with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize: {}", e),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
