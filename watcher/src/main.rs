//! WhaleRay Log Watcher - Entry Point
//!
//! Follows the build and runtime logs of a deployment in the terminal until it
//! is running or has failed.

use clap::Parser;

use wrwatch::app::cli::Cli;
use wrwatch::app::options::{log_options, AppOptions};
use wrwatch::app::run::run;
use wrwatch::filesys::file::File;
use wrwatch::logs::init_logging;
use wrwatch::storage::layout::StorageLayout;
use wrwatch::storage::settings::Settings;
use wrwatch::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Print version and exit
    if cli.version {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version info: {}", e),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = cli
        .settings
        .clone()
        .map(File::new)
        .unwrap_or_else(|| layout.settings_file());
    let settings = match settings_file.read_json_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                settings_file.path().display(),
                e
            );
            std::process::exit(2);
        }
    };

    // Initialize logging
    let _log_guard = match init_logging(log_options(&cli, &settings)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match AppOptions::resolve(&cli, &settings, &layout) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    info!("Running log watcher with options: {:?}", options);
    match run(options, await_shutdown_signal()).await {
        Ok(summary) if summary.status.is_failure() => {
            info!("Deployment ended with {}", summary.status);
            std::process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Log watcher failed: {e}");
            eprintln!("{}", e.reason());
            std::process::exit(1);
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Unable to install signal handlers, falling back to Ctrl+C");
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
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
